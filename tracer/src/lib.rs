#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Latency tracing of data store calls.
//!
//! The data store client asks an [`ApiTracerFactory`] for one [`ApiTracer`] per
//! logical operation and reports every attempt and the final outcome to it.
//! [`MetricsTracer`] turns those reports into `attempt_latency` and
//! `operation_latency` measurements.

use auto_impl::auto_impl;

pub mod labels;
mod metrics_tracer;
mod status;
mod views;

pub use metrics_tracer::{MetricsTracer, MetricsTracerFactory, StoreIdentity};
pub use status::StatusCode;
pub use views::{
    InstrumentNames, ATTEMPT_LATENCY, DEFAULT_NAMESPACE_PREFIX, METER_NAME, OPERATION_LATENCY,
};

/// Callbacks of a single operation, driven by one task.
///
/// Calls never fail and never block the operation being traced.
pub trait ApiTracer: Send {
    /// An attempt is about to be sent.
    fn attempt_started(&mut self);

    /// The current attempt completed with `status`, successfully or not.
    fn attempt_ended(&mut self, status: StatusCode);

    /// The operation produced `response`. Called at most once, before
    /// [`ApiTracer::operation_ended`].
    fn operation_succeeded(&mut self, response: &dyn TracedResponse);

    /// The operation completed with `status`. Later calls are ignored.
    fn operation_ended(&mut self, status: StatusCode);
}

/// Result of an operation that may carry a natural identifier.
pub trait TracedResponse {
    /// Label derived from the response, if it has one.
    fn operation_label(&self) -> Option<(&'static str, String)> {
        None
    }
}

impl TracedResponse for () {}

impl TracedResponse for bool {}

impl<T: TracedResponse> TracedResponse for Option<T> {
    fn operation_label(&self) -> Option<(&'static str, String)> {
        self.as_ref().and_then(TracedResponse::operation_label)
    }
}

// A batch has no single identifier.
impl<T> TracedResponse for Vec<T> {}

/// Creates tracers for the operations of a client.
#[auto_impl(&, Arc, Box)]
pub trait ApiTracerFactory: Send + Sync {
    /// A fresh tracer for one invocation of `operation`.
    fn new_tracer(&self, operation: &'static str) -> Box<dyn ApiTracer>;
}

/// Tracer ignoring every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl ApiTracer for NoopTracer {
    fn attempt_started(&mut self) {}

    fn attempt_ended(&mut self, _status: StatusCode) {}

    fn operation_succeeded(&mut self, _response: &dyn TracedResponse) {}

    fn operation_ended(&mut self, _status: StatusCode) {}
}

/// Factory of [`NoopTracer`]s, for clients running without a metrics pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracerFactory;

impl ApiTracerFactory for NoopTracerFactory {
    fn new_tracer(&self, _operation: &'static str) -> Box<dyn ApiTracer> {
        Box::new(NoopTracer)
    }
}
