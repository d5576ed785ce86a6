#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Metrics pipeline of the sample service.
//!
//! Producers hand immutable [`Measurement`]s to a [`MetricsRecorder`]. The
//! [`MetricsPipeline`] is built once at startup from a [`MetricsPipelineBuilder`]:
//! views bind instruments to their exported name and bucket layout, and every
//! measurement reaches both sinks:
//!
//! * a periodic OTLP push exporter ([`PushSinkConfig`]);
//! * a Prometheus pull endpoint ([`run_pull_server`]).
//!
//! The sinks share no state and follow their own naming rules: the push sink exports
//! view names verbatim, the pull sink sanitizes them to Prometheus names.

mod error;
mod labels;
mod measurement;
mod metrics;
mod pipeline;
mod sinks;
pub mod testing;
mod views;

pub use error::{Error, Result};
pub use labels::LabelSet;
pub use measurement::{
    InstrumentDescriptor, InstrumentKind, Measurement, MetricsRecorder, UNIT_MILLIS,
};
pub use pipeline::{MetricsPipeline, MetricsPipelineBuilder, OtelRecorder};
pub use sinks::{
    pull_router, render_snapshot, run_pull_server, PushSinkConfig, DEFAULT_PUSH_INTERVAL,
};
pub use views::{
    Aggregation, InstrumentSelector, ViewDefinition, ViewRegistry, LATENCY_BUCKETS_MS,
};
