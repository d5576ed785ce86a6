use std::{sync::Arc, time::Instant};

use latency_metrics::{LabelSet, Measurement, MetricsRecorder, UNIT_MILLIS};

use crate::{
    labels::{APP_PROFILE_KEY, INSTANCE_ID_KEY, METHOD_KEY, PROJECT_ID_KEY, STATUS_KEY},
    views::InstrumentNames,
    ApiTracer, ApiTracerFactory, StatusCode, TracedResponse,
};

/// Identity of the store a client talks to, attached to every measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreIdentity {
    /// Project owning the instance.
    pub project_id: String,
    /// Instance id.
    pub instance_id: String,
    /// App profile id.
    pub app_profile_id: String,
}

impl StoreIdentity {
    fn labels(&self, operation: &'static str) -> LabelSet {
        LabelSet::new()
            .with(PROJECT_ID_KEY, self.project_id.as_str())
            .with(INSTANCE_ID_KEY, self.instance_id.as_str())
            .with(APP_PROFILE_KEY, self.app_profile_id.as_str())
            .with(METHOD_KEY, operation)
    }
}

/// Produces a [`MetricsTracer`] per operation.
#[derive(Clone)]
pub struct MetricsTracerFactory {
    recorder: Arc<dyn MetricsRecorder>,
    identity: StoreIdentity,
    names: Arc<InstrumentNames>,
    response_labels: bool,
}

impl std::fmt::Debug for MetricsTracerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsTracerFactory")
            .field("identity", &self.identity)
            .field("names", &self.names)
            .field("response_labels", &self.response_labels)
            .finish_non_exhaustive()
    }
}

impl MetricsTracerFactory {
    /// Tracers recording into `recorder` with the default instrument names.
    pub fn new(recorder: Arc<dyn MetricsRecorder>, identity: StoreIdentity) -> Self {
        Self {
            recorder,
            identity,
            names: Arc::new(InstrumentNames::default()),
            response_labels: true,
        }
    }

    /// Tracers of this factory never derive labels from responses.
    pub fn without_response_labels(mut self) -> Self {
        self.response_labels = false;
        self
    }

    /// Records into instruments named `names` instead of the defaults.
    pub fn with_instrument_names(mut self, names: InstrumentNames) -> Self {
        self.names = Arc::new(names);
        self
    }
}

impl ApiTracerFactory for MetricsTracerFactory {
    fn new_tracer(&self, operation: &'static str) -> Box<dyn ApiTracer> {
        Box::new(MetricsTracer {
            recorder: Arc::clone(&self.recorder),
            names: Arc::clone(&self.names),
            base_labels: self.identity.labels(operation),
            response_labels: self.response_labels.then(LabelSet::new),
            operation_start: Instant::now(),
            attempt_start: None,
            attempts: 0,
            finished: false,
        })
    }
}

/// Records attempt and operation latencies of a single operation.
///
/// Dropping the tracer before [`ApiTracer::operation_ended`] closes the open
/// attempt and the operation with [`StatusCode::Cancelled`].
pub struct MetricsTracer {
    recorder: Arc<dyn MetricsRecorder>,
    names: Arc<InstrumentNames>,
    base_labels: LabelSet,
    // `None` when response labels are disabled
    response_labels: Option<LabelSet>,
    operation_start: Instant,
    attempt_start: Option<Instant>,
    attempts: u32,
    finished: bool,
}

impl MetricsTracer {
    fn record(&self, instrument: &str, started: Instant, labels: LabelSet) {
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.recorder.record(Measurement::new(
            instrument.to_string(),
            elapsed_ms,
            UNIT_MILLIS,
            labels,
        ));
    }
}

impl ApiTracer for MetricsTracer {
    fn attempt_started(&mut self) {
        if self.finished {
            return;
        }
        // an attempt still open was abandoned by the caller
        if self.attempt_start.is_some() {
            self.attempt_ended(StatusCode::Cancelled);
        }
        self.attempts += 1;
        self.attempt_start = Some(Instant::now());
    }

    fn attempt_ended(&mut self, status: StatusCode) {
        let Some(started) = self.attempt_start.take() else {
            tracing::debug!(
                "attempt of {:?} ended without being started",
                self.base_labels.get(METHOD_KEY)
            );
            return;
        };

        let labels = self
            .base_labels
            .clone()
            .with(STATUS_KEY, status.as_str());
        self.record(&self.names.attempt_latency, started, labels);
    }

    fn operation_succeeded(&mut self, response: &dyn TracedResponse) {
        if self.finished {
            return;
        }
        if let (Some(labels), Some((key, value))) =
            (self.response_labels.as_mut(), response.operation_label())
        {
            labels.insert(key, value);
        }
    }

    fn operation_ended(&mut self, status: StatusCode) {
        if self.finished {
            return;
        }
        if self.attempt_start.is_some() {
            self.attempt_ended(status);
        }
        self.finished = true;

        if self.attempts == 0 {
            tracing::debug!(
                "operation {:?} ended without any attempt",
                self.base_labels.get(METHOD_KEY)
            );
        }

        let mut labels = self.base_labels.clone();
        if let Some(response_labels) = &self.response_labels {
            labels.extend(response_labels);
        }
        let labels = labels.with(STATUS_KEY, status.as_str());
        self.record(&self.names.operation_latency, self.operation_start, labels);
    }
}

impl Drop for MetricsTracer {
    fn drop(&mut self) {
        if !self.finished {
            self.operation_ended(StatusCode::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use latency_metrics::testing::CapturingRecorder;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ATTEMPT_LATENCY, OPERATION_LATENCY};

    fn factory(recorder: Arc<CapturingRecorder>) -> MetricsTracerFactory {
        MetricsTracerFactory::new(
            recorder,
            StoreIdentity {
                project_id: "p".to_string(),
                instance_id: "i".to_string(),
                app_profile_id: "default".to_string(),
            },
        )
    }

    #[test]
    fn attempt_end_without_start_is_ignored() {
        let recorder = Arc::new(CapturingRecorder::new());
        let mut tracer = factory(recorder.clone()).new_tracer("Bigtable.ReadRow");

        tracer.attempt_ended(StatusCode::Ok);

        assert!(recorder.by_instrument(ATTEMPT_LATENCY).is_empty());
    }

    #[test]
    fn second_operation_end_is_ignored() {
        let recorder = Arc::new(CapturingRecorder::new());
        let mut tracer = factory(recorder.clone()).new_tracer("Bigtable.ReadRow");

        tracer.attempt_started();
        tracer.attempt_ended(StatusCode::Ok);
        tracer.operation_ended(StatusCode::Ok);
        tracer.operation_ended(StatusCode::Internal);
        drop(tracer);

        let operations = recorder.by_instrument(OPERATION_LATENCY);
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].labels().get(STATUS_KEY), Some("OK"));
    }

    #[test]
    fn custom_instrument_names_are_used() {
        let recorder = Arc::new(CapturingRecorder::new());
        let names = InstrumentNames {
            attempt_latency: "attempts".to_string(),
            operation_latency: "operations".to_string(),
        };
        let mut tracer = factory(recorder.clone())
            .with_instrument_names(names)
            .new_tracer("Bigtable.MutateRow");

        tracer.attempt_started();
        tracer.operation_ended(StatusCode::Ok);

        assert_eq!(recorder.by_instrument("attempts").len(), 1);
        assert_eq!(recorder.by_instrument("operations").len(), 1);
        assert!(recorder.by_instrument(ATTEMPT_LATENCY).is_empty());
    }
}
