//! Startup-time wiring of views and sinks into an OpenTelemetry meter provider.

use std::{collections::HashMap, sync::Arc};

use opentelemetry::{
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, Resource};

use crate::{
    measurement::{InstrumentDescriptor, InstrumentKind, Measurement, MetricsRecorder},
    metrics::PIPELINE_METRICS,
    sinks::{self, PushSinkConfig},
    views::{InstrumentSelector, ViewDefinition, ViewRegistry},
    Result,
};

const ATTR_SERVICE_NAME: &str = "service.name";

/// Unconfigured pipeline: collects views and sinks, no instruments exist yet.
pub struct MetricsPipelineBuilder {
    service_name: String,
    views: ViewRegistry,
    push: Option<PushSinkConfig>,
    pull: bool,
}

impl MetricsPipelineBuilder {
    /// Starts configuring a pipeline for the service `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            views: ViewRegistry::new(),
            push: None,
            pull: false,
        }
    }

    /// Registers a view; a second view for the same selector is an error.
    pub fn register_view(
        mut self,
        selector: InstrumentSelector,
        view: ViewDefinition,
    ) -> Result<Self> {
        self.views.register(selector, view)?;
        Ok(self)
    }

    /// Registers every `(selector, view)` pair, failing on the first duplicate.
    pub fn register_views<I>(mut self, views: I) -> Result<Self>
    where
        I: IntoIterator<Item = (InstrumentSelector, ViewDefinition)>,
    {
        for (selector, view) in views {
            self.views.register(selector, view)?;
        }
        Ok(self)
    }

    /// Attaches the periodic push sink.
    pub fn with_push_sink(mut self, config: PushSinkConfig) -> Self {
        self.push = Some(config);
        self
    }

    /// Attaches the pull sink; serve it with [`sinks::run_pull_server`].
    pub fn with_pull_sink(mut self) -> Self {
        self.pull = true;
        self
    }

    /// Builds the meter provider. This is the only way to obtain a
    /// [`MetricsPipeline`], so no instrument exists before views and sinks are set.
    ///
    /// A push sink requires a running tokio runtime.
    pub fn build(self) -> Result<MetricsPipeline> {
        let resource = Resource::default().merge(&Resource::new(vec![KeyValue::new(
            ATTR_SERVICE_NAME,
            self.service_name.clone(),
        )]));

        let view_count = self.views.len();
        let mut builder = SdkMeterProvider::builder().with_resource(resource);
        for view in self.views.into_sdk_views() {
            builder = builder.with_view(view);
        }

        let prometheus_registry = prometheus::Registry::new();
        if self.pull {
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(prometheus_registry.clone())
                .without_target_info()
                .build()?;
            builder = builder.with_reader(exporter);
        }

        if let Some(push) = &self.push {
            builder = builder.with_reader(sinks::push_reader(push)?);
        }

        install_error_handler();

        vlog::info!(
            service_name = %self.service_name,
            views = view_count,
            pull_sink = self.pull,
            push_endpoint = %self.push.as_ref().map_or("none", |p| p.endpoint.as_str()),
            "metrics pipeline configured"
        );

        Ok(MetricsPipeline {
            provider: builder.build(),
            prometheus_registry,
        })
    }
}

// Export failures surface through the SDK's global error handler, never through the
// recording call.
fn install_error_handler() {
    let installed = opentelemetry::global::set_error_handler(|err| {
        PIPELINE_METRICS.export_errors.inc();
        vlog::warn!("metrics pipeline error: {err}");
    });

    if let Err(err) = installed {
        vlog::warn!("failed to install metrics error handler: {err}");
    }
}

/// Configured pipeline. Created once at startup and passed by reference to whatever
/// needs to emit measurements.
pub struct MetricsPipeline {
    provider: SdkMeterProvider,
    prometheus_registry: prometheus::Registry,
}

impl MetricsPipeline {
    /// Creates a recorder for the meter `meter_name` accepting the given instruments.
    ///
    /// Instruments are created eagerly, so the recorder needs no locking afterwards.
    pub fn recorder(
        &self,
        meter_name: &str,
        instruments: &[InstrumentDescriptor],
    ) -> Arc<OtelRecorder> {
        let meter = self.provider.meter(meter_name.to_string());

        let instruments = instruments
            .iter()
            .map(|descriptor| {
                (
                    descriptor.name.to_string(),
                    OtelInstrument::new(&meter, descriptor),
                )
            })
            .collect();

        Arc::new(OtelRecorder { instruments })
    }

    /// Registry backing the pull sink. Empty if no pull sink is attached.
    pub fn prometheus_registry(&self) -> prometheus::Registry {
        self.prometheus_registry.clone()
    }

    /// Flushes pending measurements to the push sink.
    pub fn force_flush(&self) -> Result<()> {
        Ok(self.provider.force_flush()?)
    }

    /// Flushes and stops every reader.
    pub fn shutdown(&self) -> Result<()> {
        Ok(self.provider.shutdown()?)
    }
}

enum OtelInstrument {
    Histogram(Histogram<f64>),
    Counter(Counter<f64>),
}

impl OtelInstrument {
    fn new(meter: &Meter, descriptor: &InstrumentDescriptor) -> Self {
        match descriptor.kind {
            InstrumentKind::Histogram => OtelInstrument::Histogram(
                meter
                    .f64_histogram(descriptor.name.clone())
                    .with_description(descriptor.description.clone())
                    .with_unit(descriptor.unit.clone())
                    .init(),
            ),
            InstrumentKind::Counter => OtelInstrument::Counter(
                meter
                    .f64_counter(descriptor.name.clone())
                    .with_description(descriptor.description.clone())
                    .with_unit(descriptor.unit.clone())
                    .init(),
            ),
        }
    }
}

/// [`MetricsRecorder`] forwarding measurements to OpenTelemetry histograms and
/// counters. Counter measurements are increments.
pub struct OtelRecorder {
    instruments: HashMap<String, OtelInstrument>,
}

impl MetricsRecorder for OtelRecorder {
    fn record(&self, measurement: Measurement) {
        let attributes = measurement.labels().to_key_values();
        match self.instruments.get(measurement.instrument_name()) {
            Some(OtelInstrument::Histogram(histogram)) => {
                histogram.record(measurement.value(), &attributes)
            }
            Some(OtelInstrument::Counter(counter)) => counter.add(measurement.value(), &attributes),
            None => tracing::debug!(
                "dropping measurement of unknown instrument {}",
                measurement.instrument_name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        labels::LabelSet,
        measurement::UNIT_MILLIS,
        sinks::render_snapshot,
        views::{Aggregation, LATENCY_BUCKETS_MS},
        Error,
    };

    use super::*;

    const METER: &str = "pipeline-test";

    fn descriptors() -> Vec<InstrumentDescriptor> {
        vec![
            InstrumentDescriptor::latency_histogram("attempt_latency_test", "attempts"),
            InstrumentDescriptor::latency_histogram("operation_latency_test", "operations"),
        ]
    }

    #[test]
    fn duplicate_view_fails_before_build() {
        let selector = InstrumentSelector::histogram("attempt_latency_test", METER);
        let view = ViewDefinition::new("a", "a", Aggregation::latency_histogram());

        let result = MetricsPipelineBuilder::new("test")
            .register_view(selector.clone(), view.clone())
            .and_then(|builder| builder.register_view(selector, view));

        assert!(matches!(result, Err(Error::DuplicateView(_))));
    }

    #[test]
    fn pull_sink_exports_view_names_and_labels() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .register_view(
                InstrumentSelector::histogram("operation_latency_test", METER)
                    .with_unit(UNIT_MILLIS),
                ViewDefinition::new(
                    "custom/operation_latency_view",
                    "Operation latency in msecs",
                    Aggregation::latency_histogram(),
                ),
            )
            .unwrap()
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(METER, &descriptors());
        recorder.record(Measurement::new(
            "operation_latency_test",
            12.0,
            UNIT_MILLIS,
            LabelSet::new().with("rowKey", "rowKey0").with("status", "OK"),
        ));

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();

        assert!(body.contains("custom_operation_latency_view"), "{body}");
        assert!(body.contains(r#"rowKey="rowKey0""#), "{body}");
        assert!(body.contains(r#"status="OK""#), "{body}");
        assert!(!body.contains("operation_latency_test"), "{body}");
        assert!(LATENCY_BUCKETS_MS.len() + 1 <= body.matches("_bucket{").count());
    }

    #[test]
    fn allowed_label_keys_drop_unknown_labels() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .register_view(
                InstrumentSelector::histogram("attempt_latency_test", METER),
                ViewDefinition::new("attempts_view", "", Aggregation::latency_histogram())
                    .with_allowed_label_keys(["status"]),
            )
            .unwrap()
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(METER, &descriptors());
        recorder.record(Measurement::new(
            "attempt_latency_test",
            1.0,
            UNIT_MILLIS,
            LabelSet::new()
                .with("status", "UNAVAILABLE")
                .with("request_id", "42"),
        ));

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();

        assert!(body.contains(r#"status="UNAVAILABLE""#), "{body}");
        assert!(!body.contains("request_id"), "{body}");
    }

    #[test]
    fn counters_add_up_recorded_values() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .register_view(
                InstrumentSelector::counter("retries_test", METER),
                ViewDefinition::new("retries_view", "Retries", Aggregation::Sum),
            )
            .unwrap()
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(
            METER,
            &[InstrumentDescriptor::counter("retries_test", "retries", "")],
        );
        for _ in 0..2 {
            recorder.record(Measurement::new(
                "retries_test",
                1.0,
                "",
                LabelSet::new().with("status", "UNAVAILABLE"),
            ));
        }

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();

        assert!(
            body.lines()
                .any(|line| line.starts_with("retries_view_total{") && line.ends_with(" 2")),
            "{body}"
        );
        assert!(!body.contains("retries_test"), "{body}");
    }

    #[test]
    fn unknown_instrument_is_dropped_silently() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(METER, &descriptors());
        recorder.record(Measurement::new(
            "not_registered",
            1.0,
            UNIT_MILLIS,
            LabelSet::new(),
        ));

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();
        assert!(!body.contains("not_registered"), "{body}");
    }
}
