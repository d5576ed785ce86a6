//! Instruments emitted by [`MetricsTracer`](crate::MetricsTracer) and their views.

use latency_metrics::{
    Aggregation, InstrumentDescriptor, InstrumentSelector, ViewDefinition, UNIT_MILLIS,
};

use crate::labels::{
    APP_PROFILE_KEY, INSTANCE_ID_KEY, METHOD_KEY, PROJECT_ID_KEY, ROW_KEY, STATUS_KEY,
};

/// Meter owning the latency instruments.
pub const METER_NAME: &str = "bigtable-metrics-sample";

/// Attempt latency instrument. Instrument names may not contain `/`, the view
/// restores the slash separated name on export.
pub const ATTEMPT_LATENCY: &str = "cloud.google.com_java_bigtable_attempt_latency";

/// Operation latency instrument.
pub const OPERATION_LATENCY: &str = "operation_latency";

/// Default prefix of the exported view names.
pub const DEFAULT_NAMESPACE_PREFIX: &str = "custom.googleapis.com/opentelemetry";

const VIEW_NAMESPACE: &str = "cloud.google.com/java/bigtable";

const BASE_LABEL_KEYS: [&str; 5] = [
    PROJECT_ID_KEY,
    INSTANCE_ID_KEY,
    APP_PROFILE_KEY,
    METHOD_KEY,
    STATUS_KEY,
];

/// Names of the two latency instruments. Independent of the exported view names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentNames {
    /// Per attempt latency.
    pub attempt_latency: String,
    /// Per operation latency.
    pub operation_latency: String,
}

impl Default for InstrumentNames {
    fn default() -> Self {
        Self {
            attempt_latency: ATTEMPT_LATENCY.to_string(),
            operation_latency: OPERATION_LATENCY.to_string(),
        }
    }
}

impl InstrumentNames {
    /// Instruments a recorder must accept for tracers using these names.
    pub fn descriptors(&self) -> Vec<InstrumentDescriptor> {
        vec![
            InstrumentDescriptor::latency_histogram(
                self.attempt_latency.clone(),
                "Duration of an individual operation attempt",
            ),
            InstrumentDescriptor::latency_histogram(
                self.operation_latency.clone(),
                "Total time until final operation success or failure, including retries",
            ),
        ]
    }

    /// Every view of the sample: both latency histograms and the attempt count.
    pub fn views(&self, namespace_prefix: &str) -> Vec<(InstrumentSelector, ViewDefinition)> {
        let mut views = self.latency_views(namespace_prefix);
        views.push(self.attempt_count_view(namespace_prefix));
        views
    }

    /// Sum over the attempt latency instrument, exported as
    /// `{namespace_prefix}/cloud.google.com/java/bigtable/attempt_count`.
    ///
    /// Its selector carries no unit, so it coexists with the millisecond latency view
    /// of the same instrument.
    pub fn attempt_count_view(
        &self,
        namespace_prefix: &str,
    ) -> (InstrumentSelector, ViewDefinition) {
        let prefix = namespace_prefix.trim_end_matches('/');

        (
            InstrumentSelector::histogram(self.attempt_latency.clone(), METER_NAME),
            ViewDefinition::new(
                format!("{prefix}/{VIEW_NAMESPACE}/attempt_count"),
                "Attempt count",
                Aggregation::Sum,
            )
            .with_allowed_label_keys(BASE_LABEL_KEYS),
        )
    }

    /// Views exporting both instruments as millisecond histograms under
    /// `{namespace_prefix}/cloud.google.com/java/bigtable/...`.
    pub fn latency_views(
        &self,
        namespace_prefix: &str,
    ) -> Vec<(InstrumentSelector, ViewDefinition)> {
        let prefix = namespace_prefix.trim_end_matches('/');

        vec![
            (
                InstrumentSelector::histogram(self.attempt_latency.clone(), METER_NAME)
                    .with_unit(UNIT_MILLIS),
                ViewDefinition::new(
                    format!("{prefix}/{VIEW_NAMESPACE}/attempt_latency"),
                    "Attempt latency in msecs",
                    Aggregation::latency_histogram(),
                )
                .with_allowed_label_keys(BASE_LABEL_KEYS),
            ),
            (
                InstrumentSelector::histogram(self.operation_latency.clone(), METER_NAME)
                    .with_unit(UNIT_MILLIS),
                ViewDefinition::new(
                    format!("{prefix}/{VIEW_NAMESPACE}/operation_latency"),
                    "Operation latency in msecs",
                    Aggregation::latency_histogram(),
                )
                .with_allowed_label_keys(BASE_LABEL_KEYS.into_iter().chain([ROW_KEY])),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use latency_metrics::{render_snapshot, Error, MetricsPipelineBuilder};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ApiTracerFactory, MetricsTracerFactory, StatusCode, StoreIdentity};

    #[test]
    fn attempt_instrument_name_has_no_separators() {
        let names = InstrumentNames::default();
        assert!(!names.attempt_latency.contains('/'));
        assert!(!names.operation_latency.contains('/'));
    }

    #[test]
    fn view_names_keep_separators() {
        let views =
            InstrumentNames::default().latency_views("custom.googleapis.com/opentelemetry/");

        let names: Vec<_> = views.iter().map(|(_, v)| v.display_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "custom.googleapis.com/opentelemetry/cloud.google.com/java/bigtable/attempt_latency",
                "custom.googleapis.com/opentelemetry/cloud.google.com/java/bigtable/operation_latency",
            ]
        );
    }

    #[test]
    fn registering_latency_views_twice_fails() {
        let names = InstrumentNames::default();

        let result = MetricsPipelineBuilder::new("test")
            .register_views(names.latency_views(DEFAULT_NAMESPACE_PREFIX))
            .and_then(|b| b.register_views(names.latency_views("other")));

        assert!(matches!(result, Err(Error::DuplicateView(_))));
    }

    #[test]
    fn attempt_count_view_is_distinct_from_attempt_latency() {
        let names = InstrumentNames::default();
        let (count_selector, count_view) = names.attempt_count_view(DEFAULT_NAMESPACE_PREFIX);
        let (latency_selector, _) = names.latency_views(DEFAULT_NAMESPACE_PREFIX).remove(0);

        assert_eq!(count_selector.name, latency_selector.name);
        assert_ne!(count_selector, latency_selector);
        assert_eq!(
            count_view.display_name,
            "custom.googleapis.com/opentelemetry/cloud.google.com/java/bigtable/attempt_count"
        );
        assert_eq!(count_view.aggregation, Aggregation::Sum);
    }

    #[test]
    fn pull_sink_exposes_every_view() {
        let names = InstrumentNames::default();
        let pipeline = MetricsPipelineBuilder::new("test")
            .register_views(names.views(DEFAULT_NAMESPACE_PREFIX))
            .unwrap()
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(METER_NAME, &names.descriptors());
        let factory = MetricsTracerFactory::new(
            recorder,
            StoreIdentity {
                project_id: "p".to_string(),
                instance_id: "i".to_string(),
                app_profile_id: "default".to_string(),
            },
        );
        let mut tracer = factory.new_tracer("Bigtable.ReadRow");
        tracer.attempt_started();
        tracer.attempt_ended(StatusCode::Unavailable);
        tracer.attempt_started();
        tracer.attempt_ended(StatusCode::Ok);
        tracer.operation_ended(StatusCode::Ok);
        drop(tracer);

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();

        assert!(body.contains("bigtable_attempt_latency"), "{body}");
        assert!(body.contains("bigtable_operation_latency"), "{body}");
        assert!(body.contains("bigtable_attempt_count"), "{body}");
        assert!(body.contains(r#"status="UNAVAILABLE""#), "{body}");
    }
}
