//! Export sinks: periodic OTLP push and Prometheus pull.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use axum::{extract::State, http::header, http::StatusCode, routing::get, Router};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    metrics::{
        reader::{DefaultAggregationSelector, DefaultTemporalitySelector},
        PeriodicReader,
    },
    runtime,
};
use prometheus::TextEncoder;
use url::Url;

use crate::{metrics::PIPELINE_METRICS, Result};

/// Default flush interval of the push sink.
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(20);

const DEFAULT_EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration of the push sink.
///
/// The sink exports view display names verbatim, so the monitoring namespace of the
/// exported metrics is the prefix of the registered view names.
#[derive(Debug, Clone)]
pub struct PushSinkConfig {
    /// OTLP/gRPC collector endpoint.
    pub endpoint: Url,
    /// Interval between two exports.
    pub flush_interval: Duration,
    /// Timeout of a single export request.
    pub export_timeout: Duration,
}

impl PushSinkConfig {
    /// Push configuration with the default interval and timeout.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            flush_interval: DEFAULT_PUSH_INTERVAL,
            export_timeout: DEFAULT_EXPORT_TIMEOUT,
        }
    }

    /// Overrides the flush interval.
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }
}

pub(crate) fn push_reader(config: &PushSinkConfig) -> Result<PeriodicReader> {
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(config.endpoint.as_str())
        .with_timeout(config.export_timeout)
        .build_metrics_exporter(
            Box::new(DefaultAggregationSelector::new()),
            Box::new(DefaultTemporalitySelector::new()),
        )?;

    Ok(PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(config.flush_interval)
        .build())
}

/// Renders the current snapshot of `registry` in the Prometheus text format.
pub fn render_snapshot(registry: &prometheus::Registry) -> prometheus::Result<String> {
    let mut body = String::new();
    TextEncoder::new().encode_utf8(&registry.gather(), &mut body)?;
    Ok(body)
}

fn render_self_metrics() -> std::result::Result<String, std::fmt::Error> {
    let mut body = String::new();
    vise::MetricsCollection::default()
        .collect()
        .encode(&mut body, vise::Format::OpenMetricsForPrometheus)?;
    Ok(body)
}

/// Routes of the pull sink.
///
/// `/metrics` serves the OpenTelemetry snapshot, `/self-metrics` the process
/// internal `vise` metrics.
pub fn pull_router(registry: prometheus::Registry) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/self-metrics", get(scrape_self_metrics))
        .with_state(registry)
}

async fn scrape(
    State(registry): State<prometheus::Registry>,
) -> std::result::Result<([(header::HeaderName, &'static str); 1], String), StatusCode> {
    PIPELINE_METRICS.pull_scrapes.inc();

    let body = render_snapshot(&registry).map_err(|err| {
        vlog::error!("failed to encode metrics snapshot: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

async fn scrape_self_metrics() -> std::result::Result<String, StatusCode> {
    render_self_metrics().map_err(|err| {
        vlog::error!("failed to encode self metrics: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Serves the pull sink on `0.0.0.0:listen_port` until the server fails.
pub async fn run_pull_server(registry: prometheus::Registry, listen_port: u16) -> Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, listen_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    vlog::info!("serving metrics on {addr}");
    axum::serve(listener, pull_router(registry)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use crate::{
        InstrumentDescriptor, LabelSet, Measurement, MetricsPipelineBuilder, MetricsRecorder,
        UNIT_MILLIS,
    };

    use super::*;

    #[tokio::test]
    async fn pull_sink_serves_empty_snapshot_before_any_call() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .with_pull_sink()
            .build()
            .unwrap();

        let response = pull_router(pipeline.prometheus_registry())
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("latency"), "{body}");
    }

    #[tokio::test]
    async fn self_metrics_route_serves_vise_registry() {
        let pipeline = MetricsPipelineBuilder::new("test")
            .with_pull_sink()
            .build()
            .unwrap();

        let router = pull_router(pipeline.prometheus_registry());
        router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let response = router
            .oneshot(Request::get("/self-metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("latency_pipeline_pull_scrapes"), "{body}");
    }

    // The tonic exporter connects lazily, so building needs no running collector.
    #[tokio::test(flavor = "multi_thread")]
    async fn push_sink_builds_next_to_pull_sink() {
        let push = PushSinkConfig {
            export_timeout: Duration::from_millis(100),
            ..PushSinkConfig::new("http://127.0.0.1:4317".parse().unwrap())
        };
        let pipeline = MetricsPipelineBuilder::new("test")
            .with_push_sink(push)
            .with_pull_sink()
            .build()
            .unwrap();

        let recorder = pipeline.recorder(
            "push-test",
            &[InstrumentDescriptor::latency_histogram("pushed_latency", "")],
        );
        recorder.record(Measurement::new(
            "pushed_latency",
            3.0,
            UNIT_MILLIS,
            LabelSet::new(),
        ));

        let body = render_snapshot(&pipeline.prometheus_registry()).unwrap();
        assert!(body.contains("pushed_latency"), "{body}");

        // no collector listens, the final export is allowed to fail
        let _ = pipeline.shutdown();
    }

    #[test]
    fn push_config_defaults_to_twenty_seconds() {
        let config = PushSinkConfig::new("http://localhost:4317".parse().unwrap());

        assert_eq!(config.flush_interval, Duration::from_secs(20));
        assert_eq!(
            config
                .with_flush_interval(Duration::from_secs(5))
                .flush_interval,
            Duration::from_secs(5)
        );
    }
}
