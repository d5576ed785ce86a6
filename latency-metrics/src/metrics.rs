//! Metrics for the metrics pipeline itself

use vise::{Counter, Metrics};

/// Pipeline self metrics.
#[derive(Debug, Metrics)]
#[metrics(prefix = "latency_pipeline")]
pub(super) struct PipelineMetrics {
    /// Errors reported by the SDK, e.g. a push export that failed.
    pub export_errors: Counter,

    /// Number of snapshots served by the pull sink.
    pub pull_scrapes: Counter,
}

#[allow(unexpected_cfgs)]
#[vise::register]
pub(super) static PIPELINE_METRICS: vise::Global<PipelineMetrics> = vise::Global::new();
