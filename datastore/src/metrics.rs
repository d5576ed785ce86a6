//! Metrics for datastore

#![allow(unexpected_cfgs)]

use std::time::Duration;

use vise::{Buckets, Counter, Histogram, LabeledFamily, Metrics};

/// Datastore metrics.
#[derive(Debug, Metrics)]
#[metrics(prefix = "datastore")]
pub(super) struct DatastoreMetrics {
    /// Latency of a single store call, by method and resulting status.
    #[metrics(buckets = Buckets::LATENCIES, labels = ["method", "status"])]
    pub call: LabeledFamily<(&'static str, &'static str), Histogram<Duration>, 2>,

    /// Attempts retried after a transient failure.
    #[metrics(labels = ["method"])]
    pub retries: LabeledFamily<&'static str, Counter>,

    /// Operations that failed after the last allowed attempt.
    #[metrics(labels = ["method"])]
    pub retries_exhausted: LabeledFamily<&'static str, Counter>,
}

#[vise::register]
pub(super) static DATASTORE_METRICS: vise::Global<DatastoreMetrics> = vise::Global::new();
