//! Metrics for main binary

#![allow(unexpected_cfgs)]

use vise::{Counter, Metrics};

/// Main binary metrics
#[derive(Debug, Metrics)]
#[metrics(prefix = "bigtable_sample")]
pub(super) struct SampleMainMetrics {
    /// Rows written while seeding the sample table.
    pub rows_seeded: Counter,
}

#[vise::register]
pub(super) static MAIN_METRICS: vise::Global<SampleMainMetrics> = vise::Global::new();
