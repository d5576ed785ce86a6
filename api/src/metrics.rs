//! Metrics for api

#![allow(unexpected_cfgs)]

use vise::{Counter, EncodeLabelSet, EncodeLabelValue, LabeledFamily, Metrics};

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EncodeLabelValue, EncodeLabelSet)]
#[metrics(label = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Rows were returned.
    Ok,
    /// The requested row or table does not exist.
    NotFound,
    /// The store failed.
    Error,
}

const LABELS: [&str; 2] = ["route", "outcome"];
type Labels = (&'static str, Outcome);

#[derive(Debug, Metrics)]
#[metrics(prefix = "api")]
pub(super) struct ApiMetrics {
    /// Requests served, by route and outcome
    #[metrics(labels = LABELS)]
    pub requests: LabeledFamily<Labels, Counter, 2>,
}

#[vise::register]
pub(super) static API_METRICS: vise::Global<ApiMetrics> = vise::Global::new();
