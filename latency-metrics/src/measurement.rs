//! Measurements and the recording seam between producers and the pipeline.

use std::{borrow::Cow, time::SystemTime};

use auto_impl::auto_impl;

use crate::labels::LabelSet;

/// Unit of latency instruments.
pub const UNIT_MILLIS: &str = "ms";

/// Kind of an instrument, as matched by view selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    /// Records a distribution of values.
    Histogram,
    /// Monotonic sum.
    Counter,
}

impl InstrumentKind {
    pub(crate) fn matches(self, kind: &opentelemetry_sdk::metrics::InstrumentKind) -> bool {
        use opentelemetry_sdk::metrics::InstrumentKind as Otel;

        matches!(
            (self, kind),
            (InstrumentKind::Histogram, Otel::Histogram) | (InstrumentKind::Counter, Otel::Counter)
        )
    }
}

/// Static description of an instrument a recorder must be able to accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDescriptor {
    /// Instrument name, as used by [`Measurement::instrument_name`].
    pub name: Cow<'static, str>,
    /// Human readable description.
    pub description: Cow<'static, str>,
    /// Unit of recorded values.
    pub unit: Cow<'static, str>,
    /// Instrument kind.
    pub kind: InstrumentKind,
}

impl InstrumentDescriptor {
    /// A histogram of millisecond latencies.
    pub fn latency_histogram(
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: Cow::Borrowed(UNIT_MILLIS),
            kind: InstrumentKind::Histogram,
        }
    }

    /// A monotonic counter; recorded values are added up.
    pub fn counter(
        name: impl Into<Cow<'static, str>>,
        description: impl Into<Cow<'static, str>>,
        unit: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            unit: unit.into(),
            kind: InstrumentKind::Counter,
        }
    }
}

/// A single recorded value. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    instrument_name: Cow<'static, str>,
    value: f64,
    unit: &'static str,
    labels: LabelSet,
    timestamp: SystemTime,
}

impl Measurement {
    /// Creates a measurement stamped with the current wall clock time.
    pub fn new(
        instrument_name: impl Into<Cow<'static, str>>,
        value: f64,
        unit: &'static str,
        labels: LabelSet,
    ) -> Self {
        Self {
            instrument_name: instrument_name.into(),
            value,
            unit,
            labels,
            timestamp: SystemTime::now(),
        }
    }

    /// Name of the instrument the value belongs to.
    pub fn instrument_name(&self) -> &str {
        &self.instrument_name
    }

    /// Recorded value.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Unit of [`Measurement::value`].
    pub fn unit(&self) -> &'static str {
        self.unit
    }

    /// Attached labels.
    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    /// Wall clock time of creation.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

/// Ingestion path of the metrics pipeline.
///
/// Implementations must be safe to call concurrently and must not block: recording
/// is fire-and-forget for the caller and never reports an error back.
#[auto_impl(&, Arc, Box)]
pub trait MetricsRecorder: Send + Sync {
    /// Hands a measurement over to the pipeline.
    fn record(&self, measurement: Measurement);
}
