//! In-memory recorder for tests and dry runs.

use std::sync::Mutex;

use crate::measurement::{Measurement, MetricsRecorder};

/// Keeps every recorded measurement in arrival order.
#[derive(Debug, Default)]
pub struct CapturingRecorder {
    measurements: Mutex<Vec<Measurement>>,
}

impl CapturingRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All measurements recorded so far.
    pub fn measurements(&self) -> Vec<Measurement> {
        self.lock().clone()
    }

    /// Measurements of the instrument `name`, in arrival order.
    pub fn by_instrument(&self, name: &str) -> Vec<Measurement> {
        self.lock()
            .iter()
            .filter(|m| m.instrument_name() == name)
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Measurement>> {
        // a panicking test thread must not hide the measurements of the others
        self.measurements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MetricsRecorder for CapturingRecorder {
    fn record(&self, measurement: Measurement) {
        self.lock().push(measurement);
    }
}
