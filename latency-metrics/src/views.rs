//! View definitions binding instruments to their exported shape.

use std::{collections::HashMap, fmt, sync::Arc};

use opentelemetry::Key;
use opentelemetry_sdk::metrics::{self as sdk, Instrument, Stream};

use crate::{measurement::InstrumentKind, Error, Result};

/// Millisecond bucket boundaries resolving both sub-millisecond and multi-second
/// tail latencies.
pub const LATENCY_BUCKETS_MS: [f64; 41] = [
    0.0, 0.01, 0.05, 0.1, 0.3, 0.6, 0.8, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0, 13.0, 16.0,
    20.0, 25.0, 30.0, 40.0, 50.0, 65.0, 80.0, 100.0, 130.0, 160.0, 200.0, 250.0, 300.0, 400.0,
    500.0, 650.0, 800.0, 1000.0, 2000.0, 5000.0, 10000.0, 20000.0, 50000.0, 100000.0,
];

/// Selects the instruments a view applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentSelector {
    /// Exact instrument name.
    pub name: String,
    /// Name of the meter owning the instrument.
    pub meter_name: String,
    /// Instrument kind.
    pub kind: InstrumentKind,
    /// Unit, if the selector is restricted to one.
    pub unit: Option<String>,
}

impl InstrumentSelector {
    /// Selects histograms called `name` created by the meter `meter_name`.
    pub fn histogram(name: impl Into<String>, meter_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            meter_name: meter_name.into(),
            kind: InstrumentKind::Histogram,
            unit: None,
        }
    }

    /// Selects counters called `name` created by the meter `meter_name`.
    pub fn counter(name: impl Into<String>, meter_name: impl Into<String>) -> Self {
        Self {
            kind: InstrumentKind::Counter,
            ..Self::histogram(name, meter_name)
        }
    }

    /// Restricts the selector to instruments recorded in `unit`.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    fn matches(&self, inst: &Instrument) -> bool {
        inst.name.as_ref() == self.name
            && inst.scope.name.as_ref() == self.meter_name
            && inst
                .kind
                .as_ref()
                .map_or(false, |kind| self.kind.matches(kind))
            && self
                .unit
                .as_deref()
                .map_or(true, |unit| inst.unit.as_ref() == unit)
    }
}

impl fmt::Display for InstrumentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}/{}", self.kind, self.meter_name, self.name)?;
        if let Some(unit) = &self.unit {
            write!(f, " [{unit}]")?;
        }
        Ok(())
    }
}

/// How values of a view are aggregated.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Histogram with explicit bucket boundaries.
    ExplicitBucketHistogram {
        /// Strictly ascending upper bounds.
        boundaries: Vec<f64>,
    },
    /// Sum of all recorded values.
    Sum,
}

impl Aggregation {
    /// Histogram over [`LATENCY_BUCKETS_MS`].
    pub fn latency_histogram() -> Self {
        Aggregation::ExplicitBucketHistogram {
            boundaries: LATENCY_BUCKETS_MS.to_vec(),
        }
    }

    fn to_sdk(&self) -> sdk::Aggregation {
        match self {
            Aggregation::ExplicitBucketHistogram { boundaries } => {
                sdk::Aggregation::ExplicitBucketHistogram {
                    boundaries: boundaries.clone(),
                    record_min_max: true,
                }
            }
            Aggregation::Sum => sdk::Aggregation::Sum,
        }
    }
}

/// Export-time name, description and aggregation of the selected instrument.
///
/// The display name may contain separators (`/`) that instrument names may not.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    /// Exported metric name.
    pub display_name: String,
    /// Exported description.
    pub description: String,
    /// Aggregation.
    pub aggregation: Aggregation,
    /// Attribute keys kept on export; `None` keeps every key.
    pub allowed_label_keys: Option<Vec<String>>,
}

impl ViewDefinition {
    /// A view without attribute filtering.
    pub fn new(
        display_name: impl Into<String>,
        description: impl Into<String>,
        aggregation: Aggregation,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            description: description.into(),
            aggregation,
            allowed_label_keys: None,
        }
    }

    /// Keeps only the given attribute keys on export, bounding the label cardinality.
    pub fn with_allowed_label_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.allowed_label_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(Error::EmptyViewName);
        }

        if let Aggregation::ExplicitBucketHistogram { boundaries } = &self.aggregation {
            let ascending = boundaries.windows(2).all(|w| w[0] < w[1]);
            if !ascending || boundaries.iter().any(|b| !b.is_finite()) {
                return Err(Error::InvalidBuckets {
                    view: self.display_name.clone(),
                });
            }
        }

        Ok(())
    }

    fn to_stream(&self, inst: &Instrument) -> Stream {
        let stream = Stream::new()
            .name(self.display_name.clone())
            .description(self.description.clone())
            .unit(inst.unit.clone())
            .aggregation(self.aggregation.to_sdk());

        match &self.allowed_label_keys {
            Some(keys) => stream.allowed_attribute_keys(keys.iter().cloned().map(Key::from)),
            None => stream,
        }
    }
}

/// The set of views of one pipeline. At most one view per selector.
#[derive(Debug, Default)]
pub struct ViewRegistry {
    views: HashMap<InstrumentSelector, Arc<ViewDefinition>>,
}

impl ViewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `view` for `selector`.
    ///
    /// Fails with [`Error::DuplicateView`] if the selector already has a view, and on
    /// malformed view definitions.
    pub fn register(&mut self, selector: InstrumentSelector, view: ViewDefinition) -> Result<()> {
        view.validate()?;

        if self.views.contains_key(&selector) {
            return Err(Error::DuplicateView(selector));
        }

        tracing::debug!("registering view {} for {selector}", view.display_name);
        self.views.insert(selector, Arc::new(view));

        Ok(())
    }

    /// The view registered for `selector`.
    pub fn get(&self, selector: &InstrumentSelector) -> Option<&ViewDefinition> {
        self.views.get(selector).map(Arc::as_ref)
    }

    /// Number of registered views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether no view is registered.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub(crate) fn into_sdk_views(
        self,
    ) -> impl Iterator<Item = impl Fn(&Instrument) -> Option<Stream> + Send + Sync + 'static> {
        self.views.into_iter().map(|(selector, view)| {
            move |inst: &Instrument| selector.matches(inst).then(|| view.to_stream(inst))
        })
    }
}
