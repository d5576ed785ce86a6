use crate::views::InstrumentSelector;

#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("a view is already registered for {0}")]
    DuplicateView(InstrumentSelector),

    #[error("bucket boundaries of view {view} must be finite and strictly ascending")]
    InvalidBuckets { view: String },

    #[error("view display name must not be empty")]
    EmptyViewName,

    #[error(transparent)]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
