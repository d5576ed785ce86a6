use tracer::StatusCode;

#[allow(missing_docs)]
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Status reported to tracers for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NotFound,
            Error::AlreadyExists(_) => StatusCode::AlreadyExists,
            Error::InvalidArgument(_) => StatusCode::InvalidArgument,
            Error::Unavailable(_) => StatusCode::Unavailable,
            Error::DeadlineExceeded(_) => StatusCode::DeadlineExceeded,
            Error::Internal(_) => StatusCode::Internal,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::DeadlineExceeded(_))
    }
}

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;
