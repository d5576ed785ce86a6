use std::fmt;

/// Outcome of an attempt or an operation, named after the gRPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Completed successfully.
    Ok,
    /// Abandoned by the caller before it completed.
    Cancelled,
    /// Rejected because of a malformed request.
    InvalidArgument,
    /// Did not complete before its deadline. Retried.
    DeadlineExceeded,
    /// The table or row does not exist.
    NotFound,
    /// The table being created already exists.
    AlreadyExists,
    /// The store failed.
    Internal,
    /// The store was temporarily unreachable. Retried.
    Unavailable,
}

impl StatusCode {
    /// Label value of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn label_values_are_distinct_grpc_names() {
        let all = [
            StatusCode::Ok,
            StatusCode::Cancelled,
            StatusCode::InvalidArgument,
            StatusCode::DeadlineExceeded,
            StatusCode::NotFound,
            StatusCode::AlreadyExists,
            StatusCode::Internal,
            StatusCode::Unavailable,
        ];

        let values: HashSet<_> = all.iter().map(StatusCode::as_str).collect();
        assert_eq!(values.len(), all.len());
        assert!(values
            .iter()
            .all(|v| v.chars().all(|c| c.is_ascii_uppercase() || c == '_')));
        assert_eq!(StatusCode::DeadlineExceeded.to_string(), "DEADLINE_EXCEEDED");
    }
}
