//! History store error types.

/// Errors that can occur while reading or writing conversation history.
#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    /// Backend cannot be reached.
    #[error("History store unavailable: {0}")]
    Unavailable(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let err = HistoryError::Unavailable("disk full".to_string());
        assert_eq!(err.to_string(), "History store unavailable: disk full");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: HistoryError = io_err.into();
        assert!(matches!(err, HistoryError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }
}
