//! Document store error types.

/// Errors that can occur while storing or loading documents.
#[derive(thiserror::Error, Debug)]
pub enum DocumentError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
