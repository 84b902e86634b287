//! Chat pipeline error types.

use crate::ai::GenerationError;
use crate::document::DocumentError;
use crate::history::HistoryError;

/// Errors surfaced by the chat pipeline.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// A document-grounded conversation has no uploaded document.
    #[error("No document uploaded for conversation {conversation_id}")]
    DocumentNotFound { conversation_id: String },

    #[error("Document store error: {0}")]
    Document(#[from] DocumentError),

    #[error("History store error: {0}")]
    History(#[from] HistoryError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = CoreError::DocumentNotFound {
            conversation_id: "c-1".to_string(),
        };
        assert_eq!(err.to_string(), "No document uploaded for conversation c-1");
    }

    #[test]
    fn test_from_history_error() {
        let err: CoreError = HistoryError::Unavailable("down".to_string()).into();
        assert!(matches!(err, CoreError::History(_)));
    }
}
