//! Uploaded documents used to ground document-category conversations.
//!
//! At most one document exists per conversation id; uploading again
//! replaces it.

mod error;
mod store;

pub use error::DocumentError;
pub use store::{
    clean_extracted_text, Document, DocumentSnapshot, DocumentStore, InMemoryDocumentStore,
    JsonFileDocumentStore, DEFAULT_FILE_NAME,
};
