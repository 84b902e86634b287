//! Document type, store trait, and in-memory and JSON-file implementations.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::error::DocumentError;
use crate::snapshot::{read_snapshot, write_snapshot};

/// File name used when an upload does not carry one.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// Extracted text of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub conversation_id: String,
    pub file_name: String,
    pub text: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Create a document, cleaning the extracted text.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        file_name: Option<String>,
        raw_text: &str,
    ) -> Self {
        let file_name = file_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        Self {
            conversation_id: conversation_id.into(),
            file_name,
            text: clean_extracted_text(raw_text),
            uploaded_at: Utc::now(),
        }
    }

    /// Length of the text in characters.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Strip NUL characters and surrounding whitespace left by text extraction.
#[must_use]
pub fn clean_extracted_text(raw: &str) -> String {
    raw.replace('\u{0}', "").trim().to_string()
}

/// All stored documents keyed by conversation id.
pub type DocumentSnapshot = BTreeMap<String, Document>;

/// Storage for the single grounding document of each conversation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a document, returning the one it replaced.
    async fn put(&self, document: Document) -> Result<Option<Document>, DocumentError>;

    /// The current document of a conversation.
    async fn get(&self, conversation_id: &str) -> Result<Option<Document>, DocumentError>;

    /// Just the text of the current document.
    async fn document_text(&self, conversation_id: &str) -> Result<Option<String>, DocumentError> {
        Ok(self.get(conversation_id).await?.map(|doc| doc.text))
    }

    /// Load durable state into the store, returning the document count.
    async fn load_all(&self) -> Result<usize, DocumentError>;

    /// Write current state to durable storage.
    async fn flush(&self) -> Result<(), DocumentError>;
}

/// Documents kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<DocumentSnapshot>,
}

impl InMemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn snapshot(&self) -> DocumentSnapshot {
        self.documents.read().await.clone()
    }

    async fn replace(&self, snapshot: DocumentSnapshot) {
        *self.documents.write().await = snapshot;
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn put(&self, document: Document) -> Result<Option<Document>, DocumentError> {
        tracing::debug!(
            conversation_id = %document.conversation_id,
            chars = document.text_len(),
            "Stored document"
        );
        Ok(self
            .documents
            .write()
            .await
            .insert(document.conversation_id.clone(), document))
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Document>, DocumentError> {
        Ok(self.documents.read().await.get(conversation_id).cloned())
    }

    async fn load_all(&self) -> Result<usize, DocumentError> {
        Ok(self.documents.read().await.len())
    }

    async fn flush(&self) -> Result<(), DocumentError> {
        Ok(())
    }
}

/// Documents served from memory, loaded from and flushed to a JSON file.
#[derive(Debug)]
pub struct JsonFileDocumentStore {
    path: PathBuf,
    inner: InMemoryDocumentStore,
}

impl JsonFileDocumentStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: InMemoryDocumentStore::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentStore for JsonFileDocumentStore {
    async fn put(&self, document: Document) -> Result<Option<Document>, DocumentError> {
        self.inner.put(document).await
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Document>, DocumentError> {
        self.inner.get(conversation_id).await
    }

    async fn load_all(&self) -> Result<usize, DocumentError> {
        let snapshot = read_snapshot::<DocumentSnapshot, DocumentError>(&self.path)
            .await?
            .unwrap_or_default();
        let count = snapshot.len();
        self.inner.replace(snapshot).await;
        tracing::info!(path = %self.path.display(), count, "Loaded documents");
        Ok(count)
    }

    async fn flush(&self) -> Result<(), DocumentError> {
        let snapshot = self.inner.snapshot().await;
        write_snapshot::<_, DocumentError>(&self.path, &snapshot).await?;
        tracing::info!(path = %self.path.display(), count = snapshot.len(), "Persisted documents");
        Ok(())
    }
}
