//! Durable history store backed by a JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::error::HistoryError;
use super::store::{InMemoryStore, KeyedStore};
use super::types::{ConversationKey, HistorySnapshot, Message};
use crate::snapshot::{read_snapshot, write_snapshot};

/// History served from memory, loaded from and flushed to a JSON file.
///
/// The file is only touched by [`KeyedStore::load_all`] and
/// [`KeyedStore::flush`]; the hosting process decides when to call them.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    inner: InMemoryStore,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inner: InMemoryStore::new(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyedStore for JsonFileStore {
    async fn register(&self, key: &ConversationKey) -> Result<(), HistoryError> {
        self.inner.register(key).await
    }

    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), HistoryError> {
        self.inner.append(key, message).await
    }

    async fn list(&self, key: &ConversationKey) -> Result<Vec<Message>, HistoryError> {
        self.inner.list(key).await
    }

    async fn conversations(&self, category: &str) -> Result<Vec<String>, HistoryError> {
        self.inner.conversations(category).await
    }

    async fn load_all(&self) -> Result<HistorySnapshot, HistoryError> {
        let Some(snapshot) = read_snapshot::<HistorySnapshot, HistoryError>(&self.path).await?
        else {
            tracing::debug!(path = %self.path.display(), "No history file found");
            return Ok(HistorySnapshot::new());
        };

        tracing::info!(
            path = %self.path.display(),
            categories = snapshot.len(),
            "Loaded conversation history"
        );
        self.inner.replace(snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn flush(&self) -> Result<(), HistoryError> {
        let snapshot = self.inner.snapshot().await;
        write_snapshot::<_, HistoryError>(&self.path, &snapshot).await?;
        tracing::info!(path = %self.path.display(), "Persisted conversation history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("messages.json"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        let key = ConversationKey::new("service", "c1");

        let store = JsonFileStore::new(&path);
        store.append(&key, Message::user("q")).await.unwrap();
        store.append(&key, Message::assistant("a")).await.unwrap();
        store.flush().await.unwrap();

        let reloaded = JsonFileStore::new(&path);
        let snapshot = reloaded.load_all().await.unwrap();
        assert_eq!(snapshot["service"]["c1"].len(), 2);
        assert_eq!(reloaded.list(&key).await.unwrap()[1].text, "a");
    }

    #[tokio::test]
    async fn test_corrupt_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        tokio::fs::write(&path, "[broken").await.unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load_all().await, Err(HistoryError::Json(_))));
    }
}
