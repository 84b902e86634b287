//! Keyed history store trait and its in-memory implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::error::HistoryError;
use super::types::{ConversationKey, HistorySnapshot, Message};

/// Append-only message log partitioned by conversation key.
///
/// Implementations serialize writers: concurrent appends to one key never
/// interleave or get lost.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Make a conversation known without adding a message.
    async fn register(&self, key: &ConversationKey) -> Result<(), HistoryError>;

    /// Append a message to the end of a conversation.
    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), HistoryError>;

    /// All messages of a conversation in arrival order.
    async fn list(&self, key: &ConversationKey) -> Result<Vec<Message>, HistoryError>;

    /// Known conversation ids within a category, sorted.
    async fn conversations(&self, category: &str) -> Result<Vec<String>, HistoryError>;

    /// Load durable state into the store and return it.
    async fn load_all(&self) -> Result<HistorySnapshot, HistoryError>;

    /// Write current state to durable storage.
    async fn flush(&self) -> Result<(), HistoryError>;
}

/// History kept in process memory behind a single lock.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: RwLock<HistorySnapshot>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: HistorySnapshot) -> Self {
        Self {
            conversations: RwLock::new(snapshot),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> HistorySnapshot {
        self.conversations.read().await.clone()
    }

    /// Replace the current contents.
    pub async fn replace(&self, snapshot: HistorySnapshot) {
        *self.conversations.write().await = snapshot;
    }
}

#[async_trait]
impl KeyedStore for InMemoryStore {
    async fn register(&self, key: &ConversationKey) -> Result<(), HistoryError> {
        self.conversations
            .write()
            .await
            .entry(key.category.clone())
            .or_default()
            .entry(key.conversation_id.clone())
            .or_default();
        Ok(())
    }

    async fn append(&self, key: &ConversationKey, message: Message) -> Result<(), HistoryError> {
        let mut conversations = self.conversations.write().await;
        let messages = conversations
            .entry(key.category.clone())
            .or_default()
            .entry(key.conversation_id.clone())
            .or_default();
        messages.push(message);
        tracing::trace!(key = %key, count = messages.len(), "Appended message");
        Ok(())
    }

    async fn list(&self, key: &ConversationKey) -> Result<Vec<Message>, HistoryError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(&key.category)
            .and_then(|ids| ids.get(&key.conversation_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn conversations(&self, category: &str) -> Result<Vec<String>, HistoryError> {
        Ok(self
            .conversations
            .read()
            .await
            .get(category)
            .map(|ids| ids.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_all(&self) -> Result<HistorySnapshot, HistoryError> {
        Ok(self.snapshot().await)
    }

    async fn flush(&self) -> Result<(), HistoryError> {
        Ok(())
    }
}
