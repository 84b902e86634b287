//! Retrieval, generation and history recording for one chat turn.

use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use tokio_util::task::TaskTracker;

use crate::ai::{
    document_system_prompt, service_system_prompt, ChatModel, ChatRequest, GenerationError,
    DEFAULT_SERVICE_PERSONA,
};
use crate::config::RetrievalConfig;
use crate::document::{Document, DocumentStore};
use crate::history::{ConversationKey, KeyedStore, Message};
use crate::knowledge::{assemble, top_k, ItemSource, SnippetExtractor};
use crate::stream::{tee_tracked, TeeStream};

use super::error::CoreError;

/// Grounding material for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Grounding {
    Curated { context: String },
    Document { file_name: String, context: String },
}

impl Grounding {
    fn into_context(self) -> String {
        match self {
            Self::Curated { context } | Self::Document { context, .. } => context,
        }
    }
}

/// The chat core: grounds prompts, streams replies and records history.
///
/// Collaborators are injected; the core never loads or flushes them.
pub struct ChatCore {
    items: Arc<dyn ItemSource>,
    documents: Arc<dyn DocumentStore>,
    history: Arc<dyn KeyedStore>,
    retrieval: RetrievalConfig,
    extractor: SnippetExtractor,
    persona: String,
    replies: TaskTracker,
}

impl ChatCore {
    #[must_use]
    pub fn new(
        items: Arc<dyn ItemSource>,
        documents: Arc<dyn DocumentStore>,
        history: Arc<dyn KeyedStore>,
        retrieval: RetrievalConfig,
    ) -> Self {
        let extractor = SnippetExtractor::new(retrieval.snippet);
        Self {
            items,
            documents,
            history,
            retrieval,
            extractor,
            persona: DEFAULT_SERVICE_PERSONA.to_string(),
            replies: TaskTracker::new(),
        }
    }

    /// Use a different opening line for the customer-service prompt.
    #[must_use]
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    #[must_use]
    pub fn retrieval(&self) -> &RetrievalConfig {
        &self.retrieval
    }

    async fn ground(&self, key: &ConversationKey, prompt: &str) -> Result<Grounding, CoreError> {
        if self.retrieval.is_document_category(&key.category) {
            let document = self
                .documents
                .get(&key.conversation_id)
                .await?
                .ok_or_else(|| CoreError::DocumentNotFound {
                    conversation_id: key.conversation_id.clone(),
                })?;
            let context = self.extractor.extract(&document.text, prompt);
            tracing::debug!(
                category = %key.category,
                conversation_id = %key.conversation_id,
                chars = context.chars().count(),
                "Extracted document context"
            );
            return Ok(Grounding::Document {
                file_name: document.file_name,
                context,
            });
        }

        let ranked = top_k(prompt, self.items.all_items(), self.retrieval.top_k);
        tracing::debug!(
            category = %key.category,
            conversation_id = %key.conversation_id,
            hits = ranked.len(),
            "Scored knowledge items"
        );
        Ok(Grounding::Curated {
            context: assemble(&ranked),
        })
    }

    /// Context string for `prompt`, from the uploaded document in document
    /// categories and from the curated index otherwise.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DocumentNotFound` if a document category has no
    /// uploaded document for the conversation.
    pub async fn retrieve_and_assemble_context(
        &self,
        key: &ConversationKey,
        prompt: &str,
    ) -> Result<String, CoreError> {
        self.ground(key, prompt).await.map(Grounding::into_context)
    }

    /// Deliver `tokens` to the caller and append the full reply to history
    /// once the stream completes normally.
    ///
    /// The caller appends the user message beforehand.
    pub fn stream_and_persist<S>(&self, key: &ConversationKey, tokens: S) -> TeeStream<GenerationError>
    where
        S: Stream<Item = Result<String, GenerationError>> + Send + 'static,
    {
        let history = Arc::clone(&self.history);
        let key = key.clone();
        tee_tracked(&self.replies, tokens, move |full_text| async move {
            let chars = full_text.chars().count();
            match history.append(&key, Message::assistant(full_text)).await {
                Ok(()) => tracing::debug!(
                    category = %key.category,
                    conversation_id = %key.conversation_id,
                    chars,
                    "Recorded assistant reply"
                ),
                Err(e) => tracing::error!(
                    category = %key.category,
                    conversation_id = %key.conversation_id,
                    error = %e,
                    "Failed to record assistant reply"
                ),
            }
        })
    }

    /// Stop accepting new replies and wait for in-flight ones to be recorded.
    ///
    /// Returns `false` if replies were still pending when `grace` ran out.
    pub async fn drain_replies(&self, grace: Duration) -> bool {
        self.replies.close();
        let pending = self.replies.len();
        if pending > 0 {
            tracing::info!(tasks = pending, "Waiting for in-flight replies");
        }
        if tokio::time::timeout(grace, self.replies.wait()).await.is_ok() {
            return true;
        }
        tracing::warn!(
            tasks = self.replies.len(),
            grace_secs = grace.as_secs(),
            "In-flight replies did not finish before shutdown"
        );
        false
    }

    /// Deterministic reply that bypasses generation, if `prompt` asks for one.
    #[must_use]
    pub fn try_intent_shortcut(&self, prompt: &str) -> Option<String> {
        crate::intent::try_intent_shortcut(prompt)
    }

    /// Run one chat turn end to end.
    ///
    /// Records the user prompt, answers booking requests directly in curated
    /// categories, and otherwise streams a grounded reply from `model`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::DocumentNotFound` before recording anything if a
    /// document category has no document, a history error if the user
    /// message cannot be recorded, or a generation error if the model
    /// request cannot be started.
    pub async fn chat(
        &self,
        key: &ConversationKey,
        prompt: &str,
        model: &dyn ChatModel,
    ) -> Result<TeeStream<GenerationError>, CoreError> {
        let document_grounded = self.retrieval.is_document_category(&key.category);
        let grounding = if document_grounded {
            Some(self.ground(key, prompt).await?)
        } else {
            None
        };

        let earlier = self.history.list(key).await?;
        self.history.register(key).await?;
        self.history.append(key, Message::user(prompt)).await?;

        if !document_grounded {
            if let Some(reply) = self.try_intent_shortcut(prompt) {
                let once = futures_util::stream::iter([Ok::<_, GenerationError>(reply)]);
                return Ok(self.stream_and_persist(key, once));
            }
        }

        let grounding = match grounding {
            Some(grounding) => grounding,
            None => self.ground(key, prompt).await?,
        };
        let system = match grounding {
            Grounding::Curated { context } => service_system_prompt(&self.persona, &context),
            Grounding::Document { file_name, context } => {
                document_system_prompt(&file_name, &context)
            }
        };

        let skip = earlier.len().saturating_sub(self.retrieval.memory_window);
        let request = ChatRequest {
            system,
            history: earlier.into_iter().skip(skip).collect(),
            prompt: prompt.to_string(),
        };

        tracing::info!(
            category = %key.category,
            conversation_id = %key.conversation_id,
            history = request.history.len(),
            "Starting generation"
        );
        let tokens = model.stream_chat(request).await?;
        Ok(self.stream_and_persist(key, tokens))
    }

    /// Store a document for a conversation and register the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the document or history store fails.
    pub async fn upload_document(
        &self,
        key: &ConversationKey,
        file_name: Option<String>,
        raw_text: &str,
    ) -> Result<Document, CoreError> {
        let document = Document::new(key.conversation_id.clone(), file_name, raw_text);
        let replaced = self.documents.put(document.clone()).await?;
        self.history.register(key).await?;

        tracing::info!(
            category = %key.category,
            conversation_id = %key.conversation_id,
            file_name = %document.file_name,
            chars = document.text_len(),
            replaced = replaced.is_some(),
            "Document uploaded"
        );
        Ok(document)
    }

    /// Messages of one conversation in arrival order.
    ///
    /// # Errors
    ///
    /// Returns an error if the history store fails.
    pub async fn messages(&self, key: &ConversationKey) -> Result<Vec<Message>, CoreError> {
        Ok(self.history.list(key).await?)
    }

    /// Known conversation ids in a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the history store fails.
    pub async fn conversations(&self, category: &str) -> Result<Vec<String>, CoreError> {
        Ok(self.history.conversations(category).await?)
    }
}
