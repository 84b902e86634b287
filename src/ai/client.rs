//! Streaming chat model providers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::config::{ModelConfig, ProviderKind};
use crate::history::Message;

use super::stream::{token_stream, LineFormat, TokenStream};

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Errors from generation requests and streams.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key not configured (env: {0})")]
    MissingApiKey(String),
    #[error("Generation request failed: {0}")]
    RequestFailed(String),
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Generation stream failed: {0}")]
    Stream(String),
    #[error("Generation request timed out")]
    Timeout,
}

/// Everything a model needs to produce one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    /// System prompt, including any grounding context.
    pub system: String,
    /// Earlier turns of the conversation, oldest first.
    pub history: Vec<Message>,
    /// The new user prompt.
    pub prompt: String,
}

impl ChatRequest {
    /// Messages in provider wire format: system, history, then the prompt.
    #[must_use]
    pub fn wire_messages(&self) -> Vec<serde_json::Value> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(serde_json::json!({ "role": "system", "content": self.system }));
        messages.extend(
            self.history
                .iter()
                .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.text })),
        );
        messages.push(serde_json::json!({ "role": "user", "content": self.prompt }));
        messages
    }
}

/// A model producing a reply as a lazily pulled stream of text chunks.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start generating a reply.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError>;
}

/// Build an HTTP client with the configured timeouts.
fn build_http_client(config: &ModelConfig) -> Result<Client, GenerationError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| GenerationError::RequestFailed(e.to_string()))
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    // Retry on 5xx server errors
    (500..600).contains(&status_code)
}

/// Calculate exponential backoff duration for retry attempts.
fn calculate_backoff(attempt: u32) -> Duration {
    // Exponential backoff: 1s, 2s, 4s
    Duration::from_secs(1 << attempt)
}

fn map_send_error(e: &reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::RequestFailed(e.to_string())
    }
}

/// Send a streaming request, retrying server errors before any byte is read.
async fn open_stream(
    request: reqwest::RequestBuilder,
    format: LineFormat,
) -> Result<TokenStream, GenerationError> {
    let mut attempt = 0;
    loop {
        let pending = request
            .try_clone()
            .ok_or_else(|| GenerationError::RequestFailed("Request body is not cloneable".to_string()))?;
        let response = pending.send().await.map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(token_stream(response.bytes_stream(), format));
        }

        let status_code = status.as_u16();
        if should_retry(status_code, attempt) {
            let backoff = calculate_backoff(attempt);
            tracing::warn!(status = status_code, attempt, "Generation request failed, retrying");
            tokio::time::sleep(backoff).await;
            attempt += 1;
            continue;
        }

        let text = response.text().await.unwrap_or_default();
        return Err(GenerationError::RequestFailed(format!("HTTP {status}: {text}")));
    }
}

/// Ollama `/api/chat` provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ModelConfig) -> Result<Self, GenerationError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OllamaProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.wire_messages(),
            "stream": true,
        });

        open_stream(self.client.post(&url).json(&body), LineFormat::Ndjson).await
    }
}

/// OpenAI-compatible chat completions provider.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI-compatible provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self, GenerationError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.wire_messages(),
            "stream": true,
        });

        let builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);
        open_stream(builder, LineFormat::Sse).await
    }
}

/// Provider enum for dispatch.
#[derive(Debug, Clone)]
pub enum Provider {
    Ollama(OllamaProvider),
    OpenAi(OpenAiProvider),
}

impl Provider {
    /// Create the configured provider.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::MissingApiKey` if the provider needs an API
    /// key and the configured environment variable is not set.
    pub fn from_config(config: &ModelConfig) -> Result<Self, GenerationError> {
        match config.provider {
            ProviderKind::Ollama => Ok(Self::Ollama(OllamaProvider::new(config)?)),
            ProviderKind::OpenAi => {
                let env = config
                    .api_key_env
                    .clone()
                    .unwrap_or_else(|| "OPENAI_API_KEY".to_string());
                let api_key =
                    std::env::var(&env).map_err(|_| GenerationError::MissingApiKey(env.clone()))?;
                Ok(Self::OpenAi(OpenAiProvider::new(config, api_key)?))
            }
        }
    }
}

#[async_trait]
impl ChatModel for Provider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        match self {
            Self::Ollama(p) => p.stream_chat(request).await,
            Self::OpenAi(p) => p.stream_chat(request).await,
        }
    }
}
