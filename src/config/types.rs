//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::knowledge::SnippetConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub retrieval: RetrievalConfig,
    pub storage: StorageConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Whether to enable permissive CORS.
    pub cors_permissive: bool,
    /// Seconds to wait for in-flight replies to be recorded after shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_permissive: true,
            shutdown_grace_secs: 30,
        }
    }
}

/// Chat model provider kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenAi,
}

/// Settings for the generation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider to use (ollama or openai).
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL for the API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key, if the provider needs one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Seconds allowed for establishing a connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds allowed for a whole streamed reply.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Opening line of the customer-service system prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
}

fn default_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_persona() -> String {
    crate::ai::DEFAULT_SERVICE_PERSONA.to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_key_env: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            persona: default_persona(),
        }
    }
}

/// Retrieval settings shared by both grounding paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Curated items kept after scoring.
    pub top_k: usize,
    /// Categories grounded on an uploaded document instead of the curated index.
    pub document_categories: Vec<String>,
    /// Most recent history messages passed to the model.
    pub memory_window: usize,
    /// Document snippet limits.
    pub snippet: SnippetConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            document_categories: vec!["pdf".to_string()],
            memory_window: 10,
            snippet: SnippetConfig::default(),
        }
    }
}

impl RetrievalConfig {
    /// Whether conversations in `category` are grounded on a document.
    #[must_use]
    pub fn is_document_category(&self, category: &str) -> bool {
        self.document_categories.iter().any(|c| c == category)
    }
}

/// Locations of the knowledge file and the durable stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory the other paths are resolved against.
    pub data_dir: PathBuf,
    pub kb_file: PathBuf,
    pub history_file: PathBuf,
    pub documents_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            kb_file: PathBuf::from("service-kb.json"),
            history_file: PathBuf::from("messages-store.json"),
            documents_file: PathBuf::from("pdf-assets.json"),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn kb_path(&self) -> PathBuf {
        self.data_dir.join(&self.kb_file)
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }

    #[must_use]
    pub fn documents_path(&self) -> PathBuf {
        self.data_dir.join(&self.documents_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_config_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.base_url, "http://localhost:11434");
        assert_eq!(config.connect_timeout_secs, 10);
        assert!(config.api_key_env.is_none());
    }

    #[test]
    fn test_retrieval_defaults() {
        let config = RetrievalConfig::default();
        assert_eq!(config.top_k, 3);
        assert_eq!(config.memory_window, 10);
        assert!(config.is_document_category("pdf"));
        assert!(!config.is_document_category("service"));
        assert_eq!(config.snippet.max_total_chars, 2800);
    }

    #[test]
    fn test_model_config_deserialize_openai() {
        let toml = r#"
            provider = "openai"
            model = "gpt-4o-mini"
            base_url = "https://api.openai.com"
            api_key_env = "OPENAI_API_KEY"
        "#;
        let config: ModelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert_eq!(config.request_timeout_secs, 300);
    }

    #[test]
    fn test_storage_paths_join_data_dir() {
        let config = StorageConfig {
            data_dir: PathBuf::from("/var/lib/chat"),
            ..StorageConfig::default()
        };
        assert_eq!(
            config.history_path(),
            PathBuf::from("/var/lib/chat/messages-store.json")
        );
    }
}
