//! Configuration file discovery and parsing.

use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Environment variable naming a config file that takes precedence over the
/// default locations.
pub const CONFIG_ENV: &str = "GROUNDED_CHAT_CONFIG";

const LOCAL_FILE: &str = ".grounded-chat.toml";

/// Finds and parses the first existing config file among its candidates.
#[derive(Debug)]
pub struct ConfigLoader {
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Candidates are `$GROUNDED_CHAT_CONFIG`, then `./.grounded-chat.toml`,
    /// then `<config_dir>/grounded-chat/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let env_file = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let user_file = dirs::config_dir().map(|dir| dir.join("grounded-chat").join("config.toml"));
        Self {
            candidates: env_file
                .into_iter()
                .chain(std::iter::once(PathBuf::from(LOCAL_FILE)))
                .chain(user_file)
                .collect(),
        }
    }

    /// Only consider `path`.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
        }
    }

    /// First candidate that exists on disk.
    #[must_use]
    pub fn find(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|path| path.is_file())
    }

    /// Parse the first existing candidate, or fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let Some(path) = self.find() else {
            tracing::debug!(candidates = ?self.candidates, "No config file found, using defaults");
            return Ok(AppConfig::default());
        };

        tracing::info!(path = %path.display(), "Loading config file");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
