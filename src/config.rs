//! Configuration management for bodhi-chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::completion::StreamErrorPolicy;
use crate::error::{ChatError, Result};
use crate::store::{DEFAULT_MAX_CHATS, DEFAULT_TITLE, DEFAULT_TITLE_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for bodhi-chat
///
/// Holds the completion server connection, the chat store tunables and the
/// storage location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat store and completion behavior
    #[serde(default)]
    pub chat: ChatConfig,
    /// Durable storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Completion server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the OpenAI-compatible server
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional bearer token sent as `Authorization: Bearer <key>`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Whole-request timeout for non-streaming completions; streamed bodies
    /// are bounded by `stream_idle_timeout_seconds` only
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: Option<u64>,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Maximum silence between two stream reads; unset disables the check
    #[serde(default)]
    pub stream_idle_timeout_seconds: Option<u64>,
}

fn default_base_url() -> String {
    "http://localhost:1135".to_string()
}

fn default_request_timeout() -> Option<u64> {
    Some(600)
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            stream_idle_timeout_seconds: None,
        }
    }
}

/// Chat behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Capacity of the conversation collection
    #[serde(default = "default_max_chats")]
    pub max_chats: usize,

    /// Title given to new conversations
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Characters of the first user message used as title
    #[serde(default = "default_title_length")]
    pub title_length: usize,

    /// What to do with an error object received mid-stream
    #[serde(default)]
    pub stream_error_policy: StreamErrorPolicy,

    /// Model used when chat settings do not name one
    #[serde(default)]
    pub default_model: Option<String>,
}

fn default_max_chats() -> usize {
    DEFAULT_MAX_CHATS
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

fn default_title_length() -> usize {
    DEFAULT_TITLE_LENGTH
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_chats: default_max_chats(),
            default_title: default_title(),
            title_length: default_title_length(),
            stream_error_policy: StreamErrorPolicy::default(),
            default_model: None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; defaults to the platform data directory
    #[serde(default)]
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("BODHI_CHAT_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Ok(api_key) = std::env::var("BODHI_CHAT_API_KEY") {
            self.server.api_key = Some(api_key);
        }

        if let Ok(timeout) = std::env::var("BODHI_CHAT_REQUEST_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.server.request_timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid BODHI_CHAT_REQUEST_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("BODHI_CHAT_STREAM_IDLE_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.server.stream_idle_timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid BODHI_CHAT_STREAM_IDLE_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(max_chats) = std::env::var("BODHI_CHAT_MAX_CHATS") {
            if let Ok(value) = max_chats.parse() {
                self.chat.max_chats = value;
            } else {
                tracing::warn!("Invalid BODHI_CHAT_MAX_CHATS: {}", max_chats);
            }
        }

        if let Ok(policy) = std::env::var("BODHI_CHAT_STREAM_ERROR_POLICY") {
            match policy.parse() {
                Ok(value) => self.chat.stream_error_policy = value,
                Err(e) => tracing::warn!("Invalid BODHI_CHAT_STREAM_ERROR_POLICY: {}", e),
            }
        }

        if let Ok(model) = std::env::var("BODHI_CHAT_MODEL") {
            self.chat.default_model = Some(model);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(base_url) = &cli.base_url {
            self.server.base_url = base_url.clone();
        }

        if let Some(store_path) = &cli.store_path {
            self.storage.path = Some(store_path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns a `ChatError::Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.base_url).map_err(|e| {
            ChatError::Config(format!(
                "Invalid server.base_url '{}': {}",
                self.server.base_url, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "server.base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }

        if self.server.request_timeout_seconds == Some(0) {
            return Err(ChatError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.connect_timeout_seconds == 0 {
            return Err(ChatError::Config(
                "server.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.stream_idle_timeout_seconds == Some(0) {
            return Err(ChatError::Config(
                "server.stream_idle_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.max_chats == 0 {
            return Err(
                ChatError::Config("chat.max_chats must be greater than 0".to_string()).into(),
            );
        }

        if self.chat.title_length == 0 {
            return Err(
                ChatError::Config("chat.title_length must be greater than 0".to_string()).into(),
            );
        }

        Ok(())
    }
}
