//! Persisted chat settings
//!
//! Settings hold the request parameters sent with every completion: model,
//! streaming flag, system prompt and sampling knobs. They are stored as one
//! JSON document under [`SETTINGS_KEY`].

use crate::completion::{ChatRequest, Message, RequestMessage};
use crate::error::{ChatError, Result};
use crate::storage::KeyValueStore;
use serde::{Deserialize, Serialize};

/// Storage key holding the settings document
pub const SETTINGS_KEY: &str = "chat-settings";

/// Maximum number of stop sequences accepted by the server
pub const MAX_STOP_SEQUENCES: usize = 4;

/// Request parameters for chat completions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

fn default_stream() -> bool {
    true
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            stream: default_stream(),
            system_prompt: None,
            temperature: None,
            top_p: None,
            max_tokens: None,
            stop: Vec::new(),
            frequency_penalty: None,
            presence_penalty: None,
        }
    }
}

impl ChatSettings {
    /// Load settings from storage, falling back to defaults
    pub async fn load<S: KeyValueStore + ?Sized>(backend: &S) -> Self {
        match backend.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("Discarding corrupted chat settings: {}", e);
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                tracing::warn!("Failed to read chat settings: {}", e);
                Self::default()
            }
        }
    }

    /// Persist settings
    ///
    /// Unlike the chat store, saving settings is an explicit user action and
    /// its failure is returned.
    pub async fn save<S: KeyValueStore + ?Sized>(&self, backend: &S) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        backend.set(SETTINGS_KEY, &raw).await
    }

    /// Remove persisted settings
    pub async fn reset<S: KeyValueStore + ?Sized>(backend: &S) -> Result<()> {
        backend.remove(SETTINGS_KEY).await
    }

    /// Check value ranges accepted by OpenAI-compatible servers
    pub fn validate(&self) -> Result<()> {
        check_range("temperature", self.temperature, 0.0, 2.0)?;
        check_range("top_p", self.top_p, 0.0, 1.0)?;
        check_range("frequency_penalty", self.frequency_penalty, -2.0, 2.0)?;
        check_range("presence_penalty", self.presence_penalty, -2.0, 2.0)?;

        if self.max_tokens == Some(0) {
            return Err(ChatError::Config("max_tokens must be greater than 0".to_string()).into());
        }

        if self.stop.len() > MAX_STOP_SEQUENCES {
            return Err(ChatError::Config(format!(
                "At most {} stop sequences are allowed, got {}",
                MAX_STOP_SEQUENCES,
                self.stop.len()
            ))
            .into());
        }

        Ok(())
    }

    /// Set one setting from its textual name and value
    ///
    /// An empty value clears optional settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use bodhi_chat::settings::ChatSettings;
    ///
    /// let mut settings = ChatSettings::default();
    /// settings.set_field("temperature", "0.7").unwrap();
    /// settings.set_field("stop", "###,END").unwrap();
    /// assert_eq!(settings.temperature, Some(0.7));
    /// assert_eq!(settings.stop, vec!["###", "END"]);
    /// assert!(settings.set_field("colour", "blue").is_err());
    /// ```
    pub fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match name {
            "model" => self.model = value.to_string(),
            "stream" => self.stream = parse_value(name, value)?,
            "system_prompt" => self.system_prompt = optional_string(value),
            "temperature" => self.temperature = parse_optional(name, value)?,
            "top_p" => self.top_p = parse_optional(name, value)?,
            "max_tokens" => self.max_tokens = parse_optional(name, value)?,
            "frequency_penalty" => self.frequency_penalty = parse_optional(name, value)?,
            "presence_penalty" => self.presence_penalty = parse_optional(name, value)?,
            "stop" => {
                self.stop = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            }
            other => {
                return Err(ChatError::Config(format!("Unknown setting: {}", other)).into());
            }
        }
        Ok(())
    }

    /// Build the request body for `messages`
    ///
    /// A non-blank system prompt is sent as the first message. Optional
    /// parameters are included only when set.
    pub fn build_request(&self, messages: &[Message]) -> ChatRequest {
        let mut request_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(prompt) = self.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            request_messages.push(RequestMessage::from(&Message::system(prompt)));
        }
        request_messages.extend(messages.iter().map(RequestMessage::from));

        ChatRequest {
            model: self.model.clone(),
            messages: request_messages,
            stream: Some(self.stream),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            stop: (!self.stop.is_empty()).then(|| self.stop.clone()),
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        }
    }
}

fn check_range(name: &str, value: Option<f32>, min: f32, max: f32) -> Result<()> {
    match value {
        Some(v) if !(min..=max).contains(&v) => Err(ChatError::Config(format!(
            "{} must be between {} and {}, got {}",
            name, min, max, v
        ))
        .into()),
        _ => Ok(()),
    }
}

fn optional_string(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| ChatError::Config(format!("Invalid value for {}: {}", name, value)).into())
}

fn parse_optional<T: std::str::FromStr>(name: &str, value: &str) -> Result<Option<T>> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_value(name, value).map(Some)
}
