//! Conversation type persisted by the chat store

use crate::completion::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Title assigned to a conversation until its first user message
pub const DEFAULT_TITLE: &str = "New Chat";

/// Number of characters of the first user message used as a title
pub const DEFAULT_TITLE_LENGTH: usize = 20;

/// One conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Toolset id to enabled tool names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_tools: Option<BTreeMap<String, Vec<String>>>,
}

impl Chat {
    /// Create an empty conversation with a fresh UUID v4 id
    ///
    /// # Examples
    ///
    /// ```
    /// use bodhi_chat::store::Chat;
    ///
    /// let chat = Chat::new("New Chat");
    /// assert!(chat.is_empty());
    /// assert_eq!(chat.title, "New Chat");
    /// assert!(chat.updated_at.is_none());
    /// ```
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
            enabled_tools: None,
        }
    }

    /// True when the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace a default title with the leading characters of the first user message
    ///
    /// Leaves custom titles and conversations without a non-blank user
    /// message untouched. Returns true when the title changed.
    pub fn derive_title(&mut self, default_title: &str, max_chars: usize) -> bool {
        if self.title != default_title {
            return false;
        }
        let Some(first) = self.messages.iter().find(|m| m.role == Role::User) else {
            return false;
        };
        let title: String = first.content.trim().chars().take(max_chars).collect();
        let title = title.trim_end();
        if title.is_empty() {
            return false;
        }
        self.title = title.to_string();
        true
    }

    /// Clear messages and title while keeping id, creation time and tools
    pub fn reset(&mut self, default_title: &str) {
        self.messages.clear();
        self.title = default_title.to_string();
    }

    /// First 8 characters of the id, used for display and prefix lookup
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}
