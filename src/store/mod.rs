//! Bounded, persisted collection of conversations
//!
//! [`ChatStore`] keeps conversations ordered most-recently-updated first,
//! capped at a configurable capacity, together with a pointer to the current
//! conversation. Every mutation is written through to the injected
//! [`KeyValueStore`]; write failures are logged and never returned.

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::storage::KeyValueStore;
use chrono::{DateTime, Duration, Utc};

pub mod types;
pub use types::{Chat, DEFAULT_TITLE, DEFAULT_TITLE_LENGTH};

/// Storage key holding the JSON array of conversations
pub const CHATS_KEY: &str = "chats";

/// Storage key holding the current conversation id as a JSON string
pub const CURRENT_CHAT_KEY: &str = "current-chat-id";

/// Default capacity of the collection
pub const DEFAULT_MAX_CHATS: usize = 100;

/// What [`ChatStore::delete_chat`] did with its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The conversation was removed from the collection
    Removed,
    /// The current conversation was emptied and kept current
    Reset,
}

/// Tunables for a [`ChatStore`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreOptions {
    pub max_chats: usize,
    pub default_title: String,
    pub title_length: usize,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_chats: DEFAULT_MAX_CHATS,
            default_title: DEFAULT_TITLE.to_string(),
            title_length: DEFAULT_TITLE_LENGTH,
        }
    }
}

impl From<&ChatConfig> for StoreOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            max_chats: config.max_chats,
            default_title: config.default_title.clone(),
            title_length: config.title_length,
        }
    }
}

/// Persisted conversation collection with a current-conversation pointer
pub struct ChatStore<S: KeyValueStore> {
    backend: S,
    options: StoreOptions,
    chats: Vec<Chat>,
    current_chat_id: Option<String>,
    last_stamp: Option<DateTime<Utc>>,
}

impl<S: KeyValueStore> ChatStore<S> {
    /// Load the collection from `backend`
    ///
    /// Absent, unreadable or corrupted data yields an empty collection.
    /// Data beyond the capacity is truncated and a current id that no longer
    /// matches a conversation is dropped.
    pub async fn load(backend: S, options: StoreOptions) -> Self {
        let mut chats = match backend.get(CHATS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<Chat>>(&raw) {
                Ok(chats) => chats,
                Err(e) => {
                    tracing::warn!("Discarding corrupted chat data: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read chats from storage: {}", e);
                Vec::new()
            }
        };

        if chats.len() > options.max_chats {
            tracing::warn!(
                "Loaded {} chats, truncating to capacity {}",
                chats.len(),
                options.max_chats
            );
            chats.truncate(options.max_chats);
        }

        let current_chat_id = match backend.get(CURRENT_CHAT_KEY).await {
            Ok(Some(raw)) => serde_json::from_str::<String>(&raw)
                .map_err(|e| tracing::warn!("Discarding corrupted current chat id: {}", e))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Failed to read current chat id: {}", e);
                None
            }
        }
        .filter(|id| {
            let known = chats.iter().any(|c| &c.id == id);
            if !known {
                tracing::debug!("Dropping dangling current chat id {}", id);
            }
            known
        });

        let last_stamp = chats.iter().filter_map(|c| c.updated_at).max();

        tracing::debug!("Loaded {} chats", chats.len());

        Self {
            backend,
            options,
            chats,
            current_chat_id,
            last_stamp,
        }
    }

    /// Conversations, most recently updated first
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Underlying key/value backend
    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn current_chat_id(&self) -> Option<&str> {
        self.current_chat_id.as_deref()
    }

    pub fn current_chat(&self) -> Option<&Chat> {
        let id = self.current_chat_id.as_deref()?;
        self.chats.iter().find(|c| c.id == id)
    }

    /// One-shot read of a conversation by id
    pub async fn get_chat(&self, id: &str) -> Option<Chat> {
        self.chats.iter().find(|c| c.id == id).cloned()
    }

    /// Resolve a full id or a unique id prefix
    pub fn find_by_prefix(&self, prefix: &str) -> Result<&Chat> {
        if let Some(chat) = self.chats.iter().find(|c| c.id == prefix) {
            return Ok(chat);
        }
        let mut matches = self.chats.iter().filter(|c| c.id.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(chat), None) if !prefix.is_empty() => Ok(chat),
            (Some(_), Some(_)) => {
                Err(ChatError::NotFound(format!("chat id prefix '{}' is ambiguous", prefix)).into())
            }
            _ => Err(ChatError::NotFound(format!("chat '{}'", prefix)).into()),
        }
    }

    /// Point the current conversation at `id`
    pub async fn set_current_chat_id(&mut self, id: &str) -> Result<()> {
        if !self.chats.iter().any(|c| c.id == id) {
            return Err(ChatError::NotFound(format!("chat '{}'", id)).into());
        }
        self.current_chat_id = Some(id.to_string());
        self.persist().await;
        Ok(())
    }

    /// Insert or replace `chat` by id and move it to the front
    ///
    /// Stamps `updated_at`, derives the title from the first user message
    /// while the default title is in place, and evicts from the tail when the
    /// collection grows past capacity. Returns the stored value.
    pub async fn create_or_update_chat(&mut self, mut chat: Chat) -> Chat {
        chat.derive_title(&self.options.default_title, self.options.title_length);
        chat.updated_at = Some(self.next_stamp());

        self.chats.retain(|c| c.id != chat.id);
        self.chats.insert(0, chat.clone());
        self.evict_overflow();

        self.persist().await;
        chat
    }

    /// Delete a conversation
    ///
    /// A non-current conversation is removed outright. For the current one,
    /// another empty conversation becomes current and the target is removed;
    /// with no empty conversation available the target is reset in place and
    /// stays current. Returns `None` when `id` is unknown.
    pub async fn delete_chat(&mut self, id: &str) -> Option<DeleteOutcome> {
        let position = self.chats.iter().position(|c| c.id == id)?;

        let outcome = if self.current_chat_id.as_deref() != Some(id) {
            self.chats.remove(position);
            DeleteOutcome::Removed
        } else if let Some(empty) = self.chats.iter().find(|c| c.id != id && c.is_empty()) {
            self.current_chat_id = Some(empty.id.clone());
            self.chats.remove(position);
            DeleteOutcome::Removed
        } else {
            tracing::debug!("No empty chat to switch to, resetting {} in place", id);
            self.chats[position].reset(&self.options.default_title);
            DeleteOutcome::Reset
        };

        self.persist().await;
        Some(outcome)
    }

    /// Make an empty conversation current and return it
    ///
    /// No-op when the current conversation is already empty. Otherwise an
    /// existing empty conversation is promoted before a new one is allocated.
    pub async fn create_new_chat(&mut self) -> Chat {
        if let Some(current) = self.current_chat().filter(|c| c.is_empty()) {
            return current.clone();
        }

        if let Some(empty) = self.chats.iter().find(|c| c.is_empty()).cloned() {
            self.current_chat_id = Some(empty.id.clone());
            self.persist().await;
            return empty;
        }

        let mut chat = Chat::new(self.options.default_title.clone());
        chat.updated_at = Some(self.next_stamp());
        self.chats.insert(0, chat.clone());
        self.current_chat_id = Some(chat.id.clone());
        self.evict_overflow();

        tracing::debug!("Created chat {}", chat.id);
        self.persist().await;
        chat
    }

    /// Remove every conversation and clear the current pointer
    pub async fn clear_chats(&mut self) {
        self.chats.clear();
        self.current_chat_id = None;
        self.persist().await;
    }

    fn evict_overflow(&mut self) {
        while self.chats.len() > self.options.max_chats {
            if let Some(evicted) = self.chats.pop() {
                tracing::debug!("Evicting chat {} over capacity", evicted.id);
                if self.current_chat_id.as_deref() == Some(evicted.id.as_str()) {
                    self.current_chat_id = None;
                }
            }
        }
    }

    /// Strictly increasing timestamp even when the clock stalls or steps back
    fn next_stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_stamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(stamp);
        stamp
    }

    async fn persist(&self) {
        match serde_json::to_string(&self.chats) {
            Ok(raw) => {
                if let Err(e) = self.backend.set(CHATS_KEY, &raw).await {
                    tracing::warn!("Failed to persist chats: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize chats: {}", e),
        }

        let result = match &self.current_chat_id {
            Some(id) => match serde_json::to_string(id) {
                Ok(raw) => self.backend.set(CURRENT_CHAT_KEY, &raw).await,
                Err(e) => Err(e.into()),
            },
            None => self.backend.remove(CURRENT_CHAT_KEY).await,
        };
        if let Err(e) = result {
            tracing::warn!("Failed to persist current chat id: {}", e);
        }
    }
}
