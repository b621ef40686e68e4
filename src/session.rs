//! Chat session tying the client, settings and store together

use crate::completion::{ChatClient, EventSender, Message};
use crate::error::{ChatError, Result};
use crate::settings::ChatSettings;
use crate::storage::KeyValueStore;
use crate::store::{Chat, ChatStore};
use tokio_util::sync::CancellationToken;

/// Conversation driver for one user
///
/// Each [`ChatSession::send_message`] appends the user message to the current
/// conversation, persists it, runs the completion and persists the reply.
pub struct ChatSession<S: KeyValueStore> {
    store: ChatStore<S>,
    client: ChatClient,
    settings: ChatSettings,
    default_model: Option<String>,
}

impl<S: KeyValueStore> ChatSession<S> {
    pub fn new(store: ChatStore<S>, client: ChatClient, settings: ChatSettings) -> Self {
        Self {
            store,
            client,
            settings,
            default_model: None,
        }
    }

    /// Model used when the settings leave `model` empty
    pub fn with_default_model(mut self, model: Option<String>) -> Self {
        self.default_model = model.filter(|m| !m.is_empty());
        self
    }

    pub fn store(&self) -> &ChatStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChatStore<S> {
        &mut self.store
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ChatSettings {
        &mut self.settings
    }

    /// Model the next request will use
    pub fn model(&self) -> Option<&str> {
        if self.settings.model.is_empty() {
            self.default_model.as_deref()
        } else {
            Some(self.settings.model.as_str())
        }
    }

    /// Start a fresh conversation, reusing an empty one when possible
    pub async fn new_chat(&mut self) -> Chat {
        self.store.create_new_chat().await
    }

    /// Send `prompt` in the current conversation and return the reply
    ///
    /// The user message is persisted before the request is sent and stays
    /// persisted when the completion fails. Partial content from a cancelled
    /// or aborted stream is available through the returned error.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` when no model is configured, or any error
    /// from [`ChatClient::send`].
    pub async fn send_message(
        &mut self,
        prompt: &str,
        events: Option<EventSender>,
        cancel: &CancellationToken,
    ) -> Result<Message> {
        let model = self
            .model()
            .ok_or_else(|| {
                ChatError::Config(
                    "No model configured. Set one with `settings set model <name>` or --model"
                        .to_string(),
                )
            })?
            .to_string();

        let mut chat = match self.store.current_chat() {
            Some(chat) => chat.clone(),
            None => self.store.create_new_chat().await,
        };
        chat.push_message(Message::user(prompt));
        let chat_id = chat.id.clone();
        let mut chat = self.store.create_or_update_chat(chat).await;
        if self.store.current_chat_id() != Some(chat_id.as_str()) {
            self.store.set_current_chat_id(&chat_id).await?;
        }

        let mut request = self.settings.build_request(&chat.messages);
        request.model = model;

        tracing::info!(chat_id = %chat_id, model = %request.model, "Sending message");
        let reply = self.client.send(&request, events, cancel).await?;

        chat.push_message(reply.clone());
        self.store.create_or_update_chat(chat).await;
        Ok(reply)
    }
}
