//! bodhi-chat - client library for OpenAI-compatible chat servers
//!
//! This library provides a streaming chat-completions client and a bounded,
//! persisted collection of conversations, plus the settings and session
//! glue used by the `bodhi-chat` binary.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `completion`: HTTP client and streaming accumulator for `/v1/chat/completions`
//! - `store`: bounded, most-recently-updated-first conversation store
//! - `storage`: key/value persistence (SQLite and in-memory backends)
//! - `settings`: persisted request parameters
//! - `session`: sends messages in the current conversation
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli`: command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use bodhi_chat::{ChatClient, ChatSession, ChatSettings, ChatStore, Config, MemoryStore};
//! use bodhi_chat::store::StoreOptions;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let store = ChatStore::load(MemoryStore::new(), StoreOptions::from(&config.chat)).await;
//!     let client = ChatClient::from_config(&config)?;
//!     let settings = ChatSettings {
//!         model: "llama3:instruct".to_string(),
//!         ..ChatSettings::default()
//!     };
//!     let mut session = ChatSession::new(store, client, settings);
//!
//!     let reply = session
//!         .send_message("Hello!", None, &CancellationToken::new())
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod session;
pub mod settings;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use completion::{ChatClient, CompletionEvent, Message, Role, StreamErrorPolicy, StreamState};
pub use config::Config;
pub use error::{ChatError, Result};
pub use session::ChatSession;
pub use settings::ChatSettings;
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use store::{Chat, ChatStore};

#[cfg(test)]
pub mod test_utils;
