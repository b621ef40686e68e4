//! Durable key/value storage
//!
//! The chat store and chat settings persist JSON strings under a handful of
//! keys. [`KeyValueStore`] abstracts that surface so the store can run
//! against SQLite in the binary and against [`MemoryStore`] in tests.

use crate::config::StorageConfig;
use crate::error::{ChatError, Result};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub mod memory;
pub use memory::MemoryStore;

/// Environment variable overriding the database location
pub const STORE_DB_ENV: &str = "BODHI_CHAT_STORE_DB";

/// String key/value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// SQLite-backed key/value store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create a store in the user's data directory
    ///
    /// Honors the `BODHI_CHAT_STORE_DB` environment variable when set.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var(STORE_DB_ENV) {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("app", "bodhi", "bodhi-chat")
            .ok_or_else(|| ChatError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| ChatError::Storage(e.to_string()))?;

        let storage = Self {
            db_path: data_dir.join("chats.db"),
        };
        storage.init()?;
        Ok(storage)
    }

    /// Create a store at the given database path
    ///
    /// # Examples
    ///
    /// ```
    /// use bodhi_chat::storage::SqliteStore;
    ///
    /// let dir = std::env::temp_dir().join("bodhi-chat-doc");
    /// let store = SqliteStore::new_with_path(dir.join("chats.db")).unwrap();
    /// assert!(store.db_path().ends_with("chats.db"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| ChatError::Storage(e.to_string()))?;
        }

        let storage = Self { db_path };
        storage.init()?;
        Ok(storage)
    }

    /// Open the store described by the configuration
    ///
    /// Uses `storage.path` when set, otherwise falls back to [`SqliteStore::new`].
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Location of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| ChatError::Storage(e.to_string()).into())
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to query key")
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .context("Failed to write key")
        .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])
            .context("Failed to delete key")
            .map_err(|e| ChatError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::tempdir;

    /// Returns both the store and the `TempDir` so the directory outlives the test body.
    fn create_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let store = SqliteStore::new_with_path(dir.path().join("chats.db"))
            .expect("failed to create store");
        (store, dir)
    }

    #[test]
    fn test_init_creates_table() {
        let (store, _dir) = create_test_store();
        let conn = Connection::open(store.db_path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='kv_store'",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_get_missing_key_returns_none() {
        let (store, _dir) = create_test_store();
        assert!(store.get("chats").await.expect("get failed").is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (store, _dir) = create_test_store();
        store.set("current-chat-id", "\"abc\"").await.expect("set failed");
        assert_eq!(
            store.get("current-chat-id").await.expect("get failed").as_deref(),
            Some("\"abc\"")
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let (store, _dir) = create_test_store();
        store.set("chats", "[]").await.expect("first set failed");
        store.set("chats", "[1]").await.expect("second set failed");
        assert_eq!(store.get("chats").await.unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.set("chats", "[]").await.unwrap();
        store.remove("chats").await.expect("first remove failed");
        store.remove("chats").await.expect("second remove failed");
        assert!(store.get("chats").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, dir) = create_test_store();
        store.set("chat-settings", "{}").await.unwrap();
        drop(store);

        let reopened = SqliteStore::new_with_path(dir.path().join("chats.db")).unwrap();
        assert_eq!(
            reopened.get("chat-settings").await.unwrap().as_deref(),
            Some("{}")
        );
    }

    #[test]
    fn test_from_config_uses_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("chats.db");
        let config = StorageConfig {
            path: Some(path.to_string_lossy().to_string()),
        };
        let store = SqliteStore::from_config(&config).expect("from_config failed");
        assert_eq!(store.db_path(), path.as_path());
        assert!(path.parent().unwrap().exists());
    }

    #[test]
    #[serial]
    fn test_new_respects_env_override() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("nested").join("chats.db");
        env::set_var(STORE_DB_ENV, db_path.to_string_lossy().to_string());

        let store = SqliteStore::new().expect("new failed with env override");
        assert_eq!(store.db_path(), db_path.as_path());
        assert!(db_path.parent().unwrap().exists());

        env::remove_var(STORE_DB_ENV);
    }
}
