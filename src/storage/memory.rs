//! In-memory key/value store used by tests and ephemeral sessions

use super::KeyValueStore;
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Shared in-memory store
///
/// Clones share the same map, so a test can hand one clone to a `ChatStore`
/// and inspect what was persisted through the other. Writes can be made to
/// fail on demand to exercise best-effort persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `set`/`remove` calls fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw value under `key`, bypassing the async trait
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().ok()?.get(key).cloned()
    }

    /// Seed a raw value, bypassing the failure switch
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.lock() {
            map.insert(key.to_string(), value.to_string());
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| ChatError::Storage("memory store lock poisoned".into()).into())
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ChatError::Storage("writes disabled".into()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("chats", "[]").await.unwrap();
        assert_eq!(other.raw("chats").as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_fail_writes_rejects_set_and_remove() {
        let store = MemoryStore::new();
        store.insert_raw("chats", "[]");
        store.set_fail_writes(true);

        let err = store.set("chats", "[1]").await.unwrap_err();
        assert!(err.to_string().contains("writes disabled"));
        assert!(store.remove("chats").await.is_err());
        assert_eq!(store.get("chats").await.unwrap().as_deref(), Some("[]"));

        store.set_fail_writes(false);
        store.remove("chats").await.unwrap();
        assert!(store.raw("chats").is_none());
    }
}
