//! KeyValueStore trait abstraction for local device storage.
//!
//! Implementations:
//! - `InMemoryStore` - For testing and for replicas sharing one process
//! - `JsStorageBridge` (in docs-wasm) - Uses localforage via JS callbacks
//! - `DirStore` (in docs-cli) - One file per key under a directory
//!
//! Uses `target_arch = "wasm32"` for conditional compilation instead of feature flags
//! to avoid Cargo's feature unification issues when building the workspace.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Key holding the full Loro snapshot of the document collection.
pub const SNAPSHOT_KEY: &str = "documents.loro";
/// Key holding the device-wide user ID.
pub const USER_ID_KEY: &str = "userId";
/// Key holding the JSON-encoded comment list.
pub const COMMENTS_KEY: &str = "commentedValue";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Local key-value storage.
///
/// On native platforms, implementations must be `Send + Sync` for use across threads.
/// On WASM (wasm32), these bounds are relaxed since WASM is single-threaded.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key (absent keys are not an error)
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Remove every key
    async fn clear(&self) -> Result<()>;
}

/// Local key-value storage (WASM version without Send + Sync).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(target_arch = "wasm32")]
pub trait KeyValueStore {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key (absent keys are not an error)
    async fn remove(&self, key: &str) -> Result<()>;

    /// List all keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Remove every key
    async fn clear(&self) -> Result<()>;
}

/// In-memory key-value store.
///
/// Counts writes so tests can check that redundant merges do not persist.
#[derive(Default)]
pub struct InMemoryStore {
    values: RwLock<BTreeMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `set` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".into()));
        }
        Ok(())
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Self::check_key(key)?;
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        Self::check_key(key)?;
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        Self::check_key(key)?;
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        Ok(values.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.clear();
        Ok(())
    }
}

// Implement KeyValueStore for Arc<T> where T: KeyValueStore
// This allows several replicas (tabs) to share one device store
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg(not(target_arch = "wasm32"))]
impl<T: KeyValueStore + Send + Sync> KeyValueStore for std::sync::Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        (**self).keys().await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inmemory_store_basic_operations() {
        let store = InMemoryStore::new();

        store.set("a", b"hello").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap(), b"hello");
        assert!(store.get("missing").await.unwrap().is_none());

        store.set("b", b"world").await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

        store.remove("a").await.unwrap();
        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.set("", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
