//! Directory-backed key-value store using tokio::fs.
//!
//! Each key is one file directly under the store directory.

use async_trait::async_trait;
use docs_core::KeyValueStore;
use docs_core::storage::{Result, StorageError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct DirStore {
    base_path: PathBuf,
}

impl DirStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\']) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

fn io_err(e: std::io::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

#[async_trait]
impl KeyValueStore for DirStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.key_path(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        fs::create_dir_all(&self.base_path).await.map_err(io_err)?;

        // Write then rename so a crash never leaves a half-written snapshot
        let tmp = self.base_path.join(format!(".{}.tmp", key));
        fs::write(&tmp, value).await.map_err(io_err)?;
        fs::rename(&tmp, &path).await.map_err(io_err)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(io_err)? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().await.map_err(io_err)?.is_file() {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        for key in self.keys().await? {
            self.remove(&key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_roundtrip_and_missing_keys() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path().join("store"));

        assert_eq!(store.get("userId").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());

        store.set("userId", b"user_42").await.unwrap();
        store.set("documents.loro", b"\x00\x01").await.unwrap();
        assert_eq!(store.get("userId").await.unwrap(), Some(b"user_42".to_vec()));
        assert_eq!(
            store.keys().await.unwrap(),
            vec!["documents.loro".to_string(), "userId".to_string()]
        );

        store.remove("userId").await.unwrap();
        store.remove("userId").await.unwrap();
        assert_eq!(store.get("userId").await.unwrap(), None);

        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let store = DirStore::new(dir.path());

        for key in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                store.set(key, b"x").await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
