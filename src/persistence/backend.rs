//! Key/value storage backends.
//!
//! A backend stores one JSON blob per key with no cross-key transactions.
//! Missing keys read as `None`.

use crate::error::StorageError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Process-local backend, used by tests and the `simulate` command
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
    writes: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a key without counting it as a write
    pub fn with_entry(self, key: &str, value: Value) -> Self {
        self.entries.lock().insert(key.to_string(), value);
        self
    }

    /// Number of `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current value of a key, bypassing the async API
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One `<key>.json` file per key under a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        let bytes = match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Deserialize {
                key: key.to_string(),
                source,
            })
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        let json = serde_json::to_vec_pretty(&value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        // Atomic save: write to temp file then rename
        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &json).await.map_err(io_err)?;
        tokio::fs::rename(&temp_path, &path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_storage_roundtrip_and_count() {
        let storage = MemoryStorage::new().with_entry("a", json!(1));
        assert_eq!(storage.write_count(), 0);
        assert_eq!(storage.get("a").await.unwrap(), Some(json!(1)));
        assert_eq!(storage.get("missing").await.unwrap(), None);

        storage.set("b", json!({"x": true})).await.unwrap();
        assert_eq!(storage.write_count(), 1);
        assert_eq!(storage.peek("b"), Some(json!({"x": true})));
    }

    #[tokio::test]
    async fn test_file_storage_missing_key_is_none() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));
        assert_eq!(storage.get("tree_state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_writes_one_file_per_key() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.set("tab_titles", json!({"1": "One"})).await.unwrap();
        storage.set("tab_titles", json!({"1": "Uno"})).await.unwrap();

        assert!(storage.path_for("tab_titles").exists());
        assert!(!dir.path().join("tab_titles.json.tmp").exists());
        assert_eq!(
            storage.get("tab_titles").await.unwrap(),
            Some(json!({"1": "Uno"}))
        );
    }

    #[tokio::test]
    async fn test_file_storage_corrupt_and_empty() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path());
        std::fs::write(storage.path_for("bad"), "{not json").unwrap();
        std::fs::write(storage.path_for("blank"), "  \n").unwrap();

        assert!(matches!(
            storage.get("bad").await,
            Err(StorageError::Deserialize { .. })
        ));
        assert_eq!(storage.get("blank").await.unwrap(), None);
    }
}
