//! JSON-file storage adapter.
//!
//! Persists the whole store as one JSON object of string values:
//!
//! ```json
//! {
//!   "comerge:studio-control:command": "{\"id\":\"...\",\"action\":\"show\",\"ts\":1718000000000}",
//!   "comerge:studio-control:state": "{\"open\":true,\"ts\":1718000000431}"
//! }
//! ```
//!
//! Because a controller and a presenter can be separate processes, this
//! adapter is how they meet: both point at the same file.
//!
//! # Behaviour
//!
//! - A missing file is an empty store.
//! - Entries whose value is not a JSON string are invisible to `get_item`.
//! - A corrupt file fails `get_item` with [`StorageError::Serialization`];
//!   `set_item` logs a warning and starts over from an empty object, so the
//!   channel heals on the next write.
//! - `set_item` is read-modify-write.  Writes through one adapter instance
//!   are serialized by an async mutex; the new contents go to a temporary
//!   file that is renamed over the old one, so readers never observe a
//!   half-written file.  Two *processes* writing at the same moment can
//!   still lose one update; the protocol tolerates that.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{config, StorageAdapter, StorageError};

/// File name used when no explicit store path is configured.
pub const DEFAULT_STORE_FILE: &str = "comerge-studio-control.json";

type Store = BTreeMap<String, Value>;

/// A [`StorageAdapter`] that keeps all keys in a single JSON file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Creates an adapter for the store file at `path`.  Nothing is touched
    /// on disk until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The store file this adapter reads and writes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolves the store file in the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns [`config::ConfigError::NoPlatformConfigDir`] when the platform
    /// directory cannot be determined from the environment.
    pub fn default_path() -> Result<PathBuf, config::ConfigError> {
        Ok(config::config_dir()?.join(DEFAULT_STORE_FILE))
    }

    async fn read_store(&self) -> Result<Store, StorageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Store::new()),
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Store::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_store(&self, store: &Store) -> Result<(), StorageError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let content = serde_json::to_string(store)?;
        let suffix = Uuid::new_v4().simple().to_string();
        let tmp_path = self.path.with_extension(format!("tmp-{}", &suffix[..8]));

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|source| StorageError::Io {
                path: tmp_path.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io {
                path: self.path.clone(),
                source,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for JsonFileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let store = self.read_store().await?;
        Ok(match store.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        })
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut store = match self.read_store().await {
            Ok(store) => store,
            Err(StorageError::Serialization(e)) => {
                warn!(path = %self.path.display(), "store file is corrupt; rewriting it: {e}");
                Store::new()
            }
            Err(e) => return Err(e),
        };
        store.insert(key.to_string(), Value::String(value.to_string()));
        self.write_store(&store).await?;
        debug!(path = %self.path.display(), key, "stored value");
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("studio_control_test_{}", Uuid::new_v4()))
            .join(DEFAULT_STORE_FILE)
    }

    fn cleanup(path: &Path) {
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty_store() {
        // Arrange
        let path = temp_store_path();
        let store = JsonFileStorage::new(&path);

        // Act
        let value = store.get_item("anything").await.unwrap();

        // Assert
        assert_eq!(value, None);
        assert!(!path.exists(), "reading must not create the file");
    }

    #[tokio::test]
    async fn test_set_creates_parent_dirs_and_file() {
        // Arrange
        let path = temp_store_path();
        let store = JsonFileStorage::new(&path);

        // Act
        store.set_item("k", "v").await.unwrap();

        // Assert
        assert!(path.exists());
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_set_preserves_other_keys() {
        let path = temp_store_path();
        let store = JsonFileStorage::new(&path);

        store.set_item("a", "1").await.unwrap();
        store.set_item("b", "2").await.unwrap();
        store.set_item("a", "3").await.unwrap();

        assert_eq!(store.get_item("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(store.get_item("b").await.unwrap().as_deref(), Some("2"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_file_format_is_flat_object_of_strings() {
        // Arrange
        let path = temp_store_path();
        let store = JsonFileStorage::new(&path);

        // Act
        store.set_item("k", r#"{"open":true,"ts":1}"#).await.unwrap();

        // Assert: values are stored as JSON strings, not nested objects
        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["k"], r#"{"open":true,"ts":1}"#);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_non_string_entries_are_invisible() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"num":5,"str":"ok"}"#).unwrap();
        let store = JsonFileStorage::new(&path);

        assert_eq!(store.get_item("num").await.unwrap(), None);
        assert_eq!(store.get_item("str").await.unwrap().as_deref(), Some("ok"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_corrupt_file_fails_read_but_heals_on_write() {
        // Arrange
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ this is not json").unwrap();
        let store = JsonFileStorage::new(&path);

        // Act / Assert: reads surface the corruption to the caller
        assert!(matches!(
            store.get_item("k").await,
            Err(StorageError::Serialization(_))
        ));

        // Act / Assert: the next write replaces the corrupt contents
        store.set_item("k", "v").await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_empty_file_reads_as_empty_store() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        let store = JsonFileStorage::new(&path);

        assert_eq!(store.get_item("k").await.unwrap(), None);

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_two_adapters_share_one_file() {
        // Arrange: controller and presenter in "different processes"
        let path = temp_store_path();
        let controller = JsonFileStorage::new(&path);
        let presenter = JsonFileStorage::new(&path);

        // Act
        controller.set_item("cmd", "hello").await.unwrap();

        // Assert
        assert_eq!(presenter.get_item("cmd").await.unwrap().as_deref(), Some("hello"));

        cleanup(&path);
    }

    #[tokio::test]
    async fn test_concurrent_writes_through_one_adapter_are_not_lost() {
        // Arrange
        let path = temp_store_path();
        let store = std::sync::Arc::new(JsonFileStorage::new(&path));

        // Act: interleave many read-modify-write cycles
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = std::sync::Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                store.set_item(&format!("key-{i}"), "x").await.unwrap();
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        // Assert
        for i in 0..16 {
            assert!(store.get_item(&format!("key-{i}")).await.unwrap().is_some());
        }

        cleanup(&path);
    }

    #[test]
    fn test_default_path_ends_with_store_file_name() {
        if let Ok(path) = JsonFileStorage::default_path() {
            assert!(path.ends_with(DEFAULT_STORE_FILE), "got {path:?}");
        }
        // NoPlatformConfigDir in a stripped environment is also acceptable.
    }
}
