//! In-memory storage adapter.
//!
//! Keeps every key in a process-local map.  Besides being the store of choice
//! for tests, it is useful when controller and presenter are tasks of the
//! same process and share one `Arc<MemoryStorage>`.
//!
//! Tests can also make it misbehave:
//!
//! - [`MemoryStorage::fail_reads`] / [`MemoryStorage::fail_writes`] make
//!   the corresponding operation return [`StorageError::Unavailable`].
//! - [`MemoryStorage::set_latency`] delays every operation, which is how the
//!   poller's re-entrancy guard is exercised.
//! - Call counters and raw access let assertions look behind the protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{StorageAdapter, StorageError};

/// A [`StorageAdapter`] backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `get_item` fail (or succeed again).
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set_item` fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every operation by `latency` before it touches the map.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::SeqCst);
    }

    /// Returns the stored value without going through the async interface.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Stores a value without going through the async interface.
    ///
    /// Used to simulate another process writing to the store.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    /// Number of `get_item` calls made so far, including failed ones.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set_item` calls made so far, including failed ones.
    pub fn set_count(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // No code path panics while holding the lock; recover the map anyway.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        let ms = self.latency_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("injected read failure for {key}")));
        }
        Ok(self.raw(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("injected write failure for {key}")));
        }
        self.insert_raw(key, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_get_missing_key_is_none() {
        // Arrange
        let store = MemoryStorage::new();

        // Act
        let value = tokio_test::block_on(store.get_item("missing")).unwrap();

        // Assert
        assert_eq!(value, None);
    }

    #[test]
    fn test_memory_storage_set_then_get_returns_latest_value() {
        // Arrange
        let store = MemoryStorage::new();

        // Act
        tokio_test::block_on(async {
            store.set_item("k", "first").await.unwrap();
            store.set_item("k", "second").await.unwrap();
        });

        // Assert: single slot per key, last write wins
        assert_eq!(store.raw("k").as_deref(), Some("second"));
    }

    #[test]
    fn test_memory_storage_injected_read_failure() {
        let store = MemoryStorage::new();
        store.insert_raw("k", "v");
        store.fail_reads(true);

        let result = tokio_test::block_on(store.get_item("k"));

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn test_memory_storage_injected_write_failure_leaves_value() {
        // Arrange
        let store = MemoryStorage::new();
        store.insert_raw("k", "original");
        store.fail_writes(true);

        // Act
        let result = tokio_test::block_on(store.set_item("k", "new"));

        // Assert
        assert!(result.is_err());
        assert_eq!(store.raw("k").as_deref(), Some("original"));
    }

    #[test]
    fn test_memory_storage_counts_calls_including_failures() {
        let store = MemoryStorage::new();
        store.fail_writes(true);

        tokio_test::block_on(async {
            let _ = store.get_item("a").await;
            let _ = store.set_item("a", "1").await;
            let _ = store.set_item("a", "2").await;
        });

        assert_eq!(store.get_count(), 1);
        assert_eq!(store.set_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_storage_latency_delays_operations() {
        // Arrange
        let store = MemoryStorage::new();
        store.set_latency(Duration::from_millis(250));
        let started = tokio::time::Instant::now();

        // Act
        store.set_item("k", "v").await.unwrap();

        // Assert: the paused clock auto-advances by exactly the latency
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(store.raw("k").as_deref(), Some("v"));
    }
}
