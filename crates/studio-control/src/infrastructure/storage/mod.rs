//! Storage infrastructure: the key-value boundary of the signaling channel.
//!
//! The protocol only ever needs two operations on a store of strings,
//! `get_item` and `set_item`.  [`StorageAdapter`] captures exactly that, so
//! the emitter, publisher and poller can run against any backend:
//!
//! - [`memory::MemoryStorage`] – process-local map; used by tests and by
//!   embedders that share one store between tasks.
//! - [`json_file::JsonFileStorage`] – every key in one JSON object on disk;
//!   lets separate processes share a channel.
//!
//! The `config` sub-module is unrelated to the channel data: it persists the
//! CLI's own settings as TOML.
//!
//! # Best-effort boundary
//!
//! Adapters report failures honestly through `Result`.  The protocol does
//! not: every storage error is converted to "absent" (reads) or "dropped"
//! (writes) by [`read_or_absent`] and [`write_best_effort`], and logged.  The
//! next tick is the retry mechanism.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

pub mod config;
pub mod json_file;
pub mod memory;

/// Error type for storage adapter operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store contents could not be (de)serialized.
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend refused the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous string key-value store shared by controller and presenter.
///
/// Implementations decide durability and how concurrent writers interact;
/// the protocol assumes only that a successful `set_item` is eventually
/// visible to `get_item` and that the latest write to a key wins.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Returns the value stored under `key`, or `None` if nothing is stored.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Reads `key`, treating any storage failure as an absent value.
pub async fn read_or_absent(storage: &dyn StorageAdapter, key: &str) -> Option<String> {
    match storage.get_item(key).await {
        Ok(value) => value,
        Err(e) => {
            warn!(key, "storage read failed; treating as absent: {e}");
            None
        }
    }
}

/// Writes `value` under `key`, dropping the write on failure.
///
/// Returns `true` if the adapter reported success.  Protocol code uses the
/// result for logging only; it never changes behaviour.
pub async fn write_best_effort(storage: &dyn StorageAdapter, key: &str, value: &str) -> bool {
    match storage.set_item(key, value).await {
        Ok(()) => true,
        Err(e) => {
            warn!(key, "storage write failed; dropping it: {e}");
            false
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
