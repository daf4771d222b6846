//! Persistence Adapter - the durable blob store saves are written to.
//!
//! The engine only relies on this contract:
//! - `put(key, bytes)` is atomic per key: readers see the old value, the new
//!   value, or nothing, never a partial write.
//! - `get(key)` returns the exact bytes last stored, or `NotFound`.
//! - `delete(key)` reports whether something was removed.
//! - `list(prefix)` returns every stored key starting with `prefix`.
//!
//! Implementations must be safe for concurrent use across distinct keys.
//! [`InMemoryAdapter`] backs tests and embedded use; [`FsAdapter`] keeps one
//! file per key under a root directory.

mod fs;
mod memory;

pub use fs::FsAdapter;
pub use memory::InMemoryAdapter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a persistence adapter.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("key not found: {key}")]
    NotFound { key: String },

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Result type for adapter operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A listed key with its stored size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: u64,
}

/// Durable key-value blob store.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous value.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Remove `key`. Returns `false` if it was absent.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// All keys starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;
}

/// Reject keys that could not be stored safely by every adapter.
///
/// Keys are `/`-separated segments of ASCII letters, digits, `-`, `_` and `.`;
/// empty segments and `.`/`..` are not allowed.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let invalid = |reason: &str| StorageError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(invalid("empty or relative segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid("unsupported character"));
        }
    }
    Ok(())
}
