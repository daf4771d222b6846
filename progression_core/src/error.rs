//! Error types for the progression engine.

use story_state::ModelError;
use thiserror::Error;

use crate::persistence::StorageError;

/// Errors surfaced by engine operations.
///
/// Capacity evictions (old scenes, old saves, retained memories) are not
/// errors; they are logged and reported through return values.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A save or player does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Input rejected at the boundary.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Encoding a payload failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A stored save could not be decompressed or decoded.
    #[error("corrupt save {save_id}: {reason}")]
    CorruptSave { save_id: String, reason: String },

    /// The persistence adapter failed.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// A persistence call did not finish within the configured timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    /// A narrative or search collaborator failed.
    #[error("collaborator failed: {0}")]
    Collaborator(String),

    /// Configuration could not be read or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ModelError> for EngineError {
    fn from(err: ModelError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { key } => EngineError::NotFound(key),
            other => EngineError::Storage(other),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
