//! Validation errors raised while constructing model values.

use thiserror::Error;

/// Errors produced when input does not describe a valid model value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A memory kind outside the canonical set.
    #[error("unknown memory kind: {0}")]
    UnknownMemoryKind(String),

    /// A required text field was empty or whitespace.
    #[error("required field is empty: {0}")]
    EmptyField(&'static str),
}
