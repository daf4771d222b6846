//! Memory definitions - typed facts the player accumulates during play.

mod kind;

pub use kind::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ModelError;

/// Unique identifier for memories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single remembered fact.
///
/// Memories are immutable once built: fields are only readable, and the
/// builder methods consume the value they extend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredMemory")]
pub struct Memory {
    id: MemoryId,
    kind: MemoryKind,
    content: String,
    location: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Wire form of [`Memory`], checked before it becomes one.
#[derive(Deserialize)]
struct StoredMemory {
    id: MemoryId,
    kind: MemoryKind,
    content: String,
    location: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl TryFrom<StoredMemory> for Memory {
    type Error = ModelError;

    fn try_from(stored: StoredMemory) -> Result<Self, Self::Error> {
        if stored.content.trim().is_empty() {
            return Err(ModelError::EmptyField("content"));
        }
        Ok(Self {
            id: stored.id,
            kind: stored.kind,
            content: stored.content,
            location: stored.location,
            created_at: stored.created_at,
            metadata: stored.metadata,
        })
    }
}

impl Memory {
    /// Create a memory stamped with the current time.
    ///
    /// Fails if `content` is empty or whitespace.
    pub fn new(
        kind: MemoryKind,
        content: impl Into<String>,
        location: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ModelError::EmptyField("content"));
        }
        Ok(Self {
            id: MemoryId::new(),
            kind,
            content,
            location: location.into(),
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        })
    }

    /// Override the creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Attach a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the metadata map.
    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn id(&self) -> MemoryId {
        self.id
    }

    pub fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Case-insensitive location comparison.
    pub fn is_at(&self, location: &str) -> bool {
        self.location.to_lowercase() == location.to_lowercase()
    }

    /// A copy of this memory (same id) with content cut to `max_chars`.
    ///
    /// Leading whitespace is dropped first when the cut would otherwise
    /// leave nothing but whitespace.
    pub fn truncated(&self, max_chars: usize) -> Memory {
        let mut cut = truncate_chars(&self.content, max_chars);
        if cut.trim().is_empty() {
            cut = truncate_chars(self.content.trim_start(), max_chars);
        }
        Memory {
            content: cut.to_string(),
            ..self.clone()
        }
    }
}

/// Cut `text` to at most `max_chars` characters without splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_creation() {
        let memory = Memory::new(MemoryKind::Promise, "Return the Poke Ball", "Pallet Town").unwrap();
        assert_eq!(memory.kind(), MemoryKind::Promise);
        assert_eq!(memory.content(), "Return the Poke Ball");
        assert_eq!(memory.location(), "Pallet Town");
        assert!(memory.metadata().is_empty());
    }

    #[test]
    fn test_memory_rejects_empty_content() {
        let err = Memory::new(MemoryKind::Event, "   ", "Route 1").unwrap_err();
        assert_eq!(err, ModelError::EmptyField("content"));
    }

    #[test]
    fn test_memory_builder() {
        let memory = Memory::new(MemoryKind::Relationship, "Met Gary", "Lab")
            .unwrap()
            .with_meta("character", "Gary");

        assert_eq!(memory.metadata().get("character").map(String::as_str), Some("Gary"));
    }

    #[test]
    fn test_location_match_ignores_case() {
        let memory = Memory::new(MemoryKind::Location, "Tall grass", "Viridian Forest").unwrap();
        assert!(memory.is_at("viridian forest"));
        assert!(!memory.is_at("Route 2"));
    }

    #[test]
    fn test_truncated_keeps_identity() {
        let memory = Memory::new(MemoryKind::General, "abcdefghij", "Cave").unwrap();
        let short = memory.truncated(4);
        assert_eq!(short.content(), "abcd");
        assert_eq!(short.id(), memory.id());
        assert_eq!(memory.content(), "abcdefghij");
    }

    #[test]
    fn test_truncated_skips_leading_whitespace_when_needed() {
        let memory = Memory::new(MemoryKind::Event, "      Surf learned", "Fuchsia").unwrap();
        assert_eq!(memory.truncated(4).content(), "Surf");
        assert_eq!(memory.truncated(8).content(), "      Su");
    }

    #[test]
    fn test_deserialize_validates_content() {
        let memory = Memory::new(MemoryKind::Achievement, "Soul Badge", "Fuchsia").unwrap();
        let json = serde_json::to_string(&memory).unwrap();
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, memory);

        let blank = json.replace("Soul Badge", "  ");
        let err = serde_json::from_str::<Memory>(&blank).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("Pokémon", 4), "Poké");
        assert_eq!(truncate_chars("short", 50), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
