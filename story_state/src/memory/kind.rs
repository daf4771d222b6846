//! The canonical memory kinds and their priority weights.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Kinds of memories. This is a closed set; legacy spellings are mapped onto
/// it when parsing (see [`MemoryKind::parse`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the player committed to do.
    Promise,
    /// A bond or rivalry with another character.
    Relationship,
    /// Something that happened.
    Event,
    /// Knowledge about a place.
    Location,
    /// A milestone reached.
    Achievement,
    /// Anything else.
    General,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 6] = [
        MemoryKind::Promise,
        MemoryKind::Relationship,
        MemoryKind::Event,
        MemoryKind::Location,
        MemoryKind::Achievement,
        MemoryKind::General,
    ];

    /// Priority weight used when ranking memories. Higher is more important.
    pub fn weight(&self) -> u8 {
        match self {
            MemoryKind::Promise => 5,
            MemoryKind::Relationship => 4,
            MemoryKind::Achievement => 3,
            MemoryKind::Location => 2,
            MemoryKind::Event | MemoryKind::General => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryKind::Promise => "promise",
            MemoryKind::Relationship => "relationship",
            MemoryKind::Event => "event",
            MemoryKind::Location => "location",
            MemoryKind::Achievement => "achievement",
            MemoryKind::General => "general",
        }
    }

    /// Parse a kind name, case-insensitively.
    ///
    /// Accepts the canonical names plus `friendship` (relationship) and
    /// `lesson` (general).
    pub fn parse(name: &str) -> Result<Self, ModelError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "promise" => Ok(MemoryKind::Promise),
            "relationship" | "friendship" => Ok(MemoryKind::Relationship),
            "event" => Ok(MemoryKind::Event),
            "location" => Ok(MemoryKind::Location),
            "achievement" => Ok(MemoryKind::Achievement),
            "general" | "lesson" => Ok(MemoryKind::General),
            _ => Err(ModelError::UnknownMemoryKind(name.to_string())),
        }
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
