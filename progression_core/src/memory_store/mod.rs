//! Memory Store - typed, append-only log of what the player has experienced.
//!
//! Retrieval is by kind or by location, newest first. Relevance to free text
//! is not answered here; that goes to a [`crate::VectorSearch`] collaborator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use story_state::{Memory, MemoryId, MemoryKind};

use crate::config::MemoryConfig;
use crate::error::Result;

/// A structured memory record supplied by the narrative collaborator.
///
/// `kind` is free text on the wire and is validated when the record is
/// added to a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRequest {
    pub kind: String,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl MemoryRequest {
    pub fn new(kind: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// The memory log.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Insertion order, oldest first.
    memories: Vec<Memory>,
    max_retained: Option<usize>,
}

impl MemoryStore {
    /// Create an empty store with the given retention.
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            memories: Vec::new(),
            max_retained: config.max_retained,
        }
    }

    /// Rebuild a store from a snapshot, applying retention.
    pub fn from_memories(memories: Vec<Memory>, config: &MemoryConfig) -> Self {
        let mut store = Self {
            memories,
            max_retained: config.max_retained,
        };
        store.enforce_retention();
        store
    }

    /// Record a new memory.
    pub fn add(
        &mut self,
        kind: MemoryKind,
        content: impl Into<String>,
        location: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<MemoryId> {
        let memory = Memory::new(kind, content, location)?.with_metadata(metadata);
        Ok(self.push(memory))
    }

    /// Record a memory requested by the narrative collaborator at `location`.
    pub fn add_request(&mut self, request: MemoryRequest, location: &str) -> Result<MemoryId> {
        let kind = MemoryKind::parse(&request.kind)?;
        self.add(kind, request.content, location, request.metadata)
    }

    /// Append an already-built memory.
    pub fn push(&mut self, memory: Memory) -> MemoryId {
        let id = memory.id();
        self.memories.push(memory);
        self.enforce_retention();
        id
    }

    /// The most recent `limit` memories of a kind, newest first.
    pub fn by_kind(&self, kind: MemoryKind, limit: usize) -> Vec<&Memory> {
        newest_first(self.memories.iter().filter(|m| m.kind() == kind), limit)
    }

    /// The most recent `limit` memories at a location (case-insensitive), newest first.
    pub fn by_location(&self, location: &str, limit: usize) -> Vec<&Memory> {
        let wanted = location.to_lowercase();
        newest_first(
            self.memories
                .iter()
                .filter(|m| m.location().to_lowercase() == wanted),
            limit,
        )
    }

    /// Look up a memory by id.
    pub fn get(&self, id: MemoryId) -> Option<&Memory> {
        self.memories.iter().find(|m| m.id() == id)
    }

    /// All memories in insertion order.
    pub fn all(&self) -> &[Memory] {
        &self.memories
    }

    /// Copy of all memories, for snapshots.
    pub fn to_vec(&self) -> Vec<Memory> {
        self.memories.clone()
    }

    pub fn into_memories(self) -> Vec<Memory> {
        self.memories
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    fn enforce_retention(&mut self) {
        let Some(max) = self.max_retained else {
            return;
        };
        if self.memories.len() > max {
            let excess = self.memories.len() - max;
            self.memories.drain(..excess);
            tracing::debug!(dropped = excess, retained = max, "memory retention applied");
        }
    }
}

/// Sort by `created_at` descending; equal timestamps put later insertions first.
fn newest_first<'a>(memories: impl DoubleEndedIterator<Item = &'a Memory>, limit: usize) -> Vec<&'a Memory> {
    let mut selected: Vec<&Memory> = memories.rev().collect();
    selected.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    selected.truncate(limit);
    selected
}
