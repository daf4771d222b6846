//! Game state - the aggregate that is saved and loaded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{Choice, Player, Story};
use crate::memory::{Memory, MemoryKind};

/// Progress through the story.
///
/// Only grows: events are appended, relationships recorded, items added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GameProgression {
    pub current_location: String,

    /// Labels of completed events, oldest first.
    #[serde(default)]
    pub completed_events: Vec<String>,

    /// Character name -> relationship status.
    #[serde(default)]
    pub relationships: BTreeMap<String, String>,

    #[serde(default)]
    pub inventory: Vec<String>,
}

impl GameProgression {
    /// Create progression starting at the given location.
    pub fn new(current_location: impl Into<String>) -> Self {
        Self {
            current_location: current_location.into(),
            ..Default::default()
        }
    }

    /// Move to a new location.
    pub fn move_to(&mut self, location: impl Into<String>) {
        self.current_location = location.into();
    }

    /// Append a completed event label.
    pub fn complete_event(&mut self, label: impl Into<String>) {
        self.completed_events.push(label.into());
    }

    /// Record the current relationship status with a character.
    pub fn record_relationship(&mut self, character: impl Into<String>, status: impl Into<String>) {
        self.relationships.insert(character.into(), status.into());
    }

    /// Add an item to the inventory.
    pub fn add_item(&mut self, item: impl Into<String>) {
        self.inventory.push(item.into());
    }

    /// The last `n` completed events, oldest first.
    pub fn recent_events(&self, n: usize) -> &[String] {
        let start = self.completed_events.len().saturating_sub(n);
        &self.completed_events[start..]
    }
}

/// The complete state of a playthrough at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub player: Player,
    pub current_story: Story,
    #[serde(default)]
    pub available_choices: Vec<Choice>,
    #[serde(default)]
    pub memories: Vec<Memory>,
    pub progression: GameProgression,
}

impl GameState {
    /// Create a new state with no choices or memories.
    pub fn new(player: Player, current_story: Story, progression: GameProgression) -> Self {
        Self {
            player,
            current_story,
            available_choices: Vec::new(),
            memories: Vec::new(),
            progression,
        }
    }

    /// Number of memories of a given kind.
    pub fn memory_count(&self, kind: MemoryKind) -> usize {
        self.memories.iter().filter(|m| m.kind() == kind).count()
    }
}
