//! Player definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::PlayerId;

/// The player whose story is being tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Trait name -> score (e.g. "courage" -> 7).
    #[serde(default)]
    pub personality_traits: BTreeMap<String, i32>,
}

impl Player {
    /// Create a new player with the given name and no traits.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            personality_traits: BTreeMap::new(),
        }
    }

    /// Set a personality trait score.
    pub fn with_trait(mut self, name: impl Into<String>, score: i32) -> Self {
        self.personality_traits.insert(name.into(), score);
        self
    }

    /// Get a trait score, if the player has it.
    pub fn trait_score(&self, name: &str) -> Option<i32> {
        self.personality_traits.get(name).copied()
    }
}
