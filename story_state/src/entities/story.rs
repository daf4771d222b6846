//! Story segments and the choices offered at the end of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The story segment currently presented to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
    pub location: String,
}

impl Story {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            location: location.into(),
        }
    }
}

/// A choice the player can take next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: String,
    pub text: String,
    /// Trait name -> delta applied when the choice is taken.
    #[serde(default)]
    pub effects: BTreeMap<String, i32>,
}

impl Choice {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            effects: BTreeMap::new(),
        }
    }

    /// Add a trait effect to this choice.
    pub fn with_effect(mut self, trait_name: impl Into<String>, delta: i32) -> Self {
        self.effects.insert(trait_name.into(), delta);
        self
    }
}
