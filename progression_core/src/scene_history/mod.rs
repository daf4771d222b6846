//! Scene History - bounded FIFO of the narrative beats the player visited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::HistoryConfig;
use crate::error::{EngineError, Result};

/// One narrative beat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub location: String,
    pub description: String,
    /// Text of the choice that led here, if any.
    pub choice_made: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Scene {
    /// Create a scene stamped with the current time.
    pub fn new(location: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            description: description.into(),
            choice_made: None,
            created_at: Utc::now(),
        }
    }

    /// Record the choice that led to this scene.
    pub fn with_choice(mut self, choice: impl Into<String>) -> Self {
        self.choice_made = Some(choice.into());
        self
    }

    /// Override the timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Bounded queue of scenes, oldest at the front.
#[derive(Debug, Clone)]
pub struct SceneHistory {
    scenes: VecDeque<Scene>,
    max_history_length: usize,
}

impl SceneHistory {
    /// Fails with [`EngineError::Config`] if the cap is 0.
    pub fn new(config: &HistoryConfig) -> Result<Self> {
        let max_history_length = config.max_history_length;
        if max_history_length == 0 {
            return Err(EngineError::Config(
                "history.max_history_length must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            scenes: VecDeque::with_capacity(max_history_length),
            max_history_length,
        })
    }

    /// Append a scene, evicting the oldest ones past the cap.
    ///
    /// Returns how many scenes were evicted.
    pub fn add_scene(&mut self, scene: Scene) -> usize {
        self.scenes.push_back(scene);
        let mut evicted = 0;
        while self.scenes.len() > self.max_history_length {
            self.scenes.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                max_history_length = self.max_history_length,
                "scene history capacity applied"
            );
        }
        evicted
    }

    /// The last `n` scenes in chronological order.
    pub fn recent(&self, n: usize) -> Vec<&Scene> {
        let start = self.scenes.len().saturating_sub(n);
        self.scenes.range(start..).collect()
    }

    /// The last `n` scenes, newest first.
    pub fn recent_newest_first(&self, n: usize) -> Vec<&Scene> {
        self.scenes.iter().rev().take(n).collect()
    }

    pub fn latest(&self) -> Option<&Scene> {
        self.scenes.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.iter()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn max_history_length(&self) -> usize {
        self.max_history_length
    }
}
