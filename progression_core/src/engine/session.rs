//! One player's live state: the game state parts plus scene history and the
//! memory log.

use story_state::{Choice, GameProgression, GameState, MemoryId, Player, Story};
use tracing::warn;

use crate::collaborators::{MemoryRequest, NarrativeResponse};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::memory_store::MemoryStore;
use crate::scene_history::{Scene, SceneHistory};

/// A memory request the store refused.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMemory {
    pub request: MemoryRequest,
    pub reason: String,
}

/// What applying a narrative response changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedNarrative {
    pub recorded: Vec<MemoryId>,
    pub rejected: Vec<RejectedMemory>,
    /// Scenes dropped from history to make room.
    pub evicted_scenes: usize,
}

/// Live state of one player.
#[derive(Debug, Clone)]
pub struct PlayerSession {
    player: Player,
    current_story: Story,
    available_choices: Vec<Choice>,
    progression: GameProgression,
    history: SceneHistory,
    memories: MemoryStore,
}

impl PlayerSession {
    /// Start from a game state with an empty scene history.
    pub fn from_state(state: GameState, config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            history: SceneHistory::new(&config.history)?,
            memories: MemoryStore::from_memories(state.memories, &config.memory),
            player: state.player,
            current_story: state.current_story,
            available_choices: state.available_choices,
            progression: state.progression,
        })
    }

    /// Copy the session out as a game state.
    pub fn snapshot(&self) -> GameState {
        GameState {
            player: self.player.clone(),
            current_story: self.current_story.clone(),
            available_choices: self.available_choices.clone(),
            memories: self.memories.to_vec(),
            progression: self.progression.clone(),
        }
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn current_story(&self) -> &Story {
        &self.current_story
    }

    pub fn available_choices(&self) -> &[Choice] {
        &self.available_choices
    }

    pub fn progression(&self) -> &GameProgression {
        &self.progression
    }

    pub fn history(&self) -> &SceneHistory {
        &self.history
    }

    pub fn memories(&self) -> &MemoryStore {
        &self.memories
    }

    pub fn memories_mut(&mut self) -> &mut MemoryStore {
        &mut self.memories
    }

    pub fn current_location(&self) -> &str {
        &self.progression.current_location
    }

    /// Append a scene and move the player to its location.
    pub fn record_scene(&mut self, scene: Scene) -> usize {
        if scene.location != self.progression.current_location {
            self.progression.move_to(scene.location.clone());
        }
        self.history.add_scene(scene)
    }

    /// Look up an offered choice by id.
    pub fn find_choice(&self, choice_id: &str) -> Result<&Choice> {
        self.available_choices
            .iter()
            .find(|c| c.id == choice_id)
            .ok_or_else(|| {
                EngineError::Validation(format!("choice {:?} is not available", choice_id))
            })
    }

    /// Apply a choice's trait effects.
    pub fn take_choice(&mut self, choice: &Choice) {
        for (name, delta) in &choice.effects {
            *self
                .player
                .personality_traits
                .entry(name.clone())
                .or_insert(0) += delta;
        }
    }

    /// Record a narrative response: the new scene, story text, choices and
    /// memories. Invalid memory requests are skipped and reported.
    pub fn apply_narrative(
        &mut self,
        response: NarrativeResponse,
        choice_text: Option<String>,
    ) -> AppliedNarrative {
        let location = response
            .location
            .unwrap_or_else(|| self.progression.current_location.clone());

        let mut scene = Scene::new(location.clone(), response.text.clone());
        if let Some(choice) = choice_text {
            scene = scene.with_choice(choice);
        }
        let evicted_scenes = self.record_scene(scene);

        self.current_story.content = response.text;
        self.current_story.location = location.clone();
        if !response.choices.is_empty() {
            self.available_choices = response.choices;
        }

        let mut applied = AppliedNarrative {
            evicted_scenes,
            ..AppliedNarrative::default()
        };
        for request in response.memories {
            match self.memories.add_request(request.clone(), &location) {
                Ok(id) => applied.recorded.push(id),
                Err(err) => {
                    warn!(
                        player_id = %self.player.id,
                        kind = %request.kind,
                        error = %err,
                        "rejected memory request"
                    );
                    applied.rejected.push(RejectedMemory {
                        request,
                        reason: err.to_string(),
                    });
                }
            }
        }
        applied
    }
}
