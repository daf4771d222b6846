//! Serialized size estimate of a game state.
//!
//! Each component is measured as its JSON encoding, the same encoding a
//! Full save writes, so the estimate tracks what would actually be stored
//! before compression.

use serde::{Deserialize, Serialize};
use story_state::GameState;

use crate::config::SaveConfig;
use crate::error::Result;

/// Memory count above which cleanup is suggested.
const HIGH_MEMORY_COUNT: usize = 100;

/// Per-component JSON sizes of a game state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeEstimate {
    pub player_bytes: usize,
    pub story_bytes: usize,
    pub choices_bytes: usize,
    pub memories_bytes: usize,
    pub progression_bytes: usize,
    /// Sum of the component sizes.
    pub total_bytes: usize,
    pub memory_count: usize,
    pub choice_count: usize,
    pub completed_events: usize,
    /// `total_bytes` exceeds the summarize threshold.
    pub should_summarize: bool,
    /// Human-readable hints for keeping the state small.
    pub suggestions: Vec<String>,
}

impl SizeEstimate {
    pub fn total_kib(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }
}

/// Measure `state` against the thresholds in `config`.
pub fn estimate(state: &GameState, config: &SaveConfig) -> Result<SizeEstimate> {
    let player_bytes = serde_json::to_vec(&state.player)?.len();
    let story_bytes = serde_json::to_vec(&state.current_story)?.len();
    let choices_bytes = serde_json::to_vec(&state.available_choices)?.len();
    let memories_bytes = serde_json::to_vec(&state.memories)?.len();
    let progression_bytes = serde_json::to_vec(&state.progression)?.len();
    let total_bytes =
        player_bytes + story_bytes + choices_bytes + memories_bytes + progression_bytes;
    let should_summarize = total_bytes > config.summarize_threshold_bytes;

    let mut suggestions = Vec::new();
    if memories_bytes > config.compress_threshold_bytes {
        suggestions.push(format!(
            "Consider limiting memories to the {} most important",
            config.max_memories
        ));
    }
    if should_summarize {
        suggestions.push("Consider using summarization for storage".to_string());
    }
    if state.memories.len() > HIGH_MEMORY_COUNT {
        suggestions.push("Memory count is high - consider cleanup".to_string());
    }

    Ok(SizeEstimate {
        player_bytes,
        story_bytes,
        choices_bytes,
        memories_bytes,
        progression_bytes,
        total_bytes,
        memory_count: state.memories.len(),
        choice_count: state.available_choices.len(),
        completed_events: state.progression.completed_events.len(),
        should_summarize,
        suggestions,
    })
}
