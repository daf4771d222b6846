//! Summarized save tier.
//!
//! A summary keeps the player, a preview of the current story, the first
//! choices, the highest-ranked memories (content cut short) and the most
//! recent completed events. Relationships and inventory are dropped; only
//! their counts survive. Expanding a summary therefore yields a game state
//! with an empty relationship map and an empty inventory.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use story_state::{
    truncate_chars, Choice, GameProgression, GameState, Memory, MemoryKind, Player, Story,
};

use crate::config::SaveConfig;
use crate::context_compressor::{rank, top_of_kind};

const SUMMARY_ITEM_CHARS: usize = 50;
const SUMMARY_ITEMS_PER_KIND: usize = 2;

/// The payload of a summarized save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarizedState {
    pub player: Player,
    pub current_location: String,
    /// One-line recap for save listings.
    pub story_summary: String,
    /// Current story with content cut to a preview.
    pub current_story: Story,
    pub available_choices: Vec<Choice>,
    /// Ranked memories, most important first.
    pub key_memories: Vec<Memory>,
    pub recent_events: Vec<String>,
    pub completed_events_count: usize,
    pub relationships_count: usize,
    pub inventory_count: usize,
    pub original_memory_count: usize,
    /// SHA-256 over the fields that identify a point in the story.
    pub summary_hash: String,
}

impl SummarizedState {
    /// Summarize `state` under the limits in `config`.
    pub fn from_state(state: &GameState, config: &SaveConfig) -> Self {
        let key_memories = rank(&state.memories)
            .into_iter()
            .take(config.max_memories)
            .map(|m| m.truncated(config.memory_max_chars))
            .collect();

        let current_story = Story {
            content: truncate_chars(&state.current_story.content, config.story_preview_chars)
                .to_string(),
            ..state.current_story.clone()
        };

        let progression = &state.progression;
        Self {
            player: state.player.clone(),
            current_location: progression.current_location.clone(),
            story_summary: story_summary(state, config),
            current_story,
            available_choices: state
                .available_choices
                .iter()
                .take(config.max_choices)
                .cloned()
                .collect(),
            key_memories,
            recent_events: progression.recent_events(config.recent_events).to_vec(),
            completed_events_count: progression.completed_events.len(),
            relationships_count: progression.relationships.len(),
            inventory_count: progression.inventory.len(),
            original_memory_count: state.memories.len(),
            summary_hash: summary_hash(state),
        }
    }

    /// Rebuild a game state. Relationships and inventory come back empty.
    pub fn expand(self) -> GameState {
        let mut progression = GameProgression::new(self.current_location);
        progression.completed_events = self.recent_events;

        GameState {
            player: self.player,
            current_story: self.current_story,
            available_choices: self.available_choices,
            memories: self.key_memories,
            progression,
        }
    }
}

/// `Location: X | Recent: a → b | Promises: ... | Relationships: ...`,
/// cut to `max_summary_length` characters.
pub fn story_summary(state: &GameState, config: &SaveConfig) -> String {
    let mut parts = vec![format!("Location: {}", state.progression.current_location)];

    let recent = state.progression.recent_events(config.recent_events);
    if !recent.is_empty() {
        parts.push(format!("Recent: {}", recent.join(" → ")));
    }

    for (kind, label) in [
        (MemoryKind::Promise, "Promises"),
        (MemoryKind::Relationship, "Relationships"),
    ] {
        let items: Vec<&str> = top_of_kind(&state.memories, kind, SUMMARY_ITEMS_PER_KIND)
            .into_iter()
            .map(|m| truncate_chars(m.content(), SUMMARY_ITEM_CHARS))
            .collect();
        if !items.is_empty() {
            parts.push(format!("{}: {}", label, items.join("; ")));
        }
    }

    truncate_chars(&parts.join(" | "), config.max_summary_length).to_string()
}

#[derive(Serialize)]
struct HashInput<'a> {
    player_id: String,
    location: &'a str,
    completed_events: &'a [String],
    memory_count: usize,
    story_id: &'a str,
}

/// Hex SHA-256 of the fields that change as the story advances.
pub fn summary_hash(state: &GameState) -> String {
    let input = HashInput {
        player_id: state.player.id.to_string(),
        location: &state.progression.current_location,
        completed_events: &state.progression.completed_events,
        memory_count: state.memories.len(),
        story_id: &state.current_story.id,
    };
    let mut hasher = Sha256::new();
    // Serializing a struct of strings and integers cannot fail.
    hasher.update(serde_json::to_vec(&input).unwrap_or_default());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn state() -> GameState {
        let mut progression = GameProgression::new("Saffron City");
        for i in 0..8 {
            progression.complete_event(format!("event{}", i));
        }
        progression.record_relationship("Misty", "friend");
        progression.add_item("Bicycle");

        let mut state = GameState::new(
            Player::new("Red").with_trait("courage", 9),
            Story::new("s9", "Silph Co.", "w".repeat(400), "Saffron City"),
            progression,
        );
        state.available_choices = (0..12).map(|i| Choice::new(format!("c{}", i), "go")).collect();

        let base = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        for i in 0..60 {
            let kind = if i % 10 == 0 {
                MemoryKind::Promise
            } else if i % 5 == 0 {
                MemoryKind::Relationship
            } else {
                MemoryKind::Event
            };
            state.memories.push(
                Memory::new(kind, format!("{:03} {}", i, "m".repeat(150)), "Saffron City")
                    .unwrap()
                    .with_created_at(base + Duration::minutes(i)),
            );
        }
        state
    }

    #[test]
    fn test_summary_limits() {
        let config = SaveConfig::default();
        let summary = SummarizedState::from_state(&state(), &config);

        assert_eq!(summary.key_memories.len(), 50);
        assert!(summary.key_memories.iter().all(|m| m.content().chars().count() == 100));
        assert_eq!(summary.key_memories[0].kind(), MemoryKind::Promise);
        assert_eq!(summary.key_memories[0].content().get(..3), Some("050"));
        assert_eq!(summary.recent_events, vec!["event3", "event4", "event5", "event6", "event7"]);
        assert_eq!(summary.available_choices.len(), 10);
        assert_eq!(summary.current_story.content.chars().count(), 200);
        assert_eq!(summary.completed_events_count, 8);
        assert_eq!(summary.relationships_count, 1);
        assert_eq!(summary.inventory_count, 1);
        assert_eq!(summary.original_memory_count, 60);
    }

    #[test]
    fn test_expand_drops_relationships_and_inventory() {
        let config = SaveConfig::default();
        let expanded = SummarizedState::from_state(&state(), &config).expand();

        assert!(expanded.progression.relationships.is_empty());
        assert!(expanded.progression.inventory.is_empty());
        assert_eq!(expanded.progression.current_location, "Saffron City");
        assert_eq!(expanded.progression.completed_events.len(), 5);
        assert_eq!(expanded.memories.len(), 50);
        assert_eq!(expanded.player.trait_score("courage"), Some(9));
        assert_eq!(expanded.current_story.id, "s9");
    }

    #[test]
    fn test_story_summary_line() {
        let config = SaveConfig::default();
        let line = story_summary(&state(), &config);

        assert!(line.starts_with("Location: Saffron City | Recent: event3 → event4"));
        assert!(line.contains("Promises: 050"));
        assert!(line.chars().count() <= config.max_summary_length);
    }

    #[test]
    fn test_summary_hash_tracks_progress() {
        let mut state = state();
        let before = summary_hash(&state);
        assert_eq!(before, summary_hash(&state));
        assert_eq!(before.len(), 64);

        state.progression.complete_event("event8");
        assert_ne!(before, summary_hash(&state));
    }
}
