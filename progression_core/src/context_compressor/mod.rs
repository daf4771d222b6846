//! Context Compressor - condenses scene history and memories into a bounded
//! context for the narrative collaborator.
//!
//! Two tiers exist:
//! 1. **Standard**: while the story is short, the last few scenes verbatim
//!    and the top promises/relationships with full content
//! 2. **Compressed**: once the story is long, only the latest scene and a
//!    handful of truncated memories, folded into a summary string capped at
//!    `max_summary_length` characters
//!
//! Both tiers select memories with the shared [`ranking`] order, so the most
//! important items always come first and tail truncation only drops the
//! least important ones. Compression reads nothing but its arguments.

mod ranking;

pub use ranking::*;

use serde::{Deserialize, Serialize};
use story_state::{truncate_chars, Memory, MemoryId, MemoryKind};

use crate::config::ContextConfig;
use crate::memory_store::MemoryStore;
use crate::scene_history::{Scene, SceneHistory};

const EMPTY_SUMMARY: &str = "Beginning of adventure";
const PART_SEPARATOR: &str = " | ";
const ITEM_SEPARATOR: &str = "; ";

/// Which tier produced a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    Standard,
    Compressed,
}

/// The bounded context handed to the narrative collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedContext {
    pub mode: ContextMode,

    /// Delimited one-string summary, most important parts first.
    pub summary: String,

    pub active_promises: Vec<String>,

    pub key_relationships: Vec<String>,

    /// Memories tied to the current location, if one was given.
    pub location_context: Vec<String>,

    /// Scenes included verbatim, oldest first.
    pub recent_scenes: Vec<Scene>,

    /// Total scenes in history when the context was built.
    pub scene_count: usize,
}

impl CompressedContext {
    /// Format the context as a prompt section.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = String::new();

        prompt.push_str("## Story So Far\n");
        prompt.push_str(&self.summary);
        prompt.push_str("\n\n");

        if !self.recent_scenes.is_empty() {
            prompt.push_str("## Recent Scenes\n");
            for scene in &self.recent_scenes {
                match &scene.choice_made {
                    Some(choice) => prompt.push_str(&format!(
                        "- {}: {} (chose: {})\n",
                        scene.location, scene.description, choice
                    )),
                    None => prompt.push_str(&format!("- {}: {}\n", scene.location, scene.description)),
                }
            }
            prompt.push('\n');
        }

        push_list(&mut prompt, "## Active Promises", &self.active_promises);
        push_list(&mut prompt, "## Key Relationships", &self.key_relationships);
        push_list(&mut prompt, "## About This Place", &self.location_context);

        prompt
    }
}

fn push_list(prompt: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    prompt.push_str(heading);
    prompt.push('\n');
    for item in items {
        prompt.push_str(&format!("- {}\n", item));
    }
    prompt.push('\n');
}

/// Builds [`CompressedContext`]s.
#[derive(Debug, Clone)]
pub struct ContextCompressor {
    config: ContextConfig,
}

impl ContextCompressor {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ContextConfig::default())
    }

    /// The tier a history of this length calls for.
    pub fn mode_for(&self, history: &SceneHistory) -> ContextMode {
        if history.len() > self.config.long_story_threshold {
            ContextMode::Compressed
        } else {
            ContextMode::Standard
        }
    }

    /// Build a context, choosing the tier from the history length.
    pub fn compress(
        &self,
        history: &SceneHistory,
        store: &MemoryStore,
        location: Option<&str>,
    ) -> CompressedContext {
        let mode = self.mode_for(history);
        tracing::debug!(?mode, scenes = history.len(), memories = store.len(), "building context");
        self.compress_with_mode(history, store, location, mode)
    }

    /// Build a context in an explicit tier.
    pub fn compress_with_mode(
        &self,
        history: &SceneHistory,
        store: &MemoryStore,
        location: Option<&str>,
        mode: ContextMode,
    ) -> CompressedContext {
        match mode {
            ContextMode::Standard => self.standard(history, store, location),
            ContextMode::Compressed => self.compressed(history, store, location),
        }
    }

    fn standard(
        &self,
        history: &SceneHistory,
        store: &MemoryStore,
        location: Option<&str>,
    ) -> CompressedContext {
        let memories = store.all();
        let per_kind = self.config.standard_per_kind;
        let selection = Selection::gather(
            memories,
            location,
            per_kind,
            per_kind,
            self.config.standard_location_slice,
        );

        let recent_scenes: Vec<Scene> = history
            .recent(self.config.standard_scene_window)
            .into_iter()
            .cloned()
            .collect();

        let active_promises = contents(&selection.promises, None);
        let key_relationships = contents(&selection.relationships, None);
        let location_context = contents(&selection.here, None);

        let mut parts = Vec::new();
        if !recent_scenes.is_empty() {
            let trail: Vec<&str> = recent_scenes.iter().map(|s| s.location.as_str()).collect();
            parts.push(format!("Recent: {}", trail.join(" → ")));
        }
        push_part(&mut parts, "PROMISE", &active_promises);
        push_part(&mut parts, "RELATIONSHIP", &key_relationships);
        push_part(&mut parts, "HERE", &location_context);

        CompressedContext {
            mode: ContextMode::Standard,
            summary: join_parts(parts),
            active_promises,
            key_relationships,
            location_context,
            recent_scenes,
            scene_count: history.len(),
        }
    }

    fn compressed(
        &self,
        history: &SceneHistory,
        store: &MemoryStore,
        location: Option<&str>,
    ) -> CompressedContext {
        let memories = store.all();
        let selection = Selection::gather(
            memories,
            location,
            self.config.compressed_promises,
            self.config.compressed_relationships,
            self.config.compressed_location_slice,
        );
        let cap = Some(self.config.item_max_chars);

        let active_promises = contents(&selection.promises, cap);
        let key_relationships = contents(&selection.relationships, cap);
        let location_context = contents(&selection.here, cap);
        let recent_scenes: Vec<Scene> = history.latest().into_iter().cloned().collect();

        let mut parts = Vec::new();
        push_part(&mut parts, "PROMISE", &active_promises);
        push_part(&mut parts, "RELATIONSHIP", &key_relationships);
        push_part(&mut parts, "HERE", &location_context);
        if let Some(scene) = recent_scenes.first() {
            parts.push(format!(
                "LATEST: {}: {}",
                scene.location,
                truncate_chars(&scene.description, self.config.item_max_chars)
            ));
        }

        let summary = join_parts(parts);
        let summary = truncate_chars(&summary, self.config.max_summary_length).to_string();

        CompressedContext {
            mode: ContextMode::Compressed,
            summary,
            active_promises,
            key_relationships,
            location_context,
            recent_scenes,
            scene_count: history.len(),
        }
    }
}

/// Memories chosen for one context, each list in ranked order.
struct Selection<'a> {
    promises: Vec<&'a Memory>,
    relationships: Vec<&'a Memory>,
    here: Vec<&'a Memory>,
}

impl<'a> Selection<'a> {
    fn gather(
        memories: &'a [Memory],
        location: Option<&str>,
        promises: usize,
        relationships: usize,
        here: usize,
    ) -> Self {
        let promises = top_of_kind(memories, MemoryKind::Promise, promises);
        let relationships = top_of_kind(memories, MemoryKind::Relationship, relationships);

        // Location memories already listed above are not repeated.
        let here = match location {
            Some(location) => {
                let taken: Vec<MemoryId> = promises
                    .iter()
                    .chain(relationships.iter())
                    .map(|m| m.id())
                    .collect();
                top_at_location(memories, location, &taken, here)
            }
            None => Vec::new(),
        };

        Self {
            promises,
            relationships,
            here,
        }
    }
}

fn contents(memories: &[&Memory], max_chars: Option<usize>) -> Vec<String> {
    memories
        .iter()
        .map(|m| match max_chars {
            Some(max) => truncate_chars(m.content(), max).to_string(),
            None => m.content().to_string(),
        })
        .collect()
}

fn push_part(parts: &mut Vec<String>, label: &str, items: &[String]) {
    if !items.is_empty() {
        parts.push(format!("{}: {}", label, items.join(ITEM_SEPARATOR)));
    }
}

fn join_parts(parts: Vec<String>) -> String {
    if parts.is_empty() {
        EMPTY_SUMMARY.to_string()
    } else {
        parts.join(PART_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HistoryConfig, MemoryConfig};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn at(minutes: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn history_with(count: usize) -> SceneHistory {
        let mut history = SceneHistory::new(&HistoryConfig::default()).unwrap();
        for i in 0..count {
            history.add_scene(
                Scene::new(format!("loc{}", i), format!("scene {}", i)).with_created_at(at(i as i64)),
            );
        }
        history
    }

    fn store_with(memories: Vec<Memory>) -> MemoryStore {
        MemoryStore::from_memories(memories, &MemoryConfig { max_retained: None })
    }

    fn memory(kind: MemoryKind, content: &str, location: &str, minutes: i64) -> Memory {
        Memory::new(kind, content, location)
            .unwrap()
            .with_created_at(at(minutes))
    }

    #[test]
    fn test_mode_threshold() {
        let compressor = ContextCompressor::with_defaults();
        assert_eq!(compressor.mode_for(&history_with(10)), ContextMode::Standard);
        assert_eq!(compressor.mode_for(&history_with(11)), ContextMode::Compressed);
    }

    #[test]
    fn test_empty_context() {
        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress(&history_with(0), &store_with(vec![]), None);

        assert_eq!(context.summary, EMPTY_SUMMARY);
        assert!(context.recent_scenes.is_empty());
        assert_eq!(context.scene_count, 0);
    }

    #[test]
    fn test_standard_context_keeps_full_content() {
        let long = "x".repeat(120);
        let store = store_with(vec![
            memory(MemoryKind::Promise, &long, "Town", 1),
            memory(MemoryKind::Relationship, "Gary is a rival", "Lab", 2),
        ]);
        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress(&history_with(7), &store, None);

        assert_eq!(context.mode, ContextMode::Standard);
        assert_eq!(context.recent_scenes.len(), 5);
        assert_eq!(context.recent_scenes[0].description, "scene 2");
        assert_eq!(context.active_promises, vec![long]);
        assert_eq!(context.key_relationships, vec!["Gary is a rival".to_string()]);
        assert!(context.summary.starts_with("Recent: loc2 → loc3"));
    }

    #[test]
    fn test_standard_caps_per_kind() {
        let memories: Vec<_> = (0..8)
            .map(|i| memory(MemoryKind::Promise, &format!("p{}", i), "Town", i))
            .collect();
        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress(&history_with(2), &store_with(memories), None);

        assert_eq!(context.active_promises.len(), 5);
        assert_eq!(context.active_promises[0], "p7");
    }

    #[test]
    fn test_compressed_context_truncates() {
        let long = "y".repeat(80);
        let mut memories: Vec<_> = (0..5)
            .map(|i| memory(MemoryKind::Promise, &format!("{}{}", long, i), "Town", i))
            .collect();
        memories.extend((0..4).map(|i| memory(MemoryKind::Relationship, &long, "Town", i)));

        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress(&history_with(15), &store_with(memories), None);

        assert_eq!(context.mode, ContextMode::Compressed);
        assert_eq!(context.recent_scenes.len(), 1);
        assert_eq!(context.recent_scenes[0].description, "scene 14");
        assert_eq!(context.active_promises.len(), 3);
        assert_eq!(context.key_relationships.len(), 2);
        assert!(context
            .active_promises
            .iter()
            .chain(context.key_relationships.iter())
            .all(|s| s.chars().count() == 50));
        assert!(context.summary.chars().count() <= 500);
        assert!(context.summary.contains("LATEST: loc14"));
    }

    #[test]
    fn test_compressed_summary_truncates_tail() {
        let long = "z".repeat(300);
        let memories: Vec<_> = (0..3)
            .map(|i| memory(MemoryKind::Promise, &long, "Town", i))
            .collect();
        let compressor = ContextCompressor::new(ContextConfig {
            item_max_chars: 300,
            max_summary_length: 100,
            ..Default::default()
        });
        let context = compressor.compress(&history_with(12), &store_with(memories), None);

        assert_eq!(context.summary.chars().count(), 100);
        assert!(context.summary.starts_with("PROMISE: zzz"));
    }

    #[test]
    fn test_ranking_order_in_summary() {
        let store = store_with(vec![
            memory(MemoryKind::Promise, "A", "Cerulean", 1),
            memory(MemoryKind::General, "B", "Cerulean", 2),
            memory(MemoryKind::Relationship, "C", "Cerulean", 3),
        ]);
        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress(&history_with(12), &store, Some("Cerulean"));

        let a = context.summary.find(": A").unwrap();
        let c = context.summary.find(": C").unwrap();
        let b = context.summary.find(": B").unwrap();
        assert!(a < c && c < b, "summary out of order: {}", context.summary);
        assert_eq!(context.location_context, vec!["B".to_string()]);
    }

    #[test]
    fn test_location_slice() {
        let store = store_with(vec![
            memory(MemoryKind::Location, "Water gym", "Cerulean", 1),
            memory(MemoryKind::Event, "Bridge battle", "cerulean", 2),
            memory(MemoryKind::Event, "Bike shop", "Cerulean", 3),
            memory(MemoryKind::Event, "Forest bug", "Viridian", 4),
        ]);
        let compressor = ContextCompressor::with_defaults();

        let compressed = compressor.compress(&history_with(12), &store, Some("CERULEAN"));
        assert_eq!(
            compressed.location_context,
            vec!["Water gym".to_string(), "Bike shop".to_string()]
        );

        let standard = compressor.compress(&history_with(3), &store, None);
        assert!(standard.location_context.is_empty());
    }

    #[test]
    fn test_compress_is_idempotent() {
        let store = store_with(vec![
            memory(MemoryKind::Promise, "Find the lost Clefairy", "Mt. Moon", 1),
            memory(MemoryKind::Achievement, "Boulder Badge", "Pewter", 2),
            memory(MemoryKind::Relationship, "Brock trusts you", "Pewter", 3),
        ]);
        let history = history_with(14);
        let compressor = ContextCompressor::with_defaults();

        let first = serde_json::to_vec(&compressor.compress(&history, &store, Some("Pewter"))).unwrap();
        let second = serde_json::to_vec(&compressor.compress(&history, &store, Some("Pewter"))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_explicit_mode() {
        let compressor = ContextCompressor::with_defaults();
        let context = compressor.compress_with_mode(
            &history_with(3),
            &store_with(vec![]),
            None,
            ContextMode::Compressed,
        );
        assert_eq!(context.mode, ContextMode::Compressed);
        assert_eq!(context.recent_scenes.len(), 1);
    }

    #[test]
    fn test_context_to_prompt() {
        let mut store = store_with(vec![]);
        store
            .add(MemoryKind::Promise, "Return the Town Map", "Pallet", BTreeMap::new())
            .unwrap();
        let mut history = history_with(0);
        history.add_scene(Scene::new("Pallet", "Mom waves goodbye").with_choice("Leave home"));

        let prompt = ContextCompressor::with_defaults()
            .compress(&history, &store, None)
            .to_prompt_string();

        assert!(prompt.contains("## Story So Far"));
        assert!(prompt.contains("Mom waves goodbye (chose: Leave home)"));
        assert!(prompt.contains("- Return the Town Map"));
        assert!(!prompt.contains("## About This Place"));
    }
}
