//! Interfaces to the services the engine consults but does not implement.
//!
//! - [`NarrativeCollaborator`] turns a bounded context into the next piece
//!   of story, together with structured memory records to remember.
//! - [`VectorSearch`] answers "what is relevant to this text" for recall.
//!   Context compression never calls it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use story_state::{Choice, MemoryId, MemoryKind, PlayerId};

use crate::context_compressor::CompressedContext;
use crate::error::Result;

pub use crate::memory_store::MemoryRequest;

/// Input to one narrative generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRequest {
    pub player_id: PlayerId,
    pub player_name: String,
    pub context: CompressedContext,
    pub personality_traits: BTreeMap<String, i32>,
    /// Text of the choice the player just made.
    pub recent_choice: Option<String>,
    pub current_location: String,
}

impl NarrativeRequest {
    /// Render the request as prompt text.
    pub fn to_prompt_string(&self) -> String {
        let mut prompt = format!(
            "# Player: {}\nLocation: {}\n",
            self.player_name, self.current_location
        );
        if !self.personality_traits.is_empty() {
            let traits: Vec<String> = self
                .personality_traits
                .iter()
                .map(|(name, score)| format!("{} {}", name, score))
                .collect();
            prompt.push_str(&format!("Traits: {}\n", traits.join(", ")));
        }
        if let Some(choice) = &self.recent_choice {
            prompt.push_str(&format!("Chose: {}\n", choice));
        }
        prompt.push('\n');
        prompt.push_str(&self.context.to_prompt_string());
        prompt
    }
}

/// What the narrative collaborator produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResponse {
    /// The new scene text.
    pub text: String,
    /// Where the scene takes place, if the player moved.
    #[serde(default)]
    pub location: Option<String>,
    /// Choices offered next. Empty keeps the current ones.
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Memories the collaborator wants recorded.
    #[serde(default)]
    pub memories: Vec<MemoryRequest>,
}

impl NarrativeResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    pub fn with_memory(mut self, request: MemoryRequest) -> Self {
        self.memories.push(request);
        self
    }
}

/// Generates narrative text.
#[async_trait]
pub trait NarrativeCollaborator: Send + Sync {
    async fn generate(&self, request: NarrativeRequest) -> Result<NarrativeResponse>;
}

/// A memory returned by semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecalledMemory {
    /// Local id, when the search index knows it.
    pub memory_id: Option<MemoryId>,
    pub kind: Option<MemoryKind>,
    pub content: String,
    /// Similarity, higher is closer.
    pub score: f32,
}

/// Semantic recall over a player's memories.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Up to `k` memories most similar to `query`, best first.
    async fn search(
        &self,
        player_id: PlayerId,
        query: &str,
        k: usize,
    ) -> Result<Vec<RecalledMemory>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context_compressor::ContextMode;

    fn request() -> NarrativeRequest {
        let mut traits = BTreeMap::new();
        traits.insert("courage".to_string(), 8);
        NarrativeRequest {
            player_id: PlayerId::nil(),
            player_name: "Gold".to_string(),
            context: CompressedContext {
                mode: ContextMode::Standard,
                summary: "Beginning of adventure".to_string(),
                active_promises: vec!["Find the egg".to_string()],
                key_relationships: Vec::new(),
                location_context: Vec::new(),
                recent_scenes: Vec::new(),
                scene_count: 0,
            },
            personality_traits: traits,
            recent_choice: Some("Head north".to_string()),
            current_location: "New Bark Town".to_string(),
        }
    }

    #[test]
    fn test_request_prompt() {
        let prompt = request().to_prompt_string();
        assert!(prompt.starts_with("# Player: Gold\nLocation: New Bark Town\n"));
        assert!(prompt.contains("Traits: courage 8"));
        assert!(prompt.contains("Chose: Head north"));
        assert!(prompt.contains("Find the egg"));
    }

    #[test]
    fn test_response_defaults_when_fields_missing() {
        let response: NarrativeResponse =
            serde_json::from_str(r#"{"text": "The lab is quiet."}"#).unwrap();
        assert_eq!(response, NarrativeResponse::new("The lab is quiet."));
    }

    #[test]
    fn test_response_builder() {
        let response = NarrativeResponse::new("Elm hands you a Pokédex.")
            .at("Elm's Lab")
            .with_choice(Choice::new("c1", "Thank him"))
            .with_memory(MemoryRequest::new("promise", "Deliver the egg"));
        assert_eq!(response.location.as_deref(), Some("Elm's Lab"));
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.memories[0].kind, "promise");
    }
}
