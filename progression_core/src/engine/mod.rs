//! Progression Engine - per-player sessions over the memory store, scene
//! history, context compressor and save service.
//!
//! Every operation on a player locks that player's session for its whole
//! duration, including any awaited storage or collaborator call, so
//! operations on one player run one at a time. Different players never
//! share a lock; the session registry lock is only held to look up an
//! entry and never across an `.await`.

mod session;

pub use session::*;

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use story_state::{GameState, MemoryId, MemoryKind, PlayerId};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use crate::collaborators::{NarrativeCollaborator, NarrativeRequest, RecalledMemory, VectorSearch};
use crate::config::EngineConfig;
use crate::context_compressor::{CompressedContext, ContextCompressor, ContextMode};
use crate::error::{EngineError, Result};
use crate::persistence::PersistenceAdapter;
use crate::save_tiering::{SaveConfirmation, SaveHeader, SaveId, SaveSummary, SaveTieringService};
use crate::scene_history::Scene;

type SessionHandle = Arc<AsyncMutex<PlayerSession>>;

/// Result of one [`ProgressionEngine::advance`] step.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    pub text: String,
    pub location: String,
    /// Tier of the context the narrative was generated from.
    pub mode: ContextMode,
    pub recorded: Vec<MemoryId>,
    pub rejected: Vec<RejectedMemory>,
    pub evicted_scenes: usize,
}

/// The engine facade.
pub struct ProgressionEngine {
    config: EngineConfig,
    compressor: ContextCompressor,
    saves: SaveTieringService,
    vector_search: Option<Arc<dyn VectorSearch>>,
    sessions: Mutex<HashMap<PlayerId, SessionHandle>>,
}

impl ProgressionEngine {
    /// Create an engine writing saves to `store`.
    pub fn new(config: EngineConfig, store: Arc<dyn PersistenceAdapter>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            compressor: ContextCompressor::new(config.context.clone()),
            saves: SaveTieringService::new(store, config.saves.clone()),
            vector_search: None,
            sessions: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Enable [`recall`](Self::recall).
    pub fn with_vector_search(mut self, search: Arc<dyn VectorSearch>) -> Self {
        self.vector_search = Some(search);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn saves(&self) -> &SaveTieringService {
        &self.saves
    }

    /// Begin a session from `state`, replacing any session the player had.
    ///
    /// An existing session is replaced under its lock, so operations
    /// already queued on it finish first.
    pub async fn start_session(&self, state: GameState) -> Result<PlayerId> {
        let player_id = state.player.id;
        let session = PlayerSession::from_state(state, &self.config)?;
        self.install(player_id, session).await;
        info!(player_id = %player_id, "session started");
        Ok(player_id)
    }

    /// Drop a player's session. Returns `false` if there was none.
    pub fn end_session(&self, player_id: PlayerId) -> bool {
        self.registry().remove(&player_id).is_some()
    }

    pub fn has_session(&self, player_id: PlayerId) -> bool {
        self.registry().contains_key(&player_id)
    }

    /// The player's current state.
    pub async fn snapshot(&self, player_id: PlayerId) -> Result<GameState> {
        let handle = self.session(player_id)?;
        let session = handle.lock().await;
        Ok(session.snapshot())
    }

    /// Append a scene. Returns how many old scenes were evicted.
    pub async fn add_scene(&self, player_id: PlayerId, scene: Scene) -> Result<usize> {
        let handle = self.session(player_id)?;
        let mut session = handle.lock().await;
        Ok(session.record_scene(scene))
    }

    /// Record a memory at the player's current location.
    pub async fn add_memory(
        &self,
        player_id: PlayerId,
        kind: MemoryKind,
        content: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Result<MemoryId> {
        let handle = self.session(player_id)?;
        let mut session = handle.lock().await;
        let location = session.current_location().to_string();
        session.memories_mut().add(kind, content, location, metadata)
    }

    /// Build the narrative context for the player's current location.
    pub async fn context(&self, player_id: PlayerId) -> Result<CompressedContext> {
        let handle = self.session(player_id)?;
        let session = handle.lock().await;
        Ok(self.context_for(&session))
    }

    /// Generate and record the next scene.
    ///
    /// `choice_id` must name one of the offered choices; its trait effects
    /// are applied once the collaborator has answered. If generation fails
    /// the session is left as it was.
    pub async fn advance(
        &self,
        player_id: PlayerId,
        narrator: &dyn NarrativeCollaborator,
        choice_id: Option<&str>,
    ) -> Result<AdvanceOutcome> {
        let handle = self.session(player_id)?;
        let mut session = handle.lock().await;

        let choice = match choice_id {
            Some(id) => Some(session.find_choice(id)?.clone()),
            None => None,
        };
        let context = self.context_for(&session);
        let mode = context.mode;
        let request = NarrativeRequest {
            player_id,
            player_name: session.player().name.clone(),
            context,
            personality_traits: session.player().personality_traits.clone(),
            recent_choice: choice.as_ref().map(|c| c.text.clone()),
            current_location: session.current_location().to_string(),
        };

        let response = narrator.generate(request).await?;
        if response.text.trim().is_empty() {
            return Err(EngineError::Collaborator(
                "narrative collaborator returned empty text".to_string(),
            ));
        }

        if let Some(choice) = &choice {
            session.take_choice(choice);
        }
        let text = response.text.clone();
        let applied = session.apply_narrative(response, choice.map(|c| c.text));

        debug!(
            player_id = %player_id,
            ?mode,
            recorded = applied.recorded.len(),
            rejected = applied.rejected.len(),
            "advanced story"
        );

        Ok(AdvanceOutcome {
            text,
            location: session.current_location().to_string(),
            mode,
            recorded: applied.recorded,
            rejected: applied.rejected,
            evicted_scenes: applied.evicted_scenes,
        })
    }

    /// Memories semantically related to `query`, via the vector search
    /// collaborator.
    pub async fn recall(
        &self,
        player_id: PlayerId,
        query: &str,
        k: usize,
    ) -> Result<Vec<RecalledMemory>> {
        let search = self.vector_search.as_ref().ok_or_else(|| {
            EngineError::Collaborator("no vector search configured".to_string())
        })?;
        let handle = self.session(player_id)?;
        let _session = handle.lock().await;
        search.search(player_id, query, k).await
    }

    /// Save the player's current state.
    pub async fn save(&self, player_id: PlayerId, save_name: &str) -> Result<SaveConfirmation> {
        let handle = self.session(player_id)?;
        let session = handle.lock().await;
        self.saves.save(&session.snapshot(), save_name).await
    }

    /// Replace the player's session with a stored save.
    ///
    /// Scene history is not saved, so it starts empty. On failure an
    /// existing session is untouched.
    pub async fn load(&self, player_id: PlayerId, save_id: SaveId) -> Result<SaveHeader> {
        let existing = self.registry().get(&player_id).cloned();
        match existing {
            Some(handle) => {
                let mut session = handle.lock().await;
                let (header, state) = self.saves.load_detailed(player_id, save_id).await?;
                *session = PlayerSession::from_state(state, &self.config)?;
                Ok(header)
            }
            None => {
                let (header, state) = self.saves.load_detailed(player_id, save_id).await?;
                let session = PlayerSession::from_state(state, &self.config)?;
                // A session may have been started while the save was read.
                self.install(player_id, session).await;
                Ok(header)
            }
        }
    }

    pub async fn list_saves(&self, player_id: PlayerId) -> Result<Vec<SaveSummary>> {
        self.saves.list_saves(player_id).await
    }

    pub async fn delete_save(&self, player_id: PlayerId, save_id: SaveId) -> Result<bool> {
        self.saves.delete_save(player_id, save_id).await
    }

    /// Make `session` the player's live session. An existing one is
    /// overwritten while holding its lock.
    async fn install(&self, player_id: PlayerId, session: PlayerSession) {
        loop {
            let handle = {
                let mut registry = self.registry();
                match registry.entry(player_id) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        entry.insert(Arc::new(AsyncMutex::new(session)));
                        return;
                    }
                }
            };

            let mut current = handle.lock().await;
            // Retry if the session was ended while waiting for the lock.
            let still_registered = self
                .registry()
                .get(&player_id)
                .map_or(false, |live| Arc::ptr_eq(live, &handle));
            if still_registered {
                *current = session;
                return;
            }
        }
    }

    fn context_for(&self, session: &PlayerSession) -> CompressedContext {
        self.compressor.compress(
            session.history(),
            session.memories(),
            Some(session.current_location()),
        )
    }

    fn session(&self, player_id: PlayerId) -> Result<SessionHandle> {
        self.registry()
            .get(&player_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("no session for player {}", player_id)))
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
