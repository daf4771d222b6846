//! Save Tiering Service - persists game states within a size budget.
//!
//! A save runs these steps in order:
//! 1. **Estimate** the JSON size of the state ([`estimate()`])
//! 2. **Select a tier**: above `summarize_threshold_bytes` the state is
//!    replaced by a [`SummarizedState`]
//! 3. **Compress** the encoded payload with gzip above
//!    `compress_threshold_bytes`
//! 4. **Write** the framed record under `saves/{player_id}/{save_id}`
//! 5. **Enforce the cap**: the player's oldest saves beyond
//!    `max_saves_per_player` are deleted
//!
//! The cap is only enforced after a successful write, so a failed save
//! leaves every earlier record in place. Each storage call is bounded by
//! `io_timeout_ms`.

mod estimate;
mod record;
mod summary;

pub use estimate::*;
pub use record::{
    all_saves_prefix, player_prefix, record_key, SaveHeader, SaveId, SavePayload, SaveRecord,
    SaveTier, FORMAT_VERSION,
};
pub use summary::*;

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use story_state::{GameState, PlayerId};
use tracing::{debug, info, warn};

use crate::config::SaveConfig;
use crate::error::{EngineError, Result};
use crate::persistence::{ObjectInfo, PersistenceAdapter, StorageError};

/// What a successful save reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveConfirmation {
    pub save_id: SaveId,
    pub save_name: String,
    pub created_at: DateTime<Utc>,
    /// `Summarized` means relationships and inventory were not kept.
    pub tier: SaveTier,
    pub compressed: bool,
    /// Bytes written, header included.
    pub stored_bytes: usize,
    pub estimate: SizeEstimate,
    /// Older saves deleted to respect the per-player cap.
    pub evicted: Vec<SaveId>,
}

/// One entry of a save listing, read from the record header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub save_id: SaveId,
    pub save_name: String,
    pub created_at: DateTime<Utc>,
    pub tier: SaveTier,
    pub compressed: bool,
    pub stored_bytes: u64,
}

/// Aggregate figures over every stored save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveStats {
    pub total_saves: usize,
    pub players: usize,
    pub full_saves: usize,
    pub summarized_saves: usize,
    pub compressed_saves: usize,
    pub total_bytes: u64,
    pub largest_bytes: u64,
}

/// Writes, reads and prunes saves through a [`PersistenceAdapter`].
pub struct SaveTieringService {
    store: Arc<dyn PersistenceAdapter>,
    config: SaveConfig,
    last_created: Mutex<Option<DateTime<Utc>>>,
}

impl SaveTieringService {
    pub fn new(store: Arc<dyn PersistenceAdapter>, config: SaveConfig) -> Self {
        Self {
            store,
            config,
            last_created: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SaveConfig {
        &self.config
    }

    /// Persist `state` as a new save named `save_name`.
    ///
    /// On [`EngineError::Timeout`] the write may still finish in the
    /// background. The record is then complete and is counted against the
    /// cap by the player's next save; it is never visible half-written.
    pub async fn save(&self, state: &GameState, save_name: &str) -> Result<SaveConfirmation> {
        let save_name = save_name.trim();
        if save_name.is_empty() {
            return Err(EngineError::Validation("save name must not be empty".to_string()));
        }

        let estimate = estimate(state, &self.config)?;
        let payload = if estimate.should_summarize {
            SavePayload::Summarized(SummarizedState::from_state(state, &self.config))
        } else {
            SavePayload::Full(state.clone())
        };
        let tier = payload.tier();

        let json = payload.to_json()?;
        let compressed = json.len() > self.config.compress_threshold_bytes;
        let body = if compressed { record::gzip(&json)? } else { json };

        let player_id = state.player.id;
        let header = SaveHeader {
            format_version: FORMAT_VERSION,
            save_id: SaveId::new(),
            player_id,
            save_name: save_name.to_string(),
            created_at: self.next_created_at(),
            tier,
            compressed,
        };
        let blob = record::frame(&header, &body)?;
        let stored_bytes = blob.len();
        let key = record_key(player_id, header.save_id);

        self.bounded("save", async {
            self.store.put(&key, blob).await.map_err(EngineError::from)
        })
        .await?;

        let evicted = match self.bounded("enforce_cap", self.enforce_cap(player_id)).await {
            Ok(evicted) => evicted,
            Err(err) => {
                warn!(player_id = %player_id, error = %err, "save cap enforcement failed");
                Vec::new()
            }
        };

        info!(
            player_id = %player_id,
            save_id = %header.save_id,
            tier = ?tier,
            compressed,
            stored_bytes,
            estimated_bytes = estimate.total_bytes,
            evicted = evicted.len(),
            "save written"
        );

        Ok(SaveConfirmation {
            save_id: header.save_id,
            save_name: header.save_name,
            created_at: header.created_at,
            tier,
            compressed,
            stored_bytes,
            estimate,
            evicted,
        })
    }

    /// Load a save as a game state.
    ///
    /// A `Summarized` save comes back with no relationships and an empty
    /// inventory.
    pub async fn load(&self, player_id: PlayerId, save_id: SaveId) -> Result<GameState> {
        Ok(self.load_detailed(player_id, save_id).await?.1)
    }

    /// Like [`load`](Self::load), also returning the record header.
    pub async fn load_detailed(
        &self,
        player_id: PlayerId,
        save_id: SaveId,
    ) -> Result<(SaveHeader, GameState)> {
        let key = record_key(player_id, save_id);
        let blob = self
            .bounded("load", async { self.store.get(&key).await.map_err(EngineError::from) })
            .await?;

        let record = record::decode(&blob, &key)?;
        if record.header.player_id != player_id || record.header.save_id != save_id {
            return Err(EngineError::NotFound(format!(
                "save {} for player {}",
                save_id, player_id
            )));
        }

        info!(
            player_id = %player_id,
            save_id = %save_id,
            tier = ?record.header.tier,
            "save loaded"
        );
        Ok((record.header, record.payload.into_game_state()))
    }

    /// The player's saves, newest first. Unreadable records are skipped.
    pub async fn list_saves(&self, player_id: PlayerId) -> Result<Vec<SaveSummary>> {
        let entries = self
            .bounded("list_saves", self.read_headers(&player_prefix(player_id)))
            .await?;
        Ok(entries
            .into_iter()
            .map(|(header, info)| SaveSummary {
                save_id: header.save_id,
                save_name: header.save_name,
                created_at: header.created_at,
                tier: header.tier,
                compressed: header.compressed,
                stored_bytes: info.size_bytes,
            })
            .collect())
    }

    /// Delete one save. Returns `false` if it did not exist.
    pub async fn delete_save(&self, player_id: PlayerId, save_id: SaveId) -> Result<bool> {
        let key = record_key(player_id, save_id);
        let removed = self
            .bounded("delete_save", async {
                self.store.delete(&key).await.map_err(EngineError::from)
            })
            .await?;
        if removed {
            info!(player_id = %player_id, save_id = %save_id, "save deleted");
        }
        Ok(removed)
    }

    /// Totals across every player's saves.
    pub async fn stats(&self) -> Result<SaveStats> {
        let entries = self
            .bounded("stats", self.read_headers(&all_saves_prefix()))
            .await?;

        let mut stats = SaveStats::default();
        let mut players = BTreeSet::new();
        for (header, info) in &entries {
            players.insert(header.player_id);
            stats.total_saves += 1;
            match header.tier {
                SaveTier::Full => stats.full_saves += 1,
                SaveTier::Summarized => stats.summarized_saves += 1,
            }
            if header.compressed {
                stats.compressed_saves += 1;
            }
            stats.total_bytes += info.size_bytes;
            stats.largest_bytes = stats.largest_bytes.max(info.size_bytes);
        }
        stats.players = players.len();
        Ok(stats)
    }

    /// Delete the player's oldest saves beyond the cap.
    async fn enforce_cap(&self, player_id: PlayerId) -> Result<Vec<SaveId>> {
        let entries = self.read_headers(&player_prefix(player_id)).await?;
        let mut evicted = Vec::new();

        for (header, info) in entries.into_iter().skip(self.config.max_saves_per_player) {
            match self.store.delete(&info.key).await {
                Ok(_) => {
                    debug!(player_id = %player_id, save_id = %header.save_id, "evicted old save");
                    evicted.push(header.save_id);
                }
                Err(err) => {
                    warn!(
                        player_id = %player_id,
                        save_id = %header.save_id,
                        error = %err,
                        "failed to evict old save"
                    );
                }
            }
        }
        Ok(evicted)
    }

    /// Headers of every record under `prefix`, newest first.
    async fn read_headers(&self, prefix: &str) -> Result<Vec<(SaveHeader, ObjectInfo)>> {
        let mut entries = Vec::new();
        for info in self.store.list(prefix).await? {
            // Keys can vanish between listing and reading when a concurrent
            // save evicts them.
            let blob = match self.store.get(&info.key).await {
                Ok(blob) => blob,
                Err(StorageError::NotFound { .. }) => {
                    debug!(key = %info.key, "save vanished while listing");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            match record::split(&blob, &info.key) {
                Ok((header, _)) => entries.push((header, info)),
                Err(err) => warn!(key = %info.key, error = %err, "skipping unreadable save"),
            }
        }
        entries.sort_by(|(a, ak), (b, bk)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| bk.key.cmp(&ak.key))
        });
        Ok(entries)
    }

    /// Run `operation` under the configured I/O timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.io_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout {
                operation,
                timeout_ms: self.config.io_timeout_ms,
            }),
        }
    }

    /// Wall-clock time, nudged forward so it is strictly increasing.
    fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self
            .last_created
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut now = Utc::now();
        if let Some(previous) = *last {
            if now <= previous {
                now = previous + chrono::Duration::microseconds(1);
            }
        }
        *last = Some(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryAdapter, StorageResult};
    use async_trait::async_trait;
    use story_state::{GameProgression, Memory, MemoryKind, Player, Story};

    /// Lists one key that can no longer be read, as after a concurrent
    /// eviction.
    struct VanishingKey {
        inner: InMemoryAdapter,
    }

    #[async_trait]
    impl PersistenceAdapter for VanishingKey {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()> {
            self.inner.put(key, bytes).await
        }

        async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.inner.get(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<bool> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
            let mut listed = self.inner.list(prefix).await?;
            listed.push(ObjectInfo {
                key: format!("{}zzzz-evicted", prefix),
                size_bytes: 10,
            });
            Ok(listed)
        }
    }

    fn service(config: SaveConfig) -> (Arc<InMemoryAdapter>, SaveTieringService) {
        let store = Arc::new(InMemoryAdapter::new());
        let service = SaveTieringService::new(store.clone(), config);
        (store, service)
    }

    fn state() -> GameState {
        let mut progression = GameProgression::new("Cerulean City");
        progression.complete_event("Beat Misty");
        progression.record_relationship("Misty", "rival");
        progression.add_item("Cascade Badge");

        let mut state = GameState::new(
            Player::new("Ash").with_trait("loyalty", 7),
            Story::new("s2", "Cerulean Gym", "The pool glitters.", "Cerulean City"),
            progression,
        );
        state.memories.push(
            Memory::new(MemoryKind::Promise, "Return the bike", "Cerulean City")
                .unwrap()
                .with_meta("to", "Misty"),
        );
        state
    }

    fn with_memories(mut state: GameState, count: usize, chars: usize) -> GameState {
        for i in 0..count {
            state.memories.push(
                Memory::new(MemoryKind::Event, format!("{} {}", i, "x".repeat(chars)), "Route 4")
                    .unwrap(),
            );
        }
        state
    }

    #[tokio::test]
    async fn test_small_state_round_trips() {
        let (_, service) = service(SaveConfig::default());
        let state = state();

        let confirmation = service.save(&state, "before gym").await.unwrap();
        assert_eq!(confirmation.tier, SaveTier::Full);
        assert!(!confirmation.compressed);
        assert!(confirmation.evicted.is_empty());

        let loaded = service.load(state.player.id, confirmation.save_id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_mid_size_state_is_compressed_but_full() {
        let (_, service) = service(SaveConfig::default());
        let state = with_memories(state(), 60, 1_000);

        let confirmation = service.save(&state, "mid").await.unwrap();
        assert_eq!(confirmation.tier, SaveTier::Full);
        assert!(confirmation.compressed);
        assert!(confirmation.stored_bytes < confirmation.estimate.total_bytes);

        let loaded = service.load(state.player.id, confirmation.save_id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_large_state_is_summarized() {
        let (_, service) = service(SaveConfig::default());
        let state = with_memories(state(), 120, 1_000);

        let confirmation = service.save(&state, "late game").await.unwrap();
        assert_eq!(confirmation.tier, SaveTier::Summarized);
        assert!(confirmation.estimate.should_summarize);

        let (header, loaded) = service
            .load_detailed(state.player.id, confirmation.save_id)
            .await
            .unwrap();
        assert_eq!(header.tier, SaveTier::Summarized);
        assert!(loaded.progression.relationships.is_empty());
        assert!(loaded.progression.inventory.is_empty());
        assert!(loaded.memories.len() <= 50);
        assert_eq!(loaded.memories[0].kind(), MemoryKind::Promise);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let (store, service) = service(SaveConfig::default());
        let err = service.save(&state(), "   ").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cap_evicts_oldest() {
        let config = SaveConfig {
            max_saves_per_player: 3,
            ..SaveConfig::default()
        };
        let (_, service) = service(config);
        let state = state();

        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(service.save(&state, &format!("slot {}", i)).await.unwrap());
        }

        assert_eq!(ids[3].evicted, vec![ids[0].save_id]);
        assert_eq!(ids[4].evicted, vec![ids[1].save_id]);

        let listed: Vec<SaveId> = service
            .list_saves(state.player.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.save_id)
            .collect();
        assert_eq!(listed, vec![ids[4].save_id, ids[3].save_id, ids[2].save_id]);
    }

    #[tokio::test]
    async fn test_created_at_strictly_increases() {
        let (_, service) = service(SaveConfig::default());
        let state = state();
        let first = service.save(&state, "a").await.unwrap();
        let second = service.save(&state, "b").await.unwrap();
        assert!(second.created_at > first.created_at);
    }

    #[tokio::test]
    async fn test_other_player_cannot_load() {
        let (_, service) = service(SaveConfig::default());
        let confirmation = service.save(&state(), "mine").await.unwrap();

        let err = service.load(PlayerId::new(), confirmation.save_id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_save_not_found() {
        let (_, service) = service(SaveConfig::default());
        let err = service.load(PlayerId::new(), SaveId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_save() {
        let (_, service) = service(SaveConfig::default());
        let state = state();
        let confirmation = service.save(&state, "temp").await.unwrap();

        assert!(service.delete_save(state.player.id, confirmation.save_id).await.unwrap());
        assert!(!service.delete_save(state.player.id, confirmation.save_id).await.unwrap());
        assert!(service.list_saves(state.player.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stats() {
        let (store, service) = service(SaveConfig::default());
        service.save(&state(), "one").await.unwrap();
        service.save(&with_memories(state(), 120, 1_000), "two").await.unwrap();
        service.save(&state(), "three").await.unwrap();
        store.put("saves/garbage/entry", b"not a save".to_vec()).await.unwrap();

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.total_saves, 3);
        assert_eq!(stats.players, 3);
        assert_eq!(stats.full_saves, 2);
        assert_eq!(stats.summarized_saves, 1);
        assert!(stats.largest_bytes <= stats.total_bytes);
    }

    #[tokio::test]
    async fn test_listing_skips_keys_evicted_concurrently() {
        let store = Arc::new(VanishingKey {
            inner: InMemoryAdapter::new(),
        });
        let service = SaveTieringService::new(store, SaveConfig::default());
        let state = state();

        let confirmation = service.save(&state, "kept").await.unwrap();
        assert!(confirmation.evicted.is_empty());

        let listed = service.list_saves(state.player.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].save_id, confirmation.save_id);
        assert_eq!(service.stats().await.unwrap().total_saves, 1);
    }
}
