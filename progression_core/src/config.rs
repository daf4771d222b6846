//! Engine configuration.
//!
//! Every component receives its own section at construction. Defaults match
//! the documented limits; a TOML file only needs the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};

/// Scene history limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of scenes kept; the oldest is evicted first.
    pub max_history_length: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_history_length: 20,
        }
    }
}

/// Memory store retention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Keep at most this many memories (oldest inserted dropped first).
    /// `None` keeps everything.
    pub max_retained: Option<usize>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_retained: Some(100),
        }
    }
}

/// Context compression limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Histories longer than this use the compressed tier.
    pub long_story_threshold: usize,

    /// Scenes included verbatim in the standard tier.
    pub standard_scene_window: usize,

    /// Promises and relationships included per kind in the standard tier.
    pub standard_per_kind: usize,

    /// Location memories included in the standard tier.
    pub standard_location_slice: usize,

    /// Promises included in the compressed tier.
    pub compressed_promises: usize,

    /// Relationships included in the compressed tier.
    pub compressed_relationships: usize,

    /// Location memories included in the compressed tier.
    pub compressed_location_slice: usize,

    /// Per-item character cap in the compressed tier.
    pub item_max_chars: usize,

    /// Character cap of the compressed summary string.
    pub max_summary_length: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            long_story_threshold: 10,
            standard_scene_window: 5,
            standard_per_kind: 5,
            standard_location_slice: 3,
            compressed_promises: 3,
            compressed_relationships: 2,
            compressed_location_slice: 2,
            item_max_chars: 50,
            max_summary_length: 500,
        }
    }
}

/// Save tiering thresholds and caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// States estimated above this size are saved summarized.
    pub summarize_threshold_bytes: usize,

    /// Payloads above this size are gzip-compressed.
    pub compress_threshold_bytes: usize,

    /// Memories kept by a summarized save.
    pub max_memories: usize,

    /// Character cap of each memory in a summarized save.
    pub memory_max_chars: usize,

    /// Completed events kept by a summarized save.
    pub recent_events: usize,

    /// Choices kept by a summarized save.
    pub max_choices: usize,

    /// Character cap of the story text in a summarized save.
    pub story_preview_chars: usize,

    /// Character cap of the one-line story summary.
    pub max_summary_length: usize,

    /// Saves retained per player; the oldest is evicted first.
    pub max_saves_per_player: usize,

    /// Timeout applied to each save or load, in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            summarize_threshold_bytes: 100 * 1024,
            compress_threshold_bytes: 50 * 1024,
            max_memories: 50,
            memory_max_chars: 100,
            recent_events: 5,
            max_choices: 10,
            story_preview_chars: 200,
            max_summary_length: 500,
            max_saves_per_player: 10,
            io_timeout_ms: 5_000,
        }
    }
}

impl SaveConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Configuration for the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub history: HistoryConfig,
    pub memory: MemoryConfig,
    pub context: ContextConfig,
    pub saves: SaveConfig,
}

impl EngineConfig {
    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Reject limits that would make a component unusable.
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("history.max_history_length", self.history.max_history_length),
            ("context.max_summary_length", self.context.max_summary_length),
            ("saves.max_memories", self.saves.max_memories),
            ("saves.memory_max_chars", self.saves.memory_max_chars),
            ("saves.max_saves_per_player", self.saves.max_saves_per_player),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(EngineError::Config(format!("{} must be greater than 0", name)));
            }
        }
        if self.memory.max_retained == Some(0) {
            return Err(EngineError::Config(
                "memory.max_retained must be greater than 0".to_string(),
            ));
        }
        if self.saves.io_timeout_ms == 0 {
            return Err(EngineError::Config(
                "saves.io_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
