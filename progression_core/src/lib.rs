//! # Progression Core
//!
//! The engine that keeps a story's memory bounded. It records scenes and
//! typed memories as play advances, condenses them into a size-bounded
//! context for the narrative service, and persists game state through a
//! tiered save format.
//!
//! ## Core Components
//!
//! - **memory_store**: Typed, append-only memory log with bounded retention
//! - **scene_history**: Bounded FIFO of visited scenes
//! - **context_compressor**: Priority ranking and the standard/compressed context tiers
//! - **save_tiering**: Size estimation, summarization, gzip and per-player save caps
//! - **persistence**: Blob-store contract with in-memory and filesystem adapters
//! - **engine**: Per-player serialized sessions tying it all together
//! - **collaborators**: Narrative generation and vector-search interfaces
//!
//! ## Design Philosophy
//!
//! - **Bounded**: Every collection that grows with play has a cap and an eviction rule
//! - **Deterministic**: Ranking and compression are pure functions of their inputs
//! - **Explicit**: Configuration is passed in, lossy steps are reported to the caller

pub mod collaborators;
pub mod config;
pub mod context_compressor;
pub mod engine;
pub mod error;
pub mod memory_store;
pub mod persistence;
pub mod save_tiering;
pub mod scene_history;
pub mod telemetry;

pub use collaborators::*;
pub use config::*;
pub use context_compressor::*;
pub use engine::*;
pub use error::*;
pub use memory_store::*;
pub use persistence::{FsAdapter, InMemoryAdapter, ObjectInfo, PersistenceAdapter, StorageError};
pub use save_tiering::*;
pub use scene_history::*;
