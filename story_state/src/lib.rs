//! # Story State
//!
//! The data model of a playthrough - players, story segments, choices,
//! typed memories and progression. This crate is the single source of truth
//! for what a saved game contains and does not perform any I/O or logging.

pub mod entities;
pub mod error;
pub mod game_state;
pub mod memory;

pub use entities::*;
pub use error::*;
pub use game_state::*;
pub use memory::*;
