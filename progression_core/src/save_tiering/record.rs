//! Stored save layout.
//!
//! A stored blob is one line of JSON ([`SaveHeader`]) followed by `\n` and
//! the payload bytes. The header says which tier the payload is and whether
//! it is gzip-compressed, so readers never have to guess.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use story_state::{GameState, PlayerId};
use uuid::Uuid;

use super::summary::SummarizedState;
use crate::error::{EngineError, Result};

/// Version written into every header.
pub const FORMAT_VERSION: u32 = 1;

const SAVES_ROOT: &str = "saves";

/// Unique identifier for a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SaveId(pub Uuid);

impl SaveId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SaveId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SaveId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SaveId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// How much of the game state a save keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveTier {
    /// The verbatim game state.
    Full,
    /// A size-capped summary; relationships and inventory are not kept.
    Summarized,
}

/// Metadata stored in front of every payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub format_version: u32,
    pub save_id: SaveId,
    pub player_id: PlayerId,
    pub save_name: String,
    pub created_at: DateTime<Utc>,
    pub tier: SaveTier,
    pub compressed: bool,
}

/// The state a save carries, per tier.
#[derive(Debug, Clone, PartialEq)]
pub enum SavePayload {
    Full(GameState),
    Summarized(SummarizedState),
}

impl SavePayload {
    pub fn tier(&self) -> SaveTier {
        match self {
            SavePayload::Full(_) => SaveTier::Full,
            SavePayload::Summarized(_) => SaveTier::Summarized,
        }
    }

    /// Serialize the payload body as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            SavePayload::Full(state) => serde_json::to_vec(state)?,
            SavePayload::Summarized(summary) => serde_json::to_vec(summary)?,
        };
        Ok(bytes)
    }

    /// Rebuild a game state. Summarized payloads come back without
    /// relationships or inventory.
    pub fn into_game_state(self) -> GameState {
        match self {
            SavePayload::Full(state) => state,
            SavePayload::Summarized(summary) => summary.expand(),
        }
    }
}

/// A decoded save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRecord {
    pub header: SaveHeader,
    pub payload: SavePayload,
}

/// Key prefix holding all saves of a player.
pub fn player_prefix(player_id: PlayerId) -> String {
    format!("{}/{}/", SAVES_ROOT, player_id)
}

/// Prefix holding every save.
pub fn all_saves_prefix() -> String {
    format!("{}/", SAVES_ROOT)
}

/// Storage key of one save.
pub fn record_key(player_id: PlayerId, save_id: SaveId) -> String {
    format!("{}{}", player_prefix(player_id), save_id)
}

/// Join a header and an already-encoded body into a stored blob.
pub fn frame(header: &SaveHeader, body: &[u8]) -> Result<Vec<u8>> {
    let mut blob = serde_json::to_vec(header)?;
    blob.reserve(body.len() + 1);
    blob.push(b'\n');
    blob.extend_from_slice(body);
    Ok(blob)
}

/// Split a stored blob into its header and body.
///
/// `key` only labels errors.
pub fn split<'a>(blob: &'a [u8], key: &str) -> Result<(SaveHeader, &'a [u8])> {
    let newline = blob
        .iter()
        .position(|b| *b == b'\n')
        .ok_or_else(|| corrupt(key, "missing header line"))?;
    let header: SaveHeader = serde_json::from_slice(&blob[..newline])
        .map_err(|e| corrupt(key, &format!("bad header: {}", e)))?;
    if header.format_version != FORMAT_VERSION {
        return Err(corrupt(
            key,
            &format!("unsupported format version {}", header.format_version),
        ));
    }
    Ok((header, &blob[newline + 1..]))
}

/// Decode a full record: header, decompression and payload.
pub fn decode(blob: &[u8], key: &str) -> Result<SaveRecord> {
    let (header, body) = split(blob, key)?;
    let label = header.save_id.to_string();

    let inflated;
    let json: &[u8] = if header.compressed {
        inflated = gunzip(body).map_err(|e| corrupt(&label, &format!("decompression failed: {}", e)))?;
        &inflated
    } else {
        body
    };

    let payload = match header.tier {
        SaveTier::Full => SavePayload::Full(
            serde_json::from_slice(json).map_err(|e| corrupt(&label, &format!("bad payload: {}", e)))?,
        ),
        SaveTier::Summarized => SavePayload::Summarized(
            serde_json::from_slice(json).map_err(|e| corrupt(&label, &format!("bad payload: {}", e)))?,
        ),
    };

    Ok(SaveRecord { header, payload })
}

/// Gzip `bytes`.
pub fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| EngineError::Serialization(format!("gzip failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| EngineError::Serialization(format!("gzip failed: {}", e)))
}

/// Reverse [`gzip`].
pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn corrupt(save_id: &str, reason: &str) -> EngineError {
    EngineError::CorruptSave {
        save_id: save_id.to_string(),
        reason: reason.to_string(),
    }
}
