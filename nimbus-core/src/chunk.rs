//! Chunk identifiers
//!
//! A chunk id is an opaque 128-bit value, hex-encoded to 32 characters, assigned
//! by the placement planner. Some call sites hand in the older `"{file_id}:{chunk_index}"`
//! form instead; [`parse_chunk_id`] accepts both so the rest of the system never has
//! to care which one it received.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque chunk identifier.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Generate a new random 128-bit chunk id, hex-encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::random();
        ChunkId(hex::encode(bytes))
    }

    /// Wrap an existing string as a chunk id without validation.
    ///
    /// Used when round-tripping ids that arrived over the wire or were read
    /// back from a durability snapshot.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        ChunkId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        ChunkId(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        ChunkId(s.to_string())
    }
}

/// Resolve a chunk id to its owning `(file_id, chunk_index)` when the id embeds
/// that information, falling back to treating the whole id as opaque.
///
/// Splits on the *last* `:`, and falls back to `(chunk_id, 0)` when there is
/// no colon or the suffix isn't a
/// valid chunk index. The planner never generates ids in the embedded form, but
/// externally supplied or legacy ids may use it, so every consumer of chunk ids
/// routes through this helper instead of re-implementing the split.
pub fn parse_chunk_id(chunk_id: &str) -> (String, u64) {
    match chunk_id.rsplit_once(':') {
        Some((file_id, idx)) => match idx.parse::<u64>() {
            Ok(idx) => (file_id.to_string(), idx),
            Err(_) => (chunk_id.to_string(), 0),
        },
        None => (chunk_id.to_string(), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let id = ChunkId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ChunkId::generate();
        let b = ChunkId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn parses_embedded_form() {
        assert_eq!(parse_chunk_id("f1:0"), ("f1".to_string(), 0));
        assert_eq!(parse_chunk_id("file-42:7"), ("file-42".to_string(), 7));
    }

    #[test]
    fn falls_back_to_opaque_for_random_hex() {
        let id = ChunkId::generate();
        let (file_id, idx) = parse_chunk_id(id.as_str());
        assert_eq!(file_id, id.as_str());
        assert_eq!(idx, 0);
    }

    #[test]
    fn falls_back_when_suffix_not_numeric() {
        assert_eq!(
            parse_chunk_id("no-colon-here"),
            ("no-colon-here".to_string(), 0)
        );
    }
}
