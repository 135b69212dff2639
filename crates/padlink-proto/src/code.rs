//! Room codes.
//!
//! A room code is exactly six characters drawn from a 32-symbol alphabet
//! that omits visually ambiguous glyphs (no `0`/`O`, no `1`/`I`). Codes are
//! stored uppercase; lookups are case-insensitive because players type them
//! by hand.

use serde::{Deserialize, Serialize};

/// Alphabet for room codes. 32 symbols, no `0`/`O` and no `1`/`I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room code in characters.
pub const CODE_LEN: usize = 6;

/// A six-character room code, always stored uppercase.
///
/// Uniqueness among live rooms is the room store's responsibility; this type
/// only guarantees the normalized representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Build a code from raw random bytes, one alphabet symbol per byte.
    ///
    /// Each byte indexes the alphabet modulo its length, so callers provide
    /// exactly [`CODE_LEN`] bytes of entropy from their environment.
    pub fn from_random_bytes(bytes: &[u8; CODE_LEN]) -> Self {
        let code = bytes
            .iter()
            .map(|&b| char::from(CODE_ALPHABET[usize::from(b) % CODE_ALPHABET.len()]))
            .collect();
        Self(code)
    }

    /// Normalize client-supplied input for lookup (uppercased).
    pub fn normalize(input: &str) -> Self {
        Self(input.to_ascii_uppercase())
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
