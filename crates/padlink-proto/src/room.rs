//! Room and player wire model.
//!
//! These structs are the snapshots embedded in server frames
//! (`room-created`, `player-joined`, ...). They serialize with camelCase
//! field names to match the client protocol.

use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// Maximum players per room. One per controller port.
pub const MAX_PLAYERS: usize = 4;

/// Opaque, process-wide unique player identity.
///
/// Generated when a connection is accepted and stable for that connection's
/// lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Build an id from raw random bytes (hex-encoded with a fixed prefix).
    pub fn from_random_bytes(bytes: &[u8; 8]) -> Self {
        use std::fmt::Write as _;
        let mut id = String::with_capacity(7 + bytes.len() * 2);
        id.push_str("player-");
        for b in bytes {
            // Writing hex into a String cannot fail.
            let _ = write!(id, "{b:02x}");
        }
        Self(id)
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player role within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    /// May start the game; receives all forwarded game input.
    Host,
    /// Everyone else.
    Guest,
}

/// Room state machine: `waiting` at creation, `playing` after a host-issued
/// start. There is no transition back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    /// Lobby phase; players may still join.
    Waiting,
    /// Game started.
    Playing,
}

/// A player as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Opaque unique id.
    pub id: PlayerId,
    /// Display name.
    pub name: String,
    /// Host or guest.
    pub role: PlayerRole,
    /// Controller port, 1..=4. Pairwise distinct within a room.
    pub port: u8,
    /// Whether the player's connection is open.
    pub connected: bool,
}

/// A room snapshot as seen on the wire.
///
/// `players` preserves insertion (join) order; host migration promotes the
/// first remaining player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Six-character room code.
    pub code: RoomCode,
    /// Id of the current host. Always matches exactly one player in
    /// `players` whose role is `host`.
    pub host_id: PlayerId,
    /// Optional game metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// Optional game metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_name: Option<String>,
    /// Players in join order, 1..=4 entries.
    pub players: Vec<Player>,
    /// Creation time, wall-clock milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Lifecycle state.
    pub state: RoomState,
}

impl Room {
    /// Look up a member by id.
    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    /// Whether `id` is a member of this room.
    pub fn has_player(&self, id: &PlayerId) -> bool {
        self.player(id).is_some()
    }

    /// Room is at capacity.
    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }
}
