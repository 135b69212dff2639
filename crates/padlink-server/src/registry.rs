//! Connection registry.
//!
//! Bidirectional mapping between live connections (session ids assigned by
//! the transport) and generated player identities, plus each player's
//! current room. Both directions are O(1): session → player for inbound
//! frames, player → session for relays and broadcasts.
//!
//! Unregistering a session removes both directions of the mapping; the
//! driver runs the leave-room protocol first so no room keeps referencing a
//! dead player.

use std::collections::HashMap;

use padlink_proto::{PlayerId, RoomCode};

/// Per-session registry entry.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Player identity generated at accept time, stable for the session.
    pub player_id: PlayerId,
    /// Code of the room this player is currently in, if any.
    pub room: Option<RoomCode>,
}

/// Registry of live connections and their player identities.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Session id → session info
    sessions: HashMap<u64, SessionInfo>,
    /// Player id → session id (reverse index)
    players: HashMap<PlayerId, u64>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session with its generated player identity.
    ///
    /// Returns `false` if the session id is already registered.
    pub fn register(&mut self, session_id: u64, player_id: PlayerId) -> bool {
        if self.sessions.contains_key(&session_id) {
            return false;
        }
        self.players.insert(player_id.clone(), session_id);
        self.sessions.insert(session_id, SessionInfo { player_id, room: None });
        true
    }

    /// Remove a session and both directions of its mapping.
    ///
    /// Returns the entry as it stood, including any room the player was
    /// still assigned to. Callers handle the leave protocol before this.
    pub fn unregister(&mut self, session_id: u64) -> Option<SessionInfo> {
        let info = self.sessions.remove(&session_id)?;
        self.players.remove(&info.player_id);
        Some(info)
    }

    /// Player identity for a session.
    pub fn player_of(&self, session_id: u64) -> Option<&PlayerId> {
        self.sessions.get(&session_id).map(|info| &info.player_id)
    }

    /// Session id for a player. `None` when the connection is gone.
    pub fn session_of(&self, player_id: &PlayerId) -> Option<u64> {
        self.players.get(player_id).copied()
    }

    /// Room code the session's player is currently in.
    pub fn room_of(&self, session_id: u64) -> Option<&RoomCode> {
        self.sessions.get(&session_id).and_then(|info| info.room.as_ref())
    }

    /// Assign the session's player to a room.
    ///
    /// Returns `false` if the session is unknown.
    pub fn set_room(&mut self, session_id: u64, code: RoomCode) -> bool {
        match self.sessions.get_mut(&session_id) {
            Some(info) => {
                info.room = Some(code);
                true
            },
            None => false,
        }
    }

    /// Clear the session's room assignment.
    pub fn clear_room(&mut self, session_id: u64) {
        if let Some(info) = self.sessions.get_mut(&session_id) {
            info.room = None;
        }
    }

    /// Clear a player's room assignment via the reverse index.
    ///
    /// Used by the reaper, which knows evicted members only by player id.
    pub fn clear_room_of_player(&mut self, player_id: &PlayerId) {
        if let Some(session_id) = self.players.get(player_id).copied() {
            self.clear_room(session_id);
        }
    }

    /// Whether a session is registered.
    pub fn has_session(&self, session_id: u64) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// All registered session ids.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.sessions.keys().copied()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
