//! Room store.
//!
//! Owns every live room and exposes the atomic lifecycle operations:
//! create, join, leave (with host migration), start, and the stale-room
//! sweep. All methods are synchronous and run to completion, so every
//! operation - including host migration plus the full port renumbering it
//! triggers - is observed as a single state transition by anyone reading
//! the snapshots it returns.
//!
//! The store does not know about connections. "Is this player already in a
//! room" is the connection registry's question; the store is handed player
//! ids and room codes and keeps the room invariants:
//!
//! - codes unique among live rooms, 1..=4 players per room
//! - ports pairwise distinct, each in {1,2,3,4}
//! - exactly one host, and `host_id` names them
//! - empty rooms are removed immediately, never stored

use std::collections::HashMap;

use padlink_proto::{CODE_LEN, MAX_PLAYERS, Player, PlayerId, PlayerRole, Room, RoomCode, RoomState};

use crate::env::Environment;

/// Errors from room store operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this code.
    #[error("room not found: {0}")]
    RoomNotFound(RoomCode),

    /// The room already has four players.
    #[error("room is full: {0}")]
    RoomFull(RoomCode),

    /// Only the host may start the game.
    #[error("player {player} is not the host of {code}")]
    NotHost {
        /// Room in question.
        code: RoomCode,
        /// The non-host sender.
        player: PlayerId,
    },

    /// No free controller port despite the room not being full.
    ///
    /// Unreachable while the invariants hold; surfaced as an error instead
    /// of a panic so a violation degrades to a rejected join.
    #[error("no available controller ports in {0}")]
    PortsExhausted(RoomCode),
}

/// Result of removing a player from their room.
#[derive(Debug, Clone)]
pub enum LeaveOutcome {
    /// The room no longer existed (already swept). Nothing to broadcast.
    RoomGone,

    /// The departing player was the last one; the room was deleted.
    Deleted {
        /// Code of the deleted room.
        code: RoomCode,
    },

    /// The room survives.
    Departed {
        /// Snapshot after the departure (and any host migration).
        room: Room,
        /// The player that left, as last seen. `None` if they were somehow
        /// not on the member list.
        departed: Option<Player>,
        /// Host identity changed; callers must broadcast the whole updated
        /// room before the departure notice.
        host_changed: bool,
    },
}

/// Owns all live rooms, keyed by code.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomCode, Room>,
}

impl RoomStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with `host` as its sole player at port 1.
    ///
    /// The generated code is unique against currently live codes (retry on
    /// collision). Returns the stored room snapshot and the host entry.
    pub fn create_room<E: Environment>(
        &mut self,
        host: PlayerId,
        player_name: Option<String>,
        game_id: Option<String>,
        game_name: Option<String>,
        env: &E,
    ) -> (Room, Player) {
        let code = self.generate_code(env);

        let player = Player {
            id: host.clone(),
            name: player_name.filter(|n| !n.is_empty()).unwrap_or_else(|| "Host".to_string()),
            role: PlayerRole::Host,
            port: 1,
            connected: true,
        };

        let room = Room {
            code: code.clone(),
            host_id: host,
            game_id,
            game_name,
            players: vec![player.clone()],
            created_at: env.wall_clock_millis(),
            state: RoomState::Waiting,
        };

        self.rooms.insert(code, room.clone());
        (room, player)
    }

    /// Join the room whose code matches `code_input` (case-insensitive).
    ///
    /// Assigns the lowest unused port and a `guest` role; a missing or
    /// empty name defaults to "Guest". Returns the room snapshot and the
    /// new player entry.
    pub fn join_room(
        &mut self,
        code_input: &str,
        player_id: PlayerId,
        player_name: Option<String>,
    ) -> Result<(Room, Player), RoomError> {
        let code = RoomCode::normalize(code_input);
        let room = self.rooms.get_mut(&code).ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        if room.is_full() {
            return Err(RoomError::RoomFull(code));
        }
        let Some(port) = lowest_free_port(room) else {
            return Err(RoomError::PortsExhausted(code));
        };

        let player = Player {
            id: player_id,
            name: player_name.filter(|n| !n.is_empty()).unwrap_or_else(|| "Guest".to_string()),
            role: PlayerRole::Guest,
            port,
            connected: true,
        };

        room.players.push(player.clone());
        Ok((room.clone(), player))
    }

    /// Remove `player` from the room with `code`.
    ///
    /// If the room becomes empty it is deleted. If the departing player was
    /// host, the first remaining player (in join order) is promoted and all
    /// remaining ports are renumbered contiguously from 1 - a full
    /// re-assignment, so callers broadcast the entire room, not a delta.
    pub fn leave_room(&mut self, code: &RoomCode, player: &PlayerId) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(code) else {
            return LeaveOutcome::RoomGone;
        };

        let was_host = room.host_id == *player;
        let departed = room.player(player).cloned();
        room.players.retain(|p| p.id != *player);

        if room.players.is_empty() {
            self.rooms.remove(code);
            return LeaveOutcome::Deleted { code: code.clone() };
        }

        if was_host {
            if let Some(new_host) = room.players.first_mut() {
                new_host.role = PlayerRole::Host;
                room.host_id = new_host.id.clone();
            }
            for (i, p) in room.players.iter_mut().enumerate() {
                p.port = i as u8 + 1;
            }
        }

        LeaveOutcome::Departed { room: room.clone(), departed, host_changed: was_host }
    }

    /// Transition the room to `playing` and update its game metadata.
    ///
    /// Starting while already `playing` is permitted; the state stays
    /// `playing` and only the metadata changes. Returns the snapshot for
    /// the `game-started` broadcast.
    pub fn start_game(
        &mut self,
        code: &RoomCode,
        sender: &PlayerId,
        game_id: Option<String>,
        game_name: Option<String>,
    ) -> Result<Room, RoomError> {
        let room = self.rooms.get_mut(code).ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;

        if room.host_id != *sender {
            return Err(RoomError::NotHost { code: code.clone(), player: sender.clone() });
        }

        room.state = RoomState::Playing;
        room.game_id = game_id;
        room.game_name = game_name;
        Ok(room.clone())
    }

    /// Evict every room whose age since creation exceeds `timeout_ms`.
    ///
    /// Age is measured from creation, not last activity, so an actively
    /// playing room is evicted like any other. Returns the evicted rooms so
    /// the caller can clear membership mappings.
    pub fn reap_stale(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<Room> {
        let stale: Vec<RoomCode> = self
            .rooms
            .values()
            .filter(|room| now_ms.saturating_sub(room.created_at) > timeout_ms)
            .map(|room| room.code.clone())
            .collect();

        stale.iter().filter_map(|code| self.rooms.remove(code)).collect()
    }

    /// Look up a room by code.
    pub fn room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    /// Number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Iterate over all live rooms.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Generate a code that is unique among live rooms.
    fn generate_code<E: Environment>(&self, env: &E) -> RoomCode {
        loop {
            let code = RoomCode::from_random_bytes(&env.random_array::<CODE_LEN>());
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

/// Lowest unused controller port in {1,2,3,4}.
fn lowest_free_port(room: &Room) -> Option<u8> {
    (1..=MAX_PLAYERS as u8).find(|port| room.players.iter().all(|p| p.port != *port))
}
