//! Session driver.
//!
//! Ties together the RoomStore (room membership and lifecycle), the
//! ConnectionRegistry (session-to-player mapping), and message routing. The
//! driver is sans-IO: it consumes [`ServerEvent`]s and emits [`ServerAction`]s
//! for the runtime to execute, which keeps every routing decision
//! deterministic and testable without sockets.

use std::time::Duration;

use padlink_core::{Environment, LeaveOutcome, RoomError, RoomStore};
use padlink_proto::{ClientMessage, DecodeError, PlayerId, RoomCode, ServerMessage, SignalPayload};
use serde_json::Value;

use crate::{error::DriverError, registry::ConnectionRegistry};

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Age at which a room is evicted, measured from creation.
    pub room_timeout: Duration,
    /// Interval between reaper sweeps.
    pub reap_interval: Duration,
    /// Interval between keepalive probes.
    pub keepalive_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            room_timeout: Duration::from_secs(60 * 60),
            reap_interval: Duration::from_secs(5 * 60),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Events that the session driver processes.
///
/// These are produced by the external runtime (tests or production).
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new connection was accepted.
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime.
        session_id: u64,
    },

    /// A text frame was received from a connection.
    FrameReceived {
        /// Connection that sent the frame.
        session_id: u64,
        /// Raw frame contents.
        text: String,
    },

    /// A connection was closed (by peer or error).
    ConnectionClosed {
        /// Connection that was closed.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Periodic tick for stale-room eviction.
    ReaperTick,

    /// Periodic tick for connection liveness probes.
    KeepaliveTick,
}

/// Actions that the session driver produces.
///
/// These are executed by runtime-specific code (production or tests).
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a message to a specific session.
    SendToSession {
        /// Target session ID.
        session_id: u64,
        /// Message to send.
        message: ServerMessage,
    },

    /// Broadcast a message to every connected member of a room.
    BroadcastToRoom {
        /// Target room code.
        code: RoomCode,
        /// Message to broadcast.
        message: ServerMessage,
        /// Optional session to exclude from the broadcast.
        exclude: Option<u64>,
    },

    /// Probe a session for liveness (transport-level ping).
    ProbeSession {
        /// Session to probe.
        session_id: u64,
    },

    /// Close a connection.
    CloseConnection {
        /// Session to close.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message (for debugging/monitoring).
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for server actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Action-based session driver.
///
/// Orchestrates connection lifecycle, room membership, and message routing.
pub struct ServerDriver<E: Environment> {
    /// Session/player registry.
    registry: ConnectionRegistry,
    /// Room membership and lifecycle.
    rooms: RoomStore,
    /// Environment (time, RNG).
    env: E,
    /// Driver configuration.
    config: DriverConfig,
}

impl<E: Environment> ServerDriver<E> {
    /// Create a new session driver.
    pub fn new(env: E, config: DriverConfig) -> Self {
        Self { registry: ConnectionRegistry::new(), rooms: RoomStore::new(), env, config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                Ok(self.handle_connection_accepted(session_id))
            },
            ServerEvent::FrameReceived { session_id, text } => {
                self.handle_frame_received(session_id, &text)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
            ServerEvent::ReaperTick => Ok(self.handle_reaper_tick()),
            ServerEvent::KeepaliveTick => Ok(self.handle_keepalive_tick()),
        }
    }

    /// Sessions currently connected for members of `code`, if the room exists.
    #[must_use]
    pub fn sessions_in_room(&self, code: &RoomCode) -> Vec<u64> {
        self.rooms.room(code).map_or_else(Vec::new, |room| {
            room.players.iter().filter_map(|p| self.registry.session_of(&p.id)).collect()
        })
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.session_count()
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.room_count()
    }

    /// Iterate over live room snapshots.
    pub fn rooms(&self) -> impl Iterator<Item = &padlink_proto::Room> {
        self.rooms.rooms()
    }

    fn handle_connection_accepted(&mut self, session_id: u64) -> Vec<ServerAction> {
        if self.registry.session_count() >= self.config.max_connections {
            return vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }];
        }

        let player_id = PlayerId::from_random_bytes(&self.env.random_array());
        self.registry.register(session_id, player_id.clone());

        vec![log(LogLevel::Debug, format!("player connected: {player_id} (session {session_id})"))]
    }

    fn handle_frame_received(
        &mut self,
        session_id: u64,
        text: &str,
    ) -> Result<Vec<ServerAction>, DriverError> {
        let player_id = self
            .registry
            .player_of(session_id)
            .cloned()
            .ok_or(DriverError::SessionNotFound(session_id))?;

        match ClientMessage::decode(text) {
            Ok(message) => Ok(self.dispatch(session_id, player_id, message)),
            // Unknown but well-formed types are ignored so newer clients can
            // speak additions without being kicked off.
            Err(DecodeError::UnknownType(kind)) => Ok(vec![log(
                LogLevel::Warn,
                format!("ignoring unknown message type {kind:?} from {player_id}"),
            )]),
            Err(err) => {
                let mut actions = error_reply(session_id, "Invalid message format");
                actions
                    .push(log(LogLevel::Warn, format!("invalid frame from {player_id}: {err}")));
                Ok(actions)
            },
        }
    }

    fn dispatch(
        &mut self,
        session_id: u64,
        player_id: PlayerId,
        message: ClientMessage,
    ) -> Vec<ServerAction> {
        match message {
            ClientMessage::CreateRoom { player_name, game_id, game_name } => {
                self.handle_create_room(session_id, player_id, player_name, game_id, game_name)
            },
            ClientMessage::JoinRoom { room_code, player_name } => {
                self.handle_join_room(session_id, player_id, &room_code, player_name)
            },
            ClientMessage::LeaveRoom => {
                if self.registry.room_of(session_id).is_none() {
                    return error_reply(session_id, "Not in a room");
                }
                self.leave_current_room(session_id)
            },
            ClientMessage::Signal { signal } => self.handle_signal(session_id, player_id, signal),
            ClientMessage::GameInput { input } => {
                self.handle_game_input(session_id, input)
            },
            ClientMessage::StartGame { game_id, game_name, rom_url } => {
                self.handle_start_game(session_id, &player_id, game_id, game_name, rom_url)
            },
            ClientMessage::Ping { timestamp } => {
                let timestamp = timestamp.unwrap_or_else(|| self.env.wall_clock_millis());
                vec![send(session_id, ServerMessage::Pong { timestamp })]
            },
            ClientMessage::RtcOffer { target_id, sdp } => self.handle_rtc_relay(
                session_id,
                player_id,
                target_id,
                "offer",
                |from_id| ServerMessage::RtcOffer { from_id, sdp },
            ),
            ClientMessage::RtcAnswer { target_id, sdp } => self.handle_rtc_relay(
                session_id,
                player_id,
                target_id,
                "answer",
                |from_id| ServerMessage::RtcAnswer { from_id, sdp },
            ),
            ClientMessage::RtcIce { target_id, candidate } => self.handle_rtc_relay(
                session_id,
                player_id,
                target_id,
                "ICE candidate",
                |from_id| ServerMessage::RtcIce { from_id, candidate },
            ),
        }
    }

    fn handle_create_room(
        &mut self,
        session_id: u64,
        player_id: PlayerId,
        player_name: Option<String>,
        game_id: Option<String>,
        game_name: Option<String>,
    ) -> Vec<ServerAction> {
        if self.registry.room_of(session_id).is_some() {
            return error_reply(session_id, "Already in a room");
        }

        let (room, player) = self.rooms.create_room(player_id, player_name, game_id, game_name, &self.env);
        self.registry.set_room(session_id, room.code.clone());

        let note = format!("room {} created by {}", room.code, player.name);
        vec![
            send(
                session_id,
                ServerMessage::RoomCreated { room_code: room.code.clone(), room, player },
            ),
            log(LogLevel::Info, note),
        ]
    }

    fn handle_join_room(
        &mut self,
        session_id: u64,
        player_id: PlayerId,
        room_code: &str,
        player_name: Option<String>,
    ) -> Vec<ServerAction> {
        if self.registry.room_of(session_id).is_some() {
            return error_reply(session_id, "Already in a room");
        }

        match self.rooms.join_room(room_code, player_id, player_name) {
            Ok((room, player)) => {
                let code = room.code.clone();
                self.registry.set_room(session_id, code.clone());

                let note =
                    format!("{} joined room {} on port {}", player.name, code, player.port);
                vec![
                    send(
                        session_id,
                        ServerMessage::RoomJoined {
                            room_code: code.clone(),
                            room: room.clone(),
                            player: player.clone(),
                        },
                    ),
                    ServerAction::BroadcastToRoom {
                        code: code.clone(),
                        message: ServerMessage::PlayerJoined { room_code: code, room, player },
                        exclude: Some(session_id),
                    },
                    log(LogLevel::Info, note),
                ]
            },
            Err(err) => error_reply(session_id, wire_error(&err)),
        }
    }

    /// Remove the session's player from its current room and announce the
    /// departure. Used for both explicit leave-room and disconnects.
    fn leave_current_room(&mut self, session_id: u64) -> Vec<ServerAction> {
        let Some(code) = self.registry.room_of(session_id).cloned() else {
            return Vec::new();
        };
        let Some(player_id) = self.registry.player_of(session_id).cloned() else {
            return Vec::new();
        };
        self.registry.clear_room(session_id);

        match self.rooms.leave_room(&code, &player_id) {
            LeaveOutcome::RoomGone => {
                vec![log(LogLevel::Debug, format!("room {code} already gone when {player_id} left"))]
            },
            LeaveOutcome::Deleted { code } => {
                vec![log(LogLevel::Info, format!("room {code} closed (last player left)"))]
            },
            LeaveOutcome::Departed { room, departed, host_changed } => {
                let mut actions = Vec::new();

                // On host migration the roster snapshot goes out before the
                // departure notice so clients see the new host and ports first.
                if host_changed {
                    let new_host = room
                        .players
                        .first()
                        .map_or_else(|| "nobody".to_string(), |p| p.name.clone());
                    actions.push(ServerAction::BroadcastToRoom {
                        code: code.clone(),
                        message: ServerMessage::RoomUpdated {
                            room_code: code.clone(),
                            room: room.clone(),
                        },
                        exclude: None,
                    });
                    actions.push(log(
                        LogLevel::Info,
                        format!("host left room {code}, promoted {new_host}"),
                    ));
                }

                let name = departed
                    .as_ref()
                    .map_or_else(|| player_id.to_string(), |p| p.name.clone());
                actions.push(ServerAction::BroadcastToRoom {
                    code: code.clone(),
                    message: ServerMessage::PlayerLeft {
                        room_code: code.clone(),
                        room,
                        player: departed,
                    },
                    exclude: None,
                });
                actions.push(log(LogLevel::Info, format!("{name} left room {code}")));
                actions
            },
        }
    }

    fn handle_signal(
        &mut self,
        session_id: u64,
        player_id: PlayerId,
        mut signal: SignalPayload,
    ) -> Vec<ServerAction> {
        let Some(code) = self.registry.room_of(session_id).cloned() else {
            return error_reply(session_id, "Not in a room");
        };
        let Some(room) = self.rooms.room(&code) else {
            return error_reply(session_id, "Room not found");
        };
        if !room.has_player(&signal.to_id) {
            return error_reply(session_id, "Target player not found");
        }

        signal.from_id = Some(player_id);
        match self.registry.session_of(&signal.to_id) {
            Some(target) => {
                vec![send(target, ServerMessage::Signal { room_code: code, signal })]
            },
            None => vec![log(
                LogLevel::Debug,
                format!("dropping signal for disconnected player {}", signal.to_id),
            )],
        }
    }

    fn handle_game_input(&mut self, session_id: u64, input: Option<Value>) -> Vec<ServerAction> {
        let Some(code) = self.registry.room_of(session_id).cloned() else {
            return error_reply(session_id, "Not in a room");
        };
        let Some(room) = self.rooms.room(&code) else {
            return error_reply(session_id, "Room not found");
        };

        let timestamp = self.env.wall_clock_millis();
        match self.registry.session_of(&room.host_id) {
            Some(host_session) => vec![send(
                host_session,
                ServerMessage::GameInput { room_code: code, input, timestamp },
            )],
            None => vec![log(
                LogLevel::Debug,
                format!("dropping game input for room {code}: host disconnected"),
            )],
        }
    }

    fn handle_start_game(
        &mut self,
        session_id: u64,
        player_id: &PlayerId,
        game_id: Option<String>,
        game_name: Option<String>,
        rom_url: Option<String>,
    ) -> Vec<ServerAction> {
        let Some(code) = self.registry.room_of(session_id).cloned() else {
            return error_reply(session_id, "Not in a room");
        };

        match self.rooms.start_game(&code, player_id, game_id.clone(), game_name.clone()) {
            Ok(room) => {
                let note = format!(
                    "game started in room {code}: {}",
                    game_name.as_deref().unwrap_or("untitled")
                );
                vec![
                    ServerAction::BroadcastToRoom {
                        code: code.clone(),
                        message: ServerMessage::GameStarted {
                            room_code: code,
                            room,
                            game_id,
                            game_name,
                            rom_url,
                        },
                        exclude: None,
                    },
                    log(LogLevel::Info, note),
                ]
            },
            Err(err) => error_reply(session_id, wire_error(&err)),
        }
    }

    fn handle_rtc_relay(
        &mut self,
        session_id: u64,
        player_id: PlayerId,
        target_id: PlayerId,
        kind: &str,
        make: impl FnOnce(PlayerId) -> ServerMessage,
    ) -> Vec<ServerAction> {
        let Some(code) = self.registry.room_of(session_id).cloned() else {
            return error_reply(session_id, "Not in a room");
        };
        let Some(room) = self.rooms.room(&code) else {
            return error_reply(session_id, "Room not found");
        };
        if !room.has_player(&target_id) {
            return error_reply(session_id, "Target player not found");
        }

        match self.registry.session_of(&target_id) {
            Some(target) => vec![
                send(target, make(player_id.clone())),
                log(LogLevel::Debug, format!("relayed {kind} from {player_id} to {target_id}")),
            ],
            None => vec![log(
                LogLevel::Debug,
                format!("dropping {kind} for disconnected player {target_id}"),
            )],
        }
    }

    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        let mut actions = Vec::new();

        if self.registry.room_of(session_id).is_some() {
            actions.extend(self.leave_current_room(session_id));
        }

        if let Some(info) = self.registry.unregister(session_id) {
            actions.push(log(
                LogLevel::Info,
                format!("player disconnected: {} ({reason})", info.player_id),
            ));
        }

        actions
    }

    fn handle_reaper_tick(&mut self) -> Vec<ServerAction> {
        let now = self.env.wall_clock_millis();
        let timeout_ms = u64::try_from(self.config.room_timeout.as_millis()).unwrap_or(u64::MAX);
        let evicted = self.rooms.reap_stale(now, timeout_ms);

        let mut actions = Vec::new();
        for room in evicted {
            for player in &room.players {
                self.registry.clear_room_of_player(&player.id);
            }
            actions.push(log(LogLevel::Info, format!("evicted stale room {}", room.code)));
        }
        actions
    }

    fn handle_keepalive_tick(&mut self) -> Vec<ServerAction> {
        self.registry
            .session_ids()
            .map(|session_id| ServerAction::ProbeSession { session_id })
            .collect()
    }
}

fn send(session_id: u64, message: ServerMessage) -> ServerAction {
    ServerAction::SendToSession { session_id, message }
}

fn log(level: LogLevel, message: String) -> ServerAction {
    ServerAction::Log { level, message }
}

fn error_reply(session_id: u64, reason: &str) -> Vec<ServerAction> {
    vec![send(session_id, ServerMessage::error(reason))]
}

/// Map a room operation failure to its wire error string.
fn wire_error(err: &RoomError) -> &'static str {
    match err {
        RoomError::RoomNotFound(_) => "Room not found",
        RoomError::RoomFull(_) => "Room is full",
        RoomError::NotHost { .. } => "Only the host can start the game",
        RoomError::PortsExhausted(_) => "No available controller ports",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    };
    use std::time::Duration;

    use rand::RngCore;
    use rand_chacha::{ChaCha8Rng, rand_core::SeedableRng};

    use super::*;

    #[derive(Clone)]
    struct TestEnv {
        clock_ms: Arc<AtomicU64>,
        rng: Arc<Mutex<ChaCha8Rng>>,
    }

    impl TestEnv {
        fn new(seed: u64) -> Self {
            Self {
                clock_ms: Arc::new(AtomicU64::new(1_700_000_000_000)),
                rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
            }
        }

        fn advance(&self, ms: u64) {
            self.clock_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Environment for TestEnv {
        fn wall_clock_millis(&self) -> u64 {
            self.clock_ms.load(Ordering::SeqCst)
        }

        fn sleep(&self, _duration: Duration) -> impl std::future::Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            self.rng.lock().unwrap().fill_bytes(buffer);
        }
    }

    fn driver() -> ServerDriver<TestEnv> {
        ServerDriver::new(TestEnv::new(7), DriverConfig::default())
    }

    fn connect(driver: &mut ServerDriver<TestEnv>, session_id: u64) {
        driver.process_event(ServerEvent::ConnectionAccepted { session_id }).unwrap();
    }

    fn frame(
        driver: &mut ServerDriver<TestEnv>,
        session_id: u64,
        message: &ClientMessage,
    ) -> Vec<ServerAction> {
        let text = serde_json::to_string(message).unwrap();
        driver.process_event(ServerEvent::FrameReceived { session_id, text }).unwrap()
    }

    fn create_room(driver: &mut ServerDriver<TestEnv>, session_id: u64) -> RoomCode {
        let actions = frame(
            driver,
            session_id,
            &ClientMessage::CreateRoom { player_name: None, game_id: None, game_name: None },
        );
        for action in actions {
            if let ServerAction::SendToSession {
                message: ServerMessage::RoomCreated { room_code, .. },
                ..
            } = action
            {
                return room_code;
            }
        }
        panic!("expected room-created reply");
    }

    fn sent_error(actions: &[ServerAction]) -> Option<&str> {
        actions.iter().find_map(|action| match action {
            ServerAction::SendToSession { message: ServerMessage::Error { error }, .. } => {
                Some(error.as_str())
            },
            _ => None,
        })
    }

    #[test]
    fn accepted_connection_is_registered() {
        let mut d = driver();
        connect(&mut d, 1);

        assert_eq!(d.connection_count(), 1);
    }

    #[test]
    fn accept_over_capacity_closes_connection() {
        let mut d =
            ServerDriver::new(TestEnv::new(7), DriverConfig { max_connections: 1, ..DriverConfig::default() });
        connect(&mut d, 1);

        let actions = d.process_event(ServerEvent::ConnectionAccepted { session_id: 2 }).unwrap();

        assert!(matches!(
            actions.as_slice(),
            [ServerAction::CloseConnection { session_id: 2, .. }]
        ));
        assert_eq!(d.connection_count(), 1);
    }

    #[test]
    fn frame_from_unknown_session_is_an_error() {
        let mut d = driver();

        let result = d.process_event(ServerEvent::FrameReceived {
            session_id: 99,
            text: r#"{"type":"ping"}"#.to_string(),
        });

        assert!(matches!(result, Err(DriverError::SessionNotFound(99))));
    }

    #[test]
    fn malformed_frame_gets_error_reply() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = d
            .process_event(ServerEvent::FrameReceived {
                session_id: 1,
                text: "not json".to_string(),
            })
            .unwrap();

        assert_eq!(sent_error(&actions), Some("Invalid message format"));
    }

    #[test]
    fn unknown_message_type_is_ignored() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = d
            .process_event(ServerEvent::FrameReceived {
                session_id: 1,
                text: r#"{"type":"time-travel"}"#.to_string(),
            })
            .unwrap();

        assert!(sent_error(&actions).is_none());
        assert!(actions.iter().all(|a| matches!(a, ServerAction::Log { .. })));
    }

    #[test]
    fn create_room_replies_with_host_snapshot() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = frame(
            &mut d,
            1,
            &ClientMessage::CreateRoom {
                player_name: Some("Ana".to_string()),
                game_id: None,
                game_name: None,
            },
        );

        let Some(ServerAction::SendToSession {
            session_id: 1,
            message: ServerMessage::RoomCreated { room, player, .. },
        }) = actions.first()
        else {
            panic!("expected room-created reply, got {actions:?}");
        };
        assert_eq!(player.name, "Ana");
        assert_eq!(player.port, 1);
        assert_eq!(room.host_id, player.id);
        assert_eq!(d.room_count(), 1);
    }

    #[test]
    fn create_while_in_a_room_is_rejected() {
        let mut d = driver();
        connect(&mut d, 1);
        create_room(&mut d, 1);

        let actions = frame(
            &mut d,
            1,
            &ClientMessage::CreateRoom { player_name: None, game_id: None, game_name: None },
        );

        assert_eq!(sent_error(&actions), Some("Already in a room"));
        assert_eq!(d.room_count(), 1);
    }

    #[test]
    fn join_notifies_existing_members_only() {
        let mut d = driver();
        connect(&mut d, 1);
        connect(&mut d, 2);
        let code = create_room(&mut d, 1);

        let actions = frame(
            &mut d,
            2,
            &ClientMessage::JoinRoom { room_code: code.as_str().to_string(), player_name: None },
        );

        let joined = actions.iter().any(|a| {
            matches!(
                a,
                ServerAction::SendToSession {
                    session_id: 2,
                    message: ServerMessage::RoomJoined { .. }
                }
            )
        });
        let broadcast = actions.iter().any(|a| {
            matches!(
                a,
                ServerAction::BroadcastToRoom {
                    message: ServerMessage::PlayerJoined { .. },
                    exclude: Some(2),
                    ..
                }
            )
        });
        assert!(joined, "joiner gets room-joined");
        assert!(broadcast, "others get player-joined");
    }

    #[test]
    fn join_unknown_code_is_rejected() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = frame(
            &mut d,
            1,
            &ClientMessage::JoinRoom { room_code: "ZZZZZZ".to_string(), player_name: None },
        );

        assert_eq!(sent_error(&actions), Some("Room not found"));
    }

    #[test]
    fn leave_without_room_is_rejected() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = frame(&mut d, 1, &ClientMessage::LeaveRoom);

        assert_eq!(sent_error(&actions), Some("Not in a room"));
    }

    #[test]
    fn host_leave_broadcasts_update_before_departure() {
        let mut d = driver();
        connect(&mut d, 1);
        connect(&mut d, 2);
        let code = create_room(&mut d, 1);
        frame(&mut d, 2, &ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: None,
        });

        let actions = frame(&mut d, 1, &ClientMessage::LeaveRoom);

        let broadcasts: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                ServerAction::BroadcastToRoom { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert!(
            matches!(broadcasts.as_slice(), [
                ServerMessage::RoomUpdated { room, .. },
                ServerMessage::PlayerLeft { .. }
            ] if room.players.len() == 1 && room.players[0].port == 1),
            "expected room-updated then player-left, got {broadcasts:?}"
        );
    }

    #[test]
    fn disconnect_in_room_announces_departure() {
        let mut d = driver();
        connect(&mut d, 1);
        connect(&mut d, 2);
        let code = create_room(&mut d, 1);
        frame(&mut d, 2, &ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: None,
        });

        let actions = d
            .process_event(ServerEvent::ConnectionClosed {
                session_id: 2,
                reason: "peer closed".to_string(),
            })
            .unwrap();

        assert!(actions.iter().any(|a| matches!(
            a,
            ServerAction::BroadcastToRoom { message: ServerMessage::PlayerLeft { .. }, .. }
        )));
        assert_eq!(d.connection_count(), 1);
    }

    #[test]
    fn last_disconnect_deletes_room() {
        let mut d = driver();
        connect(&mut d, 1);
        create_room(&mut d, 1);

        d.process_event(ServerEvent::ConnectionClosed {
            session_id: 1,
            reason: "peer closed".to_string(),
        })
        .unwrap();

        assert_eq!(d.room_count(), 0);
    }

    #[test]
    fn start_game_requires_host() {
        let mut d = driver();
        connect(&mut d, 1);
        connect(&mut d, 2);
        let code = create_room(&mut d, 1);
        frame(&mut d, 2, &ClientMessage::JoinRoom {
            room_code: code.as_str().to_string(),
            player_name: None,
        });

        let actions = frame(&mut d, 2, &ClientMessage::StartGame {
            game_id: None,
            game_name: None,
            rom_url: None,
        });

        assert_eq!(sent_error(&actions), Some("Only the host can start the game"));
    }

    #[test]
    fn start_game_broadcasts_to_everyone() {
        let mut d = driver();
        connect(&mut d, 1);
        create_room(&mut d, 1);

        let actions = frame(&mut d, 1, &ClientMessage::StartGame {
            game_id: Some("smash".to_string()),
            game_name: Some("Smash".to_string()),
            rom_url: Some("https://roms.example/smash.z64".to_string()),
        });

        assert!(actions.iter().any(|a| matches!(
            a,
            ServerAction::BroadcastToRoom {
                message: ServerMessage::GameStarted { .. },
                exclude: None,
                ..
            }
        )));
    }

    #[test]
    fn ping_echoes_client_timestamp() {
        let mut d = driver();
        connect(&mut d, 1);

        let actions = frame(&mut d, 1, &ClientMessage::Ping { timestamp: Some(42) });

        assert!(matches!(
            actions.as_slice(),
            [ServerAction::SendToSession { message: ServerMessage::Pong { timestamp: 42 }, .. }]
        ));
    }

    #[test]
    fn keepalive_probes_every_session() {
        let mut d = driver();
        connect(&mut d, 1);
        connect(&mut d, 2);

        let actions = d.process_event(ServerEvent::KeepaliveTick).unwrap();

        let mut probed: Vec<u64> = actions
            .iter()
            .filter_map(|a| match a {
                ServerAction::ProbeSession { session_id } => Some(*session_id),
                _ => None,
            })
            .collect();
        probed.sort_unstable();
        assert_eq!(probed, vec![1, 2]);
    }

    #[test]
    fn reaper_evicts_expired_room_and_clears_registry() {
        let env = TestEnv::new(7);
        let mut d = ServerDriver::new(env.clone(), DriverConfig::default());
        connect(&mut d, 1);
        create_room(&mut d, 1);

        env.advance(60 * 60 * 1000 + 1);
        let actions = d.process_event(ServerEvent::ReaperTick).unwrap();

        assert_eq!(d.room_count(), 0);
        assert!(actions.iter().any(|a| matches!(a, ServerAction::Log { level: LogLevel::Info, .. })));

        // The evicted member may now create a fresh room.
        let actions = frame(
            &mut d,
            1,
            &ClientMessage::CreateRoom { player_name: None, game_id: None, game_name: None },
        );
        assert!(sent_error(&actions).is_none());
    }
}
