//! Typed client and server frames.
//!
//! Internally tagged serde enums: the `type` field selects the variant.
//! [`ClientMessage::decode`] is the only way frames enter the system and it
//! distinguishes three failure shapes: unparseable input, a recognized
//! `type` with a bad body (both malformed), and a well-formed object with a
//! `type` this protocol does not know (labeled, not an error reply).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    code::RoomCode,
    room::{Player, PlayerId, Room},
};

/// Every recognized client `type` value, in dispatch-table order.
const CLIENT_TYPES: [&str; 10] = [
    "create-room",
    "join-room",
    "leave-room",
    "signal",
    "game-input",
    "start-game",
    "ping",
    "rtc-offer",
    "rtc-answer",
    "rtc-ice",
];

/// A frame received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room; the sender becomes host at port 1.
    CreateRoom {
        /// Display name; defaults to "Host".
        player_name: Option<String>,
        /// Optional game metadata.
        game_id: Option<String>,
        /// Optional game metadata.
        game_name: Option<String>,
    },
    /// Join an existing room by code (case-insensitive).
    JoinRoom {
        /// Code as typed by the player.
        room_code: String,
        /// Display name; defaults to "Guest".
        player_name: Option<String>,
    },
    /// Leave the current room.
    LeaveRoom,
    /// Relay a connection-negotiation payload to one room member.
    Signal {
        /// The payload; only `toId` is interpreted.
        signal: SignalPayload,
    },
    /// Forward controller input to the room host.
    GameInput {
        /// Opaque input payload.
        input: Option<Value>,
    },
    /// Host-only: transition the room to `playing`.
    StartGame {
        /// Game metadata stored on the room.
        game_id: Option<String>,
        /// Game metadata stored on the room.
        game_name: Option<String>,
        /// Echoed in the `game-started` broadcast, not stored.
        rom_url: Option<String>,
    },
    /// Application-level keepalive.
    Ping {
        /// Echoed in the pong when present.
        timestamp: Option<u64>,
    },
    /// WebRTC offer relay.
    RtcOffer {
        /// Recipient player id.
        target_id: PlayerId,
        /// Opaque session description.
        sdp: Option<Value>,
    },
    /// WebRTC answer relay.
    RtcAnswer {
        /// Recipient player id.
        target_id: PlayerId,
        /// Opaque session description.
        sdp: Option<Value>,
    },
    /// WebRTC ICE candidate relay.
    RtcIce {
        /// Recipient player id.
        target_id: PlayerId,
        /// Opaque candidate.
        candidate: Option<Value>,
    },
}

impl ClientMessage {
    /// Decode one raw text frame.
    ///
    /// Unknown `type` values come back as [`DecodeError::UnknownType`] so the
    /// dispatcher can log-and-ignore them; every other failure is a
    /// malformed frame that earns the sender an error reply.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text).map_err(DecodeError::Syntax)?;
        let Some(object) = value.as_object() else {
            return Err(DecodeError::NotAnObject);
        };
        let Some(kind) = object.get("type").and_then(Value::as_str) else {
            return Err(DecodeError::MissingType);
        };
        if !CLIENT_TYPES.contains(&kind) {
            return Err(DecodeError::UnknownType(kind.to_owned()));
        }
        let kind = kind.to_owned();
        serde_json::from_value(value).map_err(|source| DecodeError::Body { kind, source })
    }
}

/// Why a frame failed to decode.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Input was not valid JSON.
    #[error("invalid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Input was JSON but not an object.
    #[error("frame is not a JSON object")]
    NotAnObject,

    /// No string `type` field.
    #[error("frame has no type field")]
    MissingType,

    /// `type` is not one of the recognized message kinds.
    ///
    /// Deliberately not reported back to the sender (see module docs).
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// Recognized `type` but the body did not match its schema.
    #[error("invalid {kind} frame: {source}")]
    Body {
        /// The recognized `type` value.
        kind: String,
        /// Underlying serde failure.
        source: serde_json::Error,
    },
}

/// A frame sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Reply to `create-room`.
    RoomCreated {
        /// The generated code.
        room_code: RoomCode,
        /// Full room snapshot.
        room: Room,
        /// The host player entry.
        player: Player,
    },
    /// Reply to `join-room`.
    RoomJoined {
        /// Normalized code.
        room_code: RoomCode,
        /// Full room snapshot.
        room: Room,
        /// The joining player entry.
        player: Player,
    },
    /// Whole-room update; broadcast when host identity or ports changed.
    RoomUpdated {
        /// Room code.
        room_code: RoomCode,
        /// Full room snapshot after the change.
        room: Room,
    },
    /// Broadcast to existing members when someone joins.
    PlayerJoined {
        /// Room code.
        room_code: RoomCode,
        /// Full room snapshot.
        room: Room,
        /// The new player.
        player: Player,
    },
    /// Broadcast to remaining members when someone leaves.
    PlayerLeft {
        /// Room code.
        room_code: RoomCode,
        /// Full room snapshot after the departure.
        room: Room,
        /// The departed player, as last seen.
        #[serde(skip_serializing_if = "Option::is_none")]
        player: Option<Player>,
    },
    /// Broadcast to all members (including the host) on start.
    GameStarted {
        /// Room code.
        room_code: RoomCode,
        /// Full room snapshot.
        room: Room,
        /// Echoed metadata.
        #[serde(skip_serializing_if = "Option::is_none")]
        game_id: Option<String>,
        /// Echoed metadata.
        #[serde(skip_serializing_if = "Option::is_none")]
        game_name: Option<String>,
        /// Echoed metadata.
        #[serde(skip_serializing_if = "Option::is_none")]
        rom_url: Option<String>,
    },
    /// Relayed negotiation payload, `fromId` stamped by the server.
    Signal {
        /// Room code.
        room_code: RoomCode,
        /// The relayed payload.
        signal: SignalPayload,
    },
    /// Controller input forwarded to the current host.
    GameInput {
        /// Room code.
        room_code: RoomCode,
        /// Opaque input payload.
        input: Option<Value>,
        /// Server wall-clock milliseconds at forwarding time.
        timestamp: u64,
    },
    /// Reply to `ping`.
    Pong {
        /// Echoed timestamp, or fresh server time if the ping had none.
        timestamp: u64,
    },
    /// Relayed WebRTC offer.
    RtcOffer {
        /// Sender player id, stamped by the server.
        from_id: PlayerId,
        /// Opaque session description.
        sdp: Option<Value>,
    },
    /// Relayed WebRTC answer.
    RtcAnswer {
        /// Sender player id, stamped by the server.
        from_id: PlayerId,
        /// Opaque session description.
        sdp: Option<Value>,
    },
    /// Relayed WebRTC ICE candidate.
    RtcIce {
        /// Sender player id, stamped by the server.
        from_id: PlayerId,
        /// Opaque candidate.
        candidate: Option<Value>,
    },
    /// Structured error reply. Never closes the connection.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl ServerMessage {
    /// Shorthand for an error reply.
    pub fn error(reason: impl Into<String>) -> Self {
        Self::Error { error: reason.into() }
    }
}

/// Connection-negotiation payload relayed verbatim between two members.
///
/// Only `toId` (routing) and `fromId` (stamped by the server) are
/// interpreted; `data` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalPayload {
    /// Recipient player id.
    pub to_id: PlayerId,
    /// Sender player id; the server overwrites whatever the client sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_id: Option<PlayerId>,
    /// Negotiation payload kind.
    #[serde(rename = "type")]
    pub kind: SignalKind,
    /// Opaque session descriptor or candidate.
    pub data: Option<Value>,
}

/// Kinds of negotiation payload carried by a `signal` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// SDP offer.
    Offer,
    /// SDP answer.
    Answer,
    /// ICE candidate.
    IceCandidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_recognized_type() {
        let frames = [
            r#"{"type":"create-room","playerName":"Ana","gameName":"Kart"}"#,
            r#"{"type":"join-room","roomCode":"ab23cd"}"#,
            r#"{"type":"leave-room"}"#,
            r#"{"type":"signal","signal":{"toId":"p1","type":"offer","data":{"sdp":"x"}}}"#,
            r#"{"type":"game-input","input":{"button":"A"}}"#,
            r#"{"type":"start-game","gameId":"g1","romUrl":"https://x/y.z64"}"#,
            r#"{"type":"ping","timestamp":123}"#,
            r#"{"type":"rtc-offer","targetId":"p2","sdp":{"type":"offer"}}"#,
            r#"{"type":"rtc-answer","targetId":"p2","sdp":{"type":"answer"}}"#,
            r#"{"type":"rtc-ice","targetId":"p2","candidate":{"candidate":"c"}}"#,
        ];
        for frame in frames {
            ClientMessage::decode(frame).unwrap();
        }
    }

    #[test]
    fn optional_fields_default_to_none() {
        let msg = ClientMessage::decode(r#"{"type":"create-room"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom { player_name: None, game_id: None, game_name: None }
        );

        let msg = ClientMessage::decode(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Ping { timestamp: None });
    }

    #[test]
    fn unknown_type_is_labeled_not_malformed() {
        let err = ClientMessage::decode(r#"{"type":"chat-message","text":"hi"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownType(ref t) if t == "chat-message"));
    }

    #[test]
    fn malformed_frames_are_distinguished() {
        assert!(matches!(ClientMessage::decode("not json").unwrap_err(), DecodeError::Syntax(_)));
        assert!(matches!(ClientMessage::decode("[1,2]").unwrap_err(), DecodeError::NotAnObject));
        assert!(matches!(
            ClientMessage::decode(r#"{"roomCode":"AB23CD"}"#).unwrap_err(),
            DecodeError::MissingType
        ));
        // Recognized type, wrong body shape
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"join-room"}"#).unwrap_err(),
            DecodeError::Body { ref kind, .. } if kind == "join-room"
        ));
    }

    #[test]
    fn signal_round_trips_with_wire_names() {
        let json = r#"{"toId":"p1","type":"ice-candidate","data":null}"#;
        let signal: SignalPayload = serde_json::from_str(json).unwrap();
        assert_eq!(signal.kind, SignalKind::IceCandidate);
        assert!(signal.from_id.is_none());

        let out = serde_json::to_value(&signal).unwrap();
        assert_eq!(out["toId"], "p1");
        assert_eq!(out["type"], "ice-candidate");
        // fromId omitted until the server stamps it
        assert!(out.get("fromId").is_none());
    }

    #[test]
    fn server_error_frame_shape() {
        let json = serde_json::to_value(ServerMessage::error("Room not found")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "Room not found");
    }

    #[test]
    fn pong_frame_shape() {
        let json = serde_json::to_value(ServerMessage::Pong { timestamp: 42 }).unwrap();
        assert_eq!(json["type"], "pong");
        assert_eq!(json["timestamp"], 42);
    }
}
