//! Padlink wire protocol.
//!
//! Every frame, in both directions, is a JSON object with a required string
//! field `type` and type-specific fields. Frame bodies use camelCase field
//! names (`roomCode`, `hostId`, `fromId`, ...) for compatibility with
//! existing clients; `type` values are kebab-case (`create-room`,
//! `rtc-offer`, ...).
//!
//! The decode path is a strict sum type: every recognized `type` is
//! enumerated in [`ClientMessage`], and anything else is labeled
//! [`DecodeError::UnknownType`] rather than being folded into a generic
//! parse failure. Callers rely on that distinction - unknown types are
//! logged and ignored, malformed frames get an error reply.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod code;
mod message;
mod room;

pub use code::{CODE_ALPHABET, CODE_LEN, RoomCode};
pub use message::{ClientMessage, DecodeError, ServerMessage, SignalKind, SignalPayload};
pub use room::{MAX_PLAYERS, Player, PlayerId, PlayerRole, Room, RoomState};
