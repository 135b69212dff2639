//! Padlink core logic.
//!
//! Pure, synchronous room lifecycle management behind an injectable
//! [`Environment`] for time and randomness. No I/O happens here; the server
//! crate drives this logic from events and executes the results.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod env;
pub mod room_store;

pub use env::Environment;
pub use room_store::{LeaveOutcome, RoomError, RoomStore};
