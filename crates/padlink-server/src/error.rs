//! Server error types.

use thiserror::Error;

/// Errors surfaced by the session driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// An event referenced a session id the driver has never accepted.
    #[error("session not found: {0}")]
    SessionNotFound(u64),
}

/// Top-level server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid runtime configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Listener or socket failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Driver rejected an event.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
