//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` is the production implementation of the Environment trait using
//! real system time and cryptographic RNG.
//!
//! # Capabilities
//!
//! - Real wall-clock time (`std::time::SystemTime`) that advances naturally
//! - OS cryptographic RNG (getrandom). Truly random, not reproducible
//! - Tokio async sleep for actual wall-clock delays
//!
//! This means production behavior is non-deterministic, but provides real-world
//! timing and unpredictable identifiers.

use std::time::Duration;

use padlink_core::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// Uses `std::time::SystemTime::now()` for time, `tokio::time::sleep()` for
/// async sleeping, and getrandom for cryptographic randomness.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Suitable for
/// generating player IDs, session IDs, and room codes that must not be
/// guessable.
///
/// # Panics
///
/// Panics if the OS RNG fails. A server without functioning randomness would
/// hand out predictable room codes and player IDs, so continuing would be
/// worse than crashing. RNG failure indicates OS-level issues and is extremely
/// rare.
#[derive(Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)");
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - server cannot operate safely");
    }
}
