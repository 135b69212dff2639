//! Environment abstraction for deterministic testing.
//!
//! Decouples room logic from system resources (time, randomness). Tests
//! inject a virtual clock and seeded RNG; production uses real system time
//! and OS entropy.

use std::time::Duration;

/// Abstract environment providing time, randomness, and async sleep.
///
/// # Invariants
///
/// - `wall_clock_millis()` never goes backwards within one process
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used for room creation timestamps, room age, and forwarded-input
    /// timestamps, so the whole protocol shares one clock.
    fn wall_clock_millis(&self) -> u64;

    /// Sleeps for the specified duration.
    ///
    /// The only async method in the trait, used by driver code for the
    /// reaper and keepalive periods - never by room logic.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a fixed-size array of random bytes.
    ///
    /// Convenience for id and room-code generation.
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }

    /// Generates a random `u64`.
    ///
    /// Convenience for session ids.
    fn random_u64(&self) -> u64 {
        u64::from_be_bytes(self.random_array())
    }
}
