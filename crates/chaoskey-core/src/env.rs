//! Environment abstraction for deterministic testing.
//!
//! Decouples key generation and decryption from system resources (time,
//! randomness, wall clock, load). Production uses [`crate::SystemEnv`];
//! tests use [`crate::SeededEnv`] to make key generation reproducible.

use std::time::Duration;

/// Abstract environment providing time, randomness and host measurements.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Blocks the calling thread for `duration`.
    ///
    /// Only used by the decrypt latency floor, which runs on caller threads
    /// and holds no locks while sleeping.
    fn sleep(&self, duration: Duration);

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// UTC wall-clock time as `YYYY-MM-DDTHH:MM:SS.ffffff`.
    fn utc_timestamp(&self) -> String;

    /// Short textual sample of current CPU load.
    fn load_sample(&self) -> String;

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Generates 16 random bytes, e.g. for key identifiers.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }
}

/// Timestamp layout shared by every environment.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
