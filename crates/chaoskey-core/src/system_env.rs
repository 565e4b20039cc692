//! Production Environment implementation using system time and RNG.
//!
//! # Capabilities
//!
//! - Real system time (`std::time::Instant`) that advances naturally
//! - OS cryptographic RNG (getrandom). Truly random, not reproducible
//! - Blocking thread sleep for the decrypt latency floor
//! - UTC timestamps from chrono and the one-minute load average from sysinfo

use std::time::Duration;

use sysinfo::System;

use crate::env::{Environment, TIMESTAMP_FORMAT};

/// Production environment using system time and cryptographic RNG.
///
/// # Security
///
/// The RNG uses getrandom which provides OS-level cryptographic randomness
/// (e.g., /dev/urandom on Linux, `BCryptGenRandom` on Windows). Suitable for
/// system entropy, IVs, blinding factors and key identifiers.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without functioning randomness no key, IV or
/// blinding factor can be produced safely.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys cannot be generated");
    }

    #[allow(clippy::disallowed_methods)]
    fn utc_timestamp(&self) -> String {
        chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
    }

    fn load_sample(&self) -> String {
        format!("{:.2}", System::load_average().one)
    }
}
