//! Reproducible environment for tests and benchmarks.
//!
//! Randomness comes from a shared ChaCha20 stream and timestamps from a
//! counter, so two `SeededEnv`s built from the same seed drive key
//! generation to identical keys. Time and sleep stay real: the decrypt
//! latency floor is measured against the actual clock.

#![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use chrono::DateTime;
use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};

use crate::env::{Environment, TIMESTAMP_FORMAT};

/// 2025-01-01T00:00:00Z in microseconds since the Unix epoch.
const EPOCH_MICROS: i64 = 1_735_689_600_000_000;

/// Seeded environment.
///
/// Clones share one RNG stream and one timestamp counter.
#[derive(Debug, Clone)]
pub struct SeededEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock_micros: Arc<AtomicI64>,
    load: Arc<str>,
}

impl SeededEnv {
    /// Environment whose random stream is keyed by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock_micros: Arc::new(AtomicI64::new(0)),
            load: Arc::from("0.25"),
        }
    }

    /// Replace the fixed load sample.
    #[must_use]
    pub fn with_load(mut self, load: &str) -> Self {
        self.load = Arc::from(load);
        self
    }
}

impl Environment for SeededEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("seeded rng mutex poisoned").fill_bytes(buffer);
    }

    /// Starts at 2025-01-01T00:00:00 and advances one millisecond per call.
    fn utc_timestamp(&self) -> String {
        let offset = self.clock_micros.fetch_add(1_000, Ordering::Relaxed);
        let Some(at) = DateTime::from_timestamp_micros(EPOCH_MICROS + offset) else {
            unreachable!("seeded clock stays within chrono's range");
        };
        at.format(TIMESTAMP_FORMAT).to_string()
    }

    fn load_sample(&self) -> String {
        self.load.to_string()
    }
}
