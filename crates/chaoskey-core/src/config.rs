//! Service configuration.
//!
//! [`CryptoConfig`] is a plain value: build it with the setters, deserialize
//! it, or take the defaults. Applying a new one rebuilds the key manager and
//! cipher wiring (see [`crate::ServiceComponents`]); the encoder and its
//! used-image set survive reconfiguration.

use std::{fmt, str::FromStr, time::Duration};

use chaoskey_proto::TagKeying;
use serde::{Deserialize, Serialize};

use crate::{entropy::EntropySource, error::ServiceError};

/// Default decrypt latency floor.
pub const DEFAULT_LATENCY_FLOOR: Duration = Duration::from_millis(100);

/// Which engine `encrypt`/`decrypt` dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoreKind {
    /// AES-256-CBC under a stored key
    #[default]
    #[serde(rename = "aes")]
    Symmetric,
    /// Ephemeral RSA key per message, packed into a container
    #[serde(rename = "rsa")]
    Rsa,
}

impl CoreKind {
    /// Canonical name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Symmetric => "aes",
            Self::Rsa => "rsa",
        }
    }
}

impl fmt::Display for CoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoreKind {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "aes" => Ok(Self::Symmetric),
            "rsa" => Ok(Self::Rsa),
            other => Err(ServiceError::UnknownCore(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(remote = "TagKeying", rename_all = "snake_case")]
enum TagKeyingDef {
    Entropy,
    TimestampPrefix,
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Engine used by `encrypt`/`decrypt`
    pub core: CoreKind,
    /// Source of symmetric key bytes
    pub entropy_source: EntropySource,
    /// Fine-tune the encoder before each symmetric encrypt unless the caller
    /// says otherwise
    pub retrain_on_encrypt: bool,
    /// Which container field keys the integrity tag
    #[serde(with = "TagKeyingDef")]
    pub tag_keying: TagKeying,
    /// Minimum wall-clock duration of an RSA decrypt that passes the
    /// integrity gate
    pub latency_floor_ms: u64,
    /// Prime search workers (at least 2)
    pub prime_workers: usize,
    /// Logistic images in the startup training set
    pub startup_images: usize,
    /// Startup training epochs
    pub startup_epochs: usize,
    /// Seconds between background fine-tune rounds
    pub retrain_interval_secs: u64,
    /// Logistic images per fine-tune round
    pub retrain_images: usize,
    /// Epochs per fine-tune round
    pub retrain_epochs: usize,
    /// Fixed encoder initialization seed; random when absent
    pub encoder_seed: Option<u64>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            core: CoreKind::default(),
            entropy_source: EntropySource::default(),
            retrain_on_encrypt: false,
            tag_keying: TagKeying::default(),
            latency_floor_ms: DEFAULT_LATENCY_FLOOR.as_millis() as u64,
            prime_workers: 2,
            startup_images: 1000,
            startup_epochs: 3,
            retrain_interval_secs: 300,
            retrain_images: 500,
            retrain_epochs: 2,
            encoder_seed: None,
        }
    }
}

impl CryptoConfig {
    /// Set the dispatch engine.
    #[must_use]
    pub fn with_core(mut self, core: CoreKind) -> Self {
        self.core = core;
        self
    }

    /// Set the symmetric key source.
    #[must_use]
    pub fn with_entropy_source(mut self, source: EntropySource) -> Self {
        self.entropy_source = source;
        self
    }

    /// Set the default for retraining before symmetric encrypt.
    #[must_use]
    pub fn with_retrain(mut self, retrain: bool) -> Self {
        self.retrain_on_encrypt = retrain;
        self
    }

    /// Set the container tag keying convention.
    #[must_use]
    pub fn with_tag_keying(mut self, keying: TagKeying) -> Self {
        self.tag_keying = keying;
        self
    }

    /// Set the decrypt latency floor.
    #[must_use]
    pub fn with_latency_floor(mut self, floor: Duration) -> Self {
        self.latency_floor_ms = floor.as_millis() as u64;
        self
    }

    /// Set the startup training set size and epochs.
    #[must_use]
    pub fn with_startup_training(mut self, images: usize, epochs: usize) -> Self {
        self.startup_images = images;
        self.startup_epochs = epochs;
        self
    }

    /// Set the background fine-tune schedule.
    #[must_use]
    pub fn with_retrain_schedule(
        mut self,
        interval: Duration,
        images: usize,
        epochs: usize,
    ) -> Self {
        self.retrain_interval_secs = interval.as_secs();
        self.retrain_images = images;
        self.retrain_epochs = epochs;
        self
    }

    /// Fix the encoder initialization seed.
    #[must_use]
    pub fn with_encoder_seed(mut self, seed: u64) -> Self {
        self.encoder_seed = Some(seed);
        self
    }

    /// Latency floor as a `Duration`.
    pub fn latency_floor(&self) -> Duration {
        Duration::from_millis(self.latency_floor_ms)
    }

    /// Fine-tune interval as a `Duration`.
    pub fn retrain_interval(&self) -> Duration {
        Duration::from_secs(self.retrain_interval_secs)
    }
}
