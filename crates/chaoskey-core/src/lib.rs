//! chaoskey Core
//!
//! Orchestrates the latent source, key derivation, prime search, container
//! codec and cipher engines into one service.
//!
//! ```text
//!                       ┌──────────────── CryptoService ────────────────┐
//!                       │                                               │
//! CryptoConfig ──build──► ServiceComponents (swapped on reconfigure)    │
//!                       │   KeyManager ─── EntropySource ─┐             │
//!                       │   KeyGenerator ── PrimePool     │             │
//!                       │   SecureDecryptor               │             │
//!                       │                                 ▼             │
//!                       │ LatentSource (Encoder + ImageFactory) ◄── retrainer
//!                       │ RsaKeyManager                                 │
//!                       └───────────────────────────────────────────────┘
//! ```
//!
//! All randomness, time, timestamps and load samples come through
//! [`Environment`]: [`SystemEnv`] in production, [`SeededEnv`] for
//! reproducible tests.
//!
//! # Security
//!
//! - RSA containers are verified before any private-key arithmetic
//! - RSA decryption is blinded and held to a latency floor once past the
//!   integrity gate
//! - Symmetric keys and seed material are zeroized when dropped

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod entropy;
pub mod env;
pub mod error;
pub mod key_manager;
pub mod keygen;
pub mod retrain;
pub mod secure;
pub mod seeded_env;
pub mod service;
pub mod system_env;

pub use config::{CoreKind, CryptoConfig, DEFAULT_LATENCY_FLOOR};
pub use entropy::{ARNOLD_ITERATIONS, EntropySource, LatentSource};
pub use env::{Environment, TIMESTAMP_FORMAT};
pub use error::{ErrorKind, ServiceError};
pub use key_manager::{KeyManager, RsaKeyManager, new_key_id};
pub use keygen::{GeneratedKeyPair, KeyGenerator};
pub use retrain::{RetrainHandle, RetrainSchedule, fine_tune_round, spawn_retrainer, startup_fit};
pub use secure::SecureDecryptor;
pub use seeded_env::SeededEnv;
pub use service::{CryptoService, EncryptionMetadata, ServiceComponents};
pub use system_env::SystemEnv;

/// Re-exported so callers name the same container keying type.
pub use chaoskey_proto::TagKeying;
