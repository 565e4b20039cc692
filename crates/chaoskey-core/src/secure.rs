//! Integrity-gated, blinded RSA decryption with a latency floor.
//!
//! ```text
//! decode ─► verify tag ─► key present? ─► (n, e) match? ─► blind ─► CRT ─► unblind
//!   │           │                                                            │
//!   └─ Malformed / IntegrityCheckFailed: returned at once   sleep to floor ◄─┘
//! ```
//!
//! # Security
//!
//! - No private-key arithmetic happens before the tag verifies
//! - The private exponentiation only sees `c · rᵉ mod n` for a fresh `r`
//! - Every call that passes the integrity gate takes at least the configured
//!   floor, success or failure. Decode and tag failures return immediately;
//!   their timing reveals only that the container was rejected before any
//!   key was touched.

use std::time::Duration;

use chaoskey_crypto::{RsaPrivateKey, sample_blinding_factor};
use chaoskey_proto::{Container, TagKeying};

use crate::{env::Environment, error::ServiceError};

/// Decrypts RSA containers.
#[derive(Debug, Clone)]
pub struct SecureDecryptor<E: Environment> {
    env: E,
    keying: TagKeying,
    floor: Duration,
}

impl<E: Environment> SecureDecryptor<E> {
    /// Create a decryptor verifying tags under `keying` and holding every
    /// post-gate call to at least `floor`.
    pub fn new(env: E, keying: TagKeying, floor: Duration) -> Self {
        Self { env, keying, floor }
    }

    /// Tag keying convention in force.
    pub fn keying(&self) -> TagKeying {
        self.keying
    }

    /// Latency floor in force.
    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Decrypt a container.
    ///
    /// # Errors
    ///
    /// - `Container(Malformed)` if the bytes are not a container
    /// - `Container(IntegrityCheckFailed)` if the tag does not verify
    /// - `MissingPrivateKey` if `private_key` is `None`
    /// - `KeyMismatch` if the container's `(n, e)` is not the key's
    /// - `Crypto(CiphertextOutOfRange)` if the ciphertext is not below `n`
    pub fn decrypt(
        &self,
        container: &[u8],
        private_key: Option<&RsaPrivateKey>,
    ) -> Result<Vec<u8>, ServiceError> {
        let started = self.env.now();

        let container = Container::decode(container)?;
        if let Err(err) = container.verify(self.keying) {
            tracing::warn!(error = %err, "rejected container before decryption");
            return Err(err.into());
        }

        let result = self.decrypt_verified(&container, private_key);
        self.hold_floor(started);
        result
    }

    fn decrypt_verified(
        &self,
        container: &Container,
        private_key: Option<&RsaPrivateKey>,
    ) -> Result<Vec<u8>, ServiceError> {
        let key = private_key.ok_or(ServiceError::MissingPrivateKey)?;
        if !key.matches(&container.n, &container.e) {
            return Err(ServiceError::KeyMismatch);
        }

        let r = sample_blinding_factor(key.n(), |buf| self.env.random_bytes(buf))?;
        Ok(key.decrypt_blinded(&container.ciphertext, &r)?)
    }

    fn hold_floor(&self, started: E::Instant) {
        let elapsed = self.env.now() - started;
        if let Some(remaining) = self.floor.checked_sub(elapsed).filter(|d| !d.is_zero()) {
            self.env.sleep(remaining);
        }
    }
}
