//! Latent-seeded RSA key generation.
//!
//! ```text
//! ImageFactory ──► Encoder ──► latent bytes ─┐
//! Environment ──► system entropy, timestamp, load ─┴─► derive_seed_pair
//!                                                           │
//!                          PrimePool::search_pair ◄─────────┘
//!                                   │
//!                 ensure_distinct → RsaPrivateKey::from_primes
//! ```

use std::sync::Arc;

use chaoskey_crypto::{
    PrimePool, RsaPrivateKey, RsaPublicKey, SYSTEM_ENTROPY_SIZE, SeedInputs, derive_seed_pair,
    ensure_distinct,
};

use crate::{entropy::LatentSource, env::Environment, error::ServiceError};

/// One freshly generated key pair plus the metadata bound into its
/// containers.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    /// Private key
    pub private: RsaPrivateKey,
    /// Public half of `private`
    pub public: RsaPublicKey,
    /// OS randomness mixed into the seeds
    pub system_entropy: [u8; SYSTEM_ENTROPY_SIZE],
    /// Generation timestamp (`YYYY-MM-DDTHH:MM:SS.ffffff`)
    pub timestamp: String,
}

/// Runs the key derivation pipeline.
///
/// # Invariants
///
/// - Every generation consumes one never-issued image and fresh system
///   entropy, so no two generations share a seed pair
/// - Both primes are searched concurrently; if either search fails the
///   whole generation fails and nothing is returned
#[derive(Debug, Clone)]
pub struct KeyGenerator<E: Environment> {
    env: E,
    latent: LatentSource,
    pool: Arc<PrimePool>,
}

impl<E: Environment> KeyGenerator<E> {
    /// Create a generator.
    pub fn new(env: E, latent: LatentSource, pool: Arc<PrimePool>) -> Self {
        Self { env, latent, pool }
    }

    /// Generate a key pair.
    ///
    /// # Errors
    ///
    /// - `Latent(ImagesExhausted)` if no unused image could be drawn
    /// - `KeyGen` if prime search or key assembly failed; `NoInverse` is
    ///   reported through [`ServiceError::kind`]
    pub fn generate(&self) -> Result<GeneratedKeyPair, ServiceError> {
        let latent = self.latent.fresh_latent(&self.env)?;
        let latent_bytes = latent.to_bytes();

        let mut system_entropy = [0u8; SYSTEM_ENTROPY_SIZE];
        self.env.random_bytes(&mut system_entropy);
        let timestamp = self.env.utc_timestamp();
        let load_sample = self.env.load_sample();

        let seeds = derive_seed_pair(&SeedInputs {
            latent: &latent_bytes,
            system_entropy: &system_entropy,
            timestamp: &timestamp,
            load_sample: &load_sample,
        });
        tracing::debug!(%timestamp, load = %load_sample, "derived prime seeds");

        let (p, q) = self.pool.search_pair(&seeds).map_err(ServiceError::KeyGen)?;
        drop(seeds);
        let (p, q) = ensure_distinct(p, q);
        let private = RsaPrivateKey::from_primes(p, q).map_err(ServiceError::KeyGen)?;
        let public = private.to_public_key();

        tracing::info!(modulus_bits = private.n().bits(), %timestamp, "generated RSA key pair");
        Ok(GeneratedKeyPair { private, public, system_entropy, timestamp })
    }

    /// Prime search pool.
    pub fn pool(&self) -> &Arc<PrimePool> {
        &self.pool
    }
}
