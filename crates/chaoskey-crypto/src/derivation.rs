//! Seed derivation for RSA prime search.
//!
//! ```text
//! latent ‖ system_entropy ‖ timestamp ‖ load
//!        │
//!        ▼
//! PBKDF2-HMAC-SHA512 (salt = system_entropy[..16], 5000 rounds) → 64 bytes
//!        │
//!        ├── SHA-256(derived[..32] ‖ "p") → seed_p
//!        └── SHA-256(derived[32..] ‖ "q") → seed_q
//! ```
//!
//! The two halves of the PBKDF2 output are disjoint and domain-separated by
//! label, so the seeds are independent even though they share one KDF call.

use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 5000;

/// Bytes of OS randomness mixed into every derivation.
pub const SYSTEM_ENTROPY_SIZE: usize = 32;

/// Prefix of the system entropy used as PBKDF2 salt.
pub const SALT_SIZE: usize = 16;

/// PBKDF2 output length (two 32-byte halves).
const DERIVED_SIZE: usize = 64;

/// Domain label for the p seed.
const LABEL_P: &[u8] = b"p";

/// Domain label for the q seed.
const LABEL_Q: &[u8] = b"q";

/// Largest output HKDF-SHA256 can produce.
pub const MAX_EXPAND_SIZE: usize = 255 * 32;

/// Inputs mixed into one key generation.
#[derive(Clone, Copy)]
pub struct SeedInputs<'a> {
    /// Little-endian latent vector bytes
    pub latent: &'a [u8],
    /// Fresh OS randomness, also the PBKDF2 salt source
    pub system_entropy: &'a [u8; SYSTEM_ENTROPY_SIZE],
    /// UTC timestamp string
    pub timestamp: &'a str,
    /// CPU load sample string
    pub load_sample: &'a str,
}

/// Two independent 256-bit prime seeds.
///
/// # Security
///
/// - Zeroized on drop
/// - Never reused: each key generation derives a fresh pair from fresh
///   system entropy
pub struct DerivedSeedPair {
    seed_p: [u8; 32],
    seed_q: [u8; 32],
}

impl DerivedSeedPair {
    /// Wrap explicit seeds.
    pub fn from_seeds(seed_p: [u8; 32], seed_q: [u8; 32]) -> Self {
        Self { seed_p, seed_q }
    }

    /// Seed for the first prime.
    pub fn seed_p(&self) -> &[u8; 32] {
        &self.seed_p
    }

    /// Seed for the second prime.
    pub fn seed_q(&self) -> &[u8; 32] {
        &self.seed_q
    }
}

impl Drop for DerivedSeedPair {
    fn drop(&mut self) {
        self.seed_p.zeroize();
        self.seed_q.zeroize();
    }
}

impl std::fmt::Debug for DerivedSeedPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSeedPair").finish_non_exhaustive()
    }
}

/// Derive the prime seed pair for one key generation.
///
/// Deterministic in its inputs; all randomness comes from the caller.
pub fn derive_seed_pair(inputs: &SeedInputs<'_>) -> DerivedSeedPair {
    let mut combined = Zeroizing::new(Vec::with_capacity(
        inputs.latent.len()
            + SYSTEM_ENTROPY_SIZE
            + inputs.timestamp.len()
            + inputs.load_sample.len(),
    ));
    combined.extend_from_slice(inputs.latent);
    combined.extend_from_slice(inputs.system_entropy);
    combined.extend_from_slice(inputs.timestamp.as_bytes());
    combined.extend_from_slice(inputs.load_sample.as_bytes());

    let mut derived = Zeroizing::new([0u8; DERIVED_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha512>(
        &combined,
        &inputs.system_entropy[..SALT_SIZE],
        PBKDF2_ITERATIONS,
        derived.as_mut_slice(),
    );

    DerivedSeedPair {
        seed_p: labelled_seed(&derived[..32], LABEL_P),
        seed_q: labelled_seed(&derived[32..], LABEL_Q),
    }
}

fn labelled_seed(half: &[u8], label: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(half);
    hasher.update(label);

    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}

/// Expand input key material to `len` bytes with HKDF-SHA256.
///
/// # Errors
///
/// - `KeyMaterialTooLong` if `len` exceeds [`MAX_EXPAND_SIZE`]
pub fn expand_key_material(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if len > MAX_EXPAND_SIZE {
        return Err(CryptoError::KeyMaterialTooLong { requested: len, max: MAX_EXPAND_SIZE });
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; len]);
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("length checked against HKDF-SHA256 maximum");
    };

    Ok(okm)
}
