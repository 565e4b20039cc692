//! chaoskey Cryptographic Primitives
//!
//! Building blocks for chaoskey key generation and encryption. Everything
//! here is a pure function of its inputs: callers supply random bytes,
//! timestamps and load samples, which keeps key generation reproducible
//! under a seeded environment.
//!
//! # Key Generation
//!
//! ```text
//! latent ‖ system entropy ‖ timestamp ‖ load
//!        │
//!        ▼
//! PBKDF2-HMAC-SHA512 → (seed_p, seed_q)
//!        │
//!        ▼
//! PrimePool: prime_from_seed(seed_p) ∥ prime_from_seed(seed_q)
//!        │
//!        ▼
//! ensure_distinct → RsaPrivateKey::from_primes
//! ```
//!
//! # Security
//!
//! Seeds:
//! - Derived seed pairs are zeroized on drop and never reused
//! - p and q come from disjoint halves of the KDF output with distinct labels
//!
//! Decryption:
//! - RSA is unpadded; integrity comes from the container tag, checked first
//! - Private exponentiation runs on a blinded ciphertext
//!
//! Symmetric:
//! - AES-256-CBC with PKCS7; the caller must supply a fresh IV per message
//! - Key bytes are zeroized on drop

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod derivation;
pub mod error;
pub mod pool;
pub mod primes;
pub mod rsa;
pub mod symmetric;

pub use derivation::{
    DerivedSeedPair, PBKDF2_ITERATIONS, SALT_SIZE, SYSTEM_ENTROPY_SIZE, SeedInputs,
    derive_seed_pair, expand_key_material,
};
pub use error::CryptoError;
pub use pool::PrimePool;
pub use primes::{MILLER_RABIN_ROUNDS, is_probable_prime, next_prime, prime_from_seed};
pub use rsa::{
    MODULUS_BITS, PRIME_BITS, PUBLIC_EXPONENT, RsaPrivateKey, RsaPublicKey, ensure_distinct,
    sample_blinding_factor,
};
pub use symmetric::{IV_SIZE, KEY_SIZE, SymmetricKey, decrypt_cbc, encrypt_cbc};

/// Re-exported so downstream crates name the same big-integer type.
pub use num_bigint::BigUint;
