//! Error types for chaoskey cryptographic primitives.

use thiserror::Error;

/// Errors from prime search, key assembly and the cipher engines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A modular inverse required by key assembly does not exist.
    ///
    /// Unreachable for valid random primes in practice; treated as fatal for
    /// the key generation that hit it.
    #[error("no modular inverse: {context}")]
    NoInverse {
        /// Which inverse was being computed
        context: &'static str,
    },

    /// Prime search produced a value outside the requested width.
    #[error("prime search failed: {reason}")]
    PrimeSearch {
        /// What went wrong
        reason: String,
    },

    /// Key assembly was handed identical primes.
    #[error("primes must be distinct")]
    EqualPrimes,

    /// Worker pool could not be created.
    #[error("worker pool: {0}")]
    Pool(String),

    /// Symmetric key is not exactly 32 bytes.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },

    /// IV is not exactly 16 bytes.
    #[error("invalid IV length: expected {expected} bytes, got {actual}")]
    InvalidIvLength {
        /// Required IV length
        expected: usize,
        /// Supplied IV length
        actual: usize,
    },

    /// PKCS7 padding bytes are inconsistent (or ciphertext is not block
    /// aligned).
    #[error("invalid padding")]
    InvalidPadding,

    /// Plaintext cannot be represented as an RSA message for this modulus.
    #[error("plaintext out of range: {reason}")]
    PlaintextOutOfRange {
        /// Why the plaintext was rejected
        reason: &'static str,
    },

    /// Ciphertext integer is not below the modulus.
    #[error("ciphertext out of range for modulus")]
    CiphertextOutOfRange,

    /// Blinding factor shares a factor with the modulus.
    #[error("blinding factor is not invertible")]
    BlindingFailed,

    /// HKDF output length not supported.
    #[error("requested {requested} bytes of key material, max {max}")]
    KeyMaterialTooLong {
        /// Requested length
        requested: usize,
        /// Maximum HKDF-SHA256 output
        max: usize,
    },
}
