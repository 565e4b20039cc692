//! Service error types.
//!
//! [`ServiceError`] wraps the per-crate errors and adds the failures that
//! only exist at the service boundary (missing keys, configuration names).
//! Callers branch on [`ServiceError::kind`] rather than matching nested
//! enums.

use chaoskey_crypto::CryptoError;
use chaoskey_latent::LatentError;
use chaoskey_proto::ContainerError;
use thiserror::Error;

/// Errors surfaced by the chaoskey service.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Container could not be decoded, encoded or verified.
    ///
    /// Integrity failures are fatal for that container. Never retried.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// Cryptographic primitive rejected its input.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Prime search or key assembly failed for one generation.
    ///
    /// The generation is abandoned as a whole; nothing is stored.
    #[error("key generation failed: {0}")]
    KeyGen(#[source] CryptoError),

    /// Encoder training or latent image production failed.
    #[error("latent source error: {0}")]
    Latent(#[from] LatentError),

    /// No key is stored under this identifier.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// RSA decryption was requested without a private key.
    #[error("private key required for RSA decryption")]
    MissingPrivateKey,

    /// The container names a different public key than the one supplied.
    #[error("container public key does not match the private key")]
    KeyMismatch,

    /// Entropy source name is not recognised.
    #[error("unknown entropy source: {0}")]
    UnknownEntropySource(String),

    /// Core kind name is not recognised.
    #[error("unknown core: {0}")]
    UnknownCore(String),
}

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bytes are not a well-formed container
    MalformedContainer,
    /// Container tag did not verify
    IntegrityCheckFailed,
    /// Required modular inverse does not exist
    NoInverse,
    /// Key generation failed
    KeyGen,
    /// Unknown key identifier
    KeyNotFound,
    /// Symmetric key or requested key material has the wrong length
    InvalidKeyLength,
    /// IV is not 16 bytes
    InvalidIvLength,
    /// Symmetric ciphertext did not unpad
    InvalidPadding,
    /// RSA decrypt without a private key
    MissingPrivateKey,
    /// Container and private key disagree
    KeyMismatch,
    /// RSA ciphertext integer is not below the modulus
    CiphertextOutOfRange,
    /// RSA plaintext cannot be represented below the modulus
    PlaintextOutOfRange,
    /// Unrecognised entropy source name
    UnknownEntropySource,
    /// Unrecognised core name
    UnknownCore,
    /// Encoder training failed
    Training,
    /// Internal failure (worker pool, blinding)
    Internal,
}

impl ServiceError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Container(ContainerError::IntegrityCheckFailed) => {
                ErrorKind::IntegrityCheckFailed
            },
            Self::Container(_) => ErrorKind::MalformedContainer,
            Self::Crypto(err) => crypto_kind(err),
            Self::KeyGen(CryptoError::NoInverse { .. }) => ErrorKind::NoInverse,
            Self::KeyGen(_) | Self::Latent(LatentError::ImagesExhausted { .. }) => {
                ErrorKind::KeyGen
            },
            Self::Latent(_) => ErrorKind::Training,
            Self::KeyNotFound(_) => ErrorKind::KeyNotFound,
            Self::MissingPrivateKey => ErrorKind::MissingPrivateKey,
            Self::KeyMismatch => ErrorKind::KeyMismatch,
            Self::UnknownEntropySource(_) => ErrorKind::UnknownEntropySource,
            Self::UnknownCore(_) => ErrorKind::UnknownCore,
        }
    }

    /// True if the caller supplied bad input rather than the service
    /// failing internally.
    pub fn is_client_error(&self) -> bool {
        !matches!(self.kind(), ErrorKind::KeyGen | ErrorKind::Training | ErrorKind::Internal)
    }
}

fn crypto_kind(err: &CryptoError) -> ErrorKind {
    match err {
        CryptoError::NoInverse { .. } => ErrorKind::NoInverse,
        CryptoError::PrimeSearch { .. } | CryptoError::EqualPrimes => ErrorKind::KeyGen,
        CryptoError::InvalidKeyLength { .. } | CryptoError::KeyMaterialTooLong { .. } => {
            ErrorKind::InvalidKeyLength
        },
        CryptoError::InvalidIvLength { .. } => ErrorKind::InvalidIvLength,
        CryptoError::InvalidPadding => ErrorKind::InvalidPadding,
        CryptoError::PlaintextOutOfRange { .. } => ErrorKind::PlaintextOutOfRange,
        CryptoError::CiphertextOutOfRange => ErrorKind::CiphertextOutOfRange,
        CryptoError::Pool(_) | CryptoError::BlindingFailed => ErrorKind::Internal,
    }
}
