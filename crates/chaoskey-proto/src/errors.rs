//! Container error types.
//!
//! Structural problems found while parsing are grouped under
//! [`ContainerError::Malformed`] so callers can tell "the bytes are not a
//! container" apart from "the container failed its integrity check".

use thiserror::Error;

/// Result alias for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors produced by the container codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// Input is not a well-formed container. Never retried.
    #[error("malformed container: {0}")]
    Malformed(#[from] MalformedReason),

    /// Recomputed HMAC tag does not match the stored tag.
    #[error("integrity check failed")]
    IntegrityCheckFailed,

    /// The configured keying convention cannot be satisfied by this container.
    #[error("tag key unavailable: need {needed} bytes of {source_field}, have {actual}")]
    TagKeyUnavailable {
        /// Field the key is taken from
        source_field: &'static str,
        /// Minimum bytes required
        needed: usize,
        /// Bytes present in the field
        actual: usize,
    },

    /// A field is larger than [`crate::MAX_CONTAINER_SIZE`].
    #[error("container field too large: {size} bytes (max {max})")]
    TooLarge {
        /// Size of the offending field
        size: usize,
        /// Maximum allowed size
        max: usize,
    },
}

impl ContainerError {
    /// True for decode-time structural violations.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::TooLarge { .. })
    }
}

/// Why a byte string was rejected as a container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Input ended before a complete element could be read.
    #[error("truncated: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the declared structure
        needed: usize,
        /// Bytes actually remaining
        available: usize,
    },

    /// An element carried an unexpected identifier byte.
    #[error("unexpected element tag {found:#04x} for {field} (expected {expected:#04x})")]
    UnexpectedTag {
        /// Field being parsed
        field: &'static str,
        /// Expected identifier byte
        expected: u8,
        /// Identifier byte found on the wire
        found: u8,
    },

    /// Declared length does not fit in the platform's address space.
    #[error("declared length overflows")]
    LengthOverflow,

    /// Length was not encoded in its shortest form.
    #[error("non-minimal length encoding")]
    NonMinimalLength,

    /// Sequence held the wrong number of fields.
    #[error("expected {expected} fields, found {found}")]
    FieldCount {
        /// Fields required by the layout
        expected: usize,
        /// Fields present
        found: usize,
    },

    /// Integer content had its sign bit set.
    #[error("negative integer in field {0}")]
    NegativeInteger(&'static str),

    /// Integer content was empty or had redundant leading zero bytes.
    #[error("non-minimal integer encoding in field {0}")]
    NonMinimalInteger(&'static str),

    /// Integrity tag was not exactly 32 bytes.
    #[error("integrity tag must be 32 bytes, got {0}")]
    TagLength(usize),

    /// Bytes remained after the outer sequence.
    #[error("{0} trailing bytes after container")]
    TrailingBytes(usize),
}
