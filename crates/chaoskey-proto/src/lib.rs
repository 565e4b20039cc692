//! chaoskey container codec.
//!
//! Canonical binary encoding for RSA ciphertext together with the key
//! metadata needed to verify and decrypt it. The container is a DER-style
//! SEQUENCE of six length-prefixed fields; see [`container`] for the layout.
//!
//! # Security
//!
//! Decoding provides structural validity only. It guarantees every field was
//! length-prefixed, in order, canonical, and that no bytes trail the
//! sequence. It does NOT check the integrity tag: callers must run
//! [`Container::verify`] before trusting the ciphertext, and must do so
//! before any private-key operation.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod container;
pub mod der;
pub mod errors;

pub use container::{
    Container, FIELD_COUNT, MAX_CONTAINER_SIZE, TAG_SIZE, TIMESTAMP_KEY_SIZE, TagKeying,
    compute_tag, encode_container, verify_tag,
};
pub use errors::{ContainerError, MalformedReason, Result};
