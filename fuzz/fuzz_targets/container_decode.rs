//! Fuzz target for Container::decode
//!
//! Arbitrary bytes must decode or fail with a structured error, never panic.
//!
//! # Invariants
//!
//! - Decoding is canonical: anything that decodes re-encodes to the same bytes
//! - Oversized input is rejected before parsing

#![no_main]

use chaoskey_proto::{Container, ContainerError, MAX_CONTAINER_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match Container::decode(data) {
        Ok(container) => {
            let encoded = container.to_bytes().expect("decoded container must re-encode");
            assert_eq!(encoded, data, "decode accepted a non-canonical encoding");
        },
        Err(ContainerError::TooLarge { size, .. }) => assert!(size > MAX_CONTAINER_SIZE),
        Err(err) => assert!(err.is_malformed(), "unexpected decode error: {err}"),
    }
});
