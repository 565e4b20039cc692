//! Fuzz target for the container integrity gate
//!
//! # Strategy
//!
//! - Seal arbitrary fields under either keying convention
//! - Flip one bit of the encoded ciphertext or tag
//!
//! # Invariants
//!
//! - An untouched container verifies under the keying it was sealed with
//! - A flipped ciphertext or tag bit MUST fail with `IntegrityCheckFailed`
//! - Decoding tampered bytes never panics

#![no_main]

use arbitrary::Arbitrary;
use chaoskey_crypto::BigUint;
use chaoskey_proto::{Container, ContainerError, TIMESTAMP_KEY_SIZE, TagKeying};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    ciphertext: Vec<u8>,
    timestamp: Vec<u8>,
    entropy: Vec<u8>,
    n: Vec<u8>,
    e: u32,
    timestamp_keyed: bool,
    target: Target,
    bit: u16,
}

#[derive(Debug, Arbitrary)]
enum Target {
    Ciphertext,
    Tag,
}

fuzz_target!(|input: Input| {
    let keying =
        if input.timestamp_keyed { TagKeying::TimestampPrefix } else { TagKeying::Entropy };

    let sealed = Container::seal(
        BigUint::from_bytes_be(&input.n),
        BigUint::from(input.e),
        input.ciphertext,
        input.timestamp,
        input.entropy,
        keying,
    );
    let container = match sealed {
        Ok(container) => container,
        Err(ContainerError::TagKeyUnavailable { needed, actual, .. }) => {
            assert_eq!(needed, TIMESTAMP_KEY_SIZE);
            assert!(actual < needed);
            return;
        },
        Err(err) => panic!("seal failed: {err}"),
    };
    container.verify(keying).expect("fresh container must verify");

    let mut tampered = container.clone();
    let field: &mut [u8] = match input.target {
        Target::Ciphertext => &mut tampered.ciphertext,
        Target::Tag => &mut tampered.tag,
    };
    if field.is_empty() {
        return;
    }
    let bit = usize::from(input.bit) % (field.len() * 8);
    field[bit / 8] ^= 1 << (bit % 8);

    let bytes = tampered.to_bytes().expect("tampered container must encode");
    let decoded = Container::decode(&bytes).expect("tampered container must decode");
    assert_eq!(decoded.verify(keying), Err(ContainerError::IntegrityCheckFailed));
});
