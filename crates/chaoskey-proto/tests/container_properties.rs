//! Property-based tests for container encoding/decoding
//!
//! Verifies the codec for arbitrary field contents, not just fixed examples:
//! lossless round trip, canonical sizing, tamper detection and graceful
//! rejection of corrupted input.

use chaoskey_proto::{Container, ContainerError, TagKeying, encode_container};
use num_bigint::BigUint;
use proptest::prelude::*;

/// Strategy for arbitrary-precision unsigned integers up to 4096 bits
fn arbitrary_biguint() -> impl Strategy<Value = BigUint> {
    prop::collection::vec(any::<u8>(), 0..512).prop_map(|bytes| BigUint::from_bytes_be(&bytes))
}

/// Strategy for sealed containers (entropy keying)
fn arbitrary_container() -> impl Strategy<Value = Container> {
    (
        arbitrary_biguint(),
        arbitrary_biguint(),
        prop::collection::vec(any::<u8>(), 0..1024),
        prop::collection::vec(any::<u8>(), 0..64),
        prop::collection::vec(any::<u8>(), 0..64),
    )
        .prop_map(|(n, e, ciphertext, timestamp, entropy)| {
            Container::seal(n, e, ciphertext, timestamp, entropy, TagKeying::Entropy)
                .expect("entropy keying accepts any entropy length")
        })
}

#[test]
fn prop_container_round_trip() {
    proptest!(|(container in arbitrary_container())| {
        let wire = container.to_bytes().expect("encode should succeed");
        let decoded = Container::decode(&wire).expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(&decoded, &container);
        prop_assert!(decoded.verify(TagKeying::Entropy).is_ok());
    });
}

#[test]
fn prop_encoding_is_canonical() {
    proptest!(|(container in arbitrary_container())| {
        let first = container.to_bytes().expect("encode should succeed");
        let decoded = Container::decode(&first).expect("decode should succeed");
        let second = decoded.to_bytes().expect("re-encode should succeed");

        // PROPERTY: decode then encode reproduces the same bytes
        prop_assert_eq!(first, second);
    });
}

#[test]
fn prop_free_function_matches_seal() {
    proptest!(|(
        n in arbitrary_biguint(),
        e in arbitrary_biguint(),
        ciphertext in prop::collection::vec(any::<u8>(), 0..256),
        entropy in prop::collection::vec(any::<u8>(), 0..64),
    )| {
        let timestamp = b"2024-06-01T12:00:00.123456".to_vec();
        let keying = TagKeying::TimestampPrefix;
        let wire = encode_container(&n, &e, &ciphertext, &timestamp, &entropy, keying)
            .expect("encode should succeed");
        let decoded = Container::decode(&wire).expect("decode should succeed");

        prop_assert_eq!(&decoded.n, &n);
        prop_assert_eq!(&decoded.e, &e);
        prop_assert!(decoded.verify(TagKeying::TimestampPrefix).is_ok());
    });
}

#[test]
fn prop_ciphertext_bit_flip_fails_integrity() {
    proptest!(|(
        container in arbitrary_container(),
        index in any::<prop::sample::Index>(),
        bit in 0u8..8,
    )| {
        prop_assume!(!container.ciphertext.is_empty());

        let mut tampered = container.clone();
        let i = index.index(tampered.ciphertext.len());
        tampered.ciphertext[i] ^= 1 << bit;

        let wire = tampered.to_bytes().expect("encode should succeed");
        let decoded = Container::decode(&wire).expect("structure is still valid");

        // PROPERTY: any single-bit change is caught by the tag
        prop_assert_eq!(
            decoded.verify(TagKeying::Entropy),
            Err(ContainerError::IntegrityCheckFailed)
        );
    });
}

#[test]
fn prop_truncation_never_decodes() {
    proptest!(|(container in arbitrary_container(), cut in any::<prop::sample::Index>())| {
        let wire = container.to_bytes().expect("encode should succeed");
        let cut = cut.index(wire.len());

        // PROPERTY: every strict prefix is rejected as malformed
        let result = Container::decode(&wire[..cut]);
        prop_assert!(matches!(result, Err(ref e) if e.is_malformed()));
    });
}

#[test]
fn prop_random_bytes_never_panic() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..2048))| {
        // PROPERTY: arbitrary input either decodes or errors, never panics
        let _ = Container::decode(&bytes);
    });
}
