//! Fuzz target for SecureDecryptor::decrypt
//!
//! # Strategy
//!
//! - Raw bytes straight into the decryptor
//! - Well-formed, correctly tagged containers carrying arbitrary ciphertext
//!   under the decryptor's own key
//!
//! # Invariants
//!
//! - Never panics
//! - Raw bytes that fail the integrity gate never reach RSA arithmetic, so
//!   only container errors come back
//! - A correctly tagged container under the right key either decrypts or is
//!   rejected as `CiphertextOutOfRange`

#![no_main]

use std::{sync::LazyLock, time::Duration};

use arbitrary::Arbitrary;
use chaoskey_core::{ErrorKind, SecureDecryptor, SeededEnv, ServiceError};
use chaoskey_crypto::{RsaPrivateKey, prime_from_seed};
use chaoskey_proto::{TagKeying, encode_container};
use libfuzzer_sys::fuzz_target;

static KEY: LazyLock<RsaPrivateKey> = LazyLock::new(|| {
    let p = prime_from_seed(&[0x11; 32], 256).expect("seeded prime");
    let q = prime_from_seed(&[0x22; 32], 256).expect("seeded prime");
    RsaPrivateKey::from_primes(p, q).expect("distinct seeded primes")
});

static DECRYPTOR: LazyLock<SecureDecryptor<SeededEnv>> =
    LazyLock::new(|| SecureDecryptor::new(SeededEnv::new(0), TagKeying::Entropy, Duration::ZERO));

#[derive(Debug, Arbitrary)]
enum Input {
    Raw(Vec<u8>),
    Tagged { ciphertext: Vec<u8>, entropy: Vec<u8> },
}

fuzz_target!(|input: Input| {
    let key = &*KEY;
    match input {
        Input::Raw(bytes) => {
            if let Err(err) = DECRYPTOR.decrypt(&bytes, Some(key)) {
                assert!(
                    matches!(err, ServiceError::Container(_) | ServiceError::KeyMismatch),
                    "unexpected error for raw bytes: {err}"
                );
            }
        },
        Input::Tagged { ciphertext, entropy } => {
            let container = encode_container(
                key.n(),
                key.e(),
                &ciphertext,
                b"2025-01-01T00:00:00.000000",
                &entropy,
                TagKeying::Entropy,
            )
            .expect("small container must encode");

            match DECRYPTOR.decrypt(&container, Some(key)) {
                Ok(_) => {},
                Err(err) => assert_eq!(err.kind(), ErrorKind::CiphertextOutOfRange),
            }
        },
    }
});
