//! Property-based tests for the AES-256-CBC engine

use chaoskey_crypto::{CryptoError, IV_SIZE, KEY_SIZE, SymmetricKey, decrypt_cbc, encrypt_cbc};
use proptest::prelude::*;

fn arbitrary_key() -> impl Strategy<Value = SymmetricKey> {
    any::<[u8; KEY_SIZE]>().prop_map(SymmetricKey::new)
}

#[test]
fn prop_round_trip_any_length() {
    proptest!(|(
        key in arbitrary_key(),
        iv in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..10_000),
    )| {
        let ciphertext = encrypt_cbc(&key, &iv, &plaintext);

        // PROPERTY: ciphertext is block aligned and strictly longer
        prop_assert_eq!(ciphertext.len() % 16, 0);
        prop_assert!(ciphertext.len() > plaintext.len());
        prop_assert!(ciphertext.len() <= plaintext.len() + 16);

        // PROPERTY: decrypt inverts encrypt
        let decrypted = decrypt_cbc(&key, &iv, &ciphertext).expect("round trip should decrypt");
        prop_assert_eq!(decrypted, plaintext);
    });
}

#[test]
fn symmetric_round_trip_every_length_up_to_ten_thousand() {
    let key = SymmetricKey::new([0x5C; KEY_SIZE]);
    let iv = [0xA3; IV_SIZE];
    let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i * 7 + 3) as u8).collect();

    for len in 0..10_000 {
        let ciphertext = encrypt_cbc(&key, &iv, &plaintext[..len]);
        let decrypted = decrypt_cbc(&key, &iv, &ciphertext).expect("round trip should decrypt");
        assert_eq!(decrypted, &plaintext[..len], "length {len}");
    }
}

#[test]
fn prop_iv_changes_ciphertext() {
    proptest!(|(
        key in arbitrary_key(),
        iv_a in any::<[u8; IV_SIZE]>(),
        iv_b in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
    )| {
        prop_assume!(iv_a != iv_b);

        // PROPERTY: same key and plaintext under different IVs differ in the
        // first block
        let a = encrypt_cbc(&key, &iv_a, &plaintext);
        let b = encrypt_cbc(&key, &iv_b, &plaintext);
        prop_assert_ne!(&a[..16], &b[..16]);
    });
}

#[test]
fn prop_wrong_key_never_returns_plaintext() {
    proptest!(|(
        key in arbitrary_key(),
        other in arbitrary_key(),
        iv in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 1..512),
    )| {
        prop_assume!(key.as_bytes() != other.as_bytes());

        let ciphertext = encrypt_cbc(&key, &iv, &plaintext);

        // PROPERTY: a wrong key either fails padding or yields different bytes
        match decrypt_cbc(&other, &iv, &ciphertext) {
            Err(err) => prop_assert_eq!(err, CryptoError::InvalidPadding),
            Ok(decrypted) => prop_assert_ne!(decrypted, plaintext),
        }
    });
}
