//! Key generation tests at full width
//!
//! Drives the crypto half of the pipeline directly: seed derivation, the
//! concurrent prime search and key assembly.

use chaoskey_crypto::{
    BigUint, MODULUS_BITS, PRIME_BITS, PUBLIC_EXPONENT, PrimePool, RsaPrivateKey, SeedInputs,
    derive_seed_pair, ensure_distinct, sample_blinding_factor,
};
use num_integer::Integer;
use num_traits::One;
use proptest::prelude::*;

fn generate(pool: &PrimePool, entropy: &[u8; 32], latent: &[u8]) -> RsaPrivateKey {
    let seeds = derive_seed_pair(&SeedInputs {
        latent,
        system_entropy: entropy,
        timestamp: "2025-03-14T15:09:26.535897",
        load_sample: "0.25",
    });
    let (p, q) = pool.search_pair(&seeds).expect("prime search should succeed");
    let (p, q) = ensure_distinct(p, q);
    RsaPrivateKey::from_primes(p, q).expect("distinct primes should assemble")
}

fn assert_key_invariants(key: &RsaPrivateKey) {
    let (p, q) = key.primes();

    assert_eq!(key.n().bits(), MODULUS_BITS);
    assert_eq!(p.bits(), PRIME_BITS);
    assert_eq!(q.bits(), PRIME_BITS);
    assert_ne!(p, q);
    assert_eq!(key.e(), &BigUint::from(PUBLIC_EXPONENT));

    let phi = (p - 1u32) * (q - 1u32);
    assert!((key.e() * key.d()).mod_floor(&phi).is_one());
}

#[test]
fn full_width_keys_satisfy_invariants() {
    let pool = PrimePool::new(2, PRIME_BITS).unwrap();
    let latent = vec![0x3Cu8; 256];

    for i in 0..3u8 {
        let key = generate(&pool, &[i; 32], &latent);
        assert_key_invariants(&key);
    }
}

#[test]
#[ignore = "slow: one hundred full-width key generations"]
fn hundred_keys_satisfy_invariants() {
    let pool = PrimePool::new(4, PRIME_BITS).unwrap();
    let latent = vec![0x3Cu8; 256];

    let mut moduli = std::collections::HashSet::new();
    for i in 0..100u32 {
        let mut entropy = [0u8; 32];
        entropy[..4].copy_from_slice(&i.to_be_bytes());
        let key = generate(&pool, &entropy, &latent);
        assert_key_invariants(&key);
        assert!(moduli.insert(key.n().clone()), "duplicate modulus at key {i}");
    }
}

#[test]
fn same_inputs_same_key() {
    let pool = PrimePool::new(2, PRIME_BITS).unwrap();
    let latent = vec![0x10u8; 256];

    let a = generate(&pool, &[9; 32], &latent);
    let b = generate(&pool, &[9; 32], &latent);
    assert_eq!(a.n(), b.n());
}

#[test]
fn prop_small_keys_decrypt_what_they_encrypt() {
    let pool = PrimePool::new(2, 256).unwrap();

    proptest!(ProptestConfig::with_cases(16), |(
        entropy in any::<[u8; 32]>(),
        message in prop::collection::vec(1u8..=255, 1..48),
    )| {
        let seeds = derive_seed_pair(&SeedInputs {
            latent: &[0u8; 64],
            system_entropy: &entropy,
            timestamp: "2025-03-14T15:09:26.535897",
            load_sample: "1.00",
        });
        let (p, q) = pool.search_pair(&seeds).expect("prime search should succeed");
        let (p, q) = ensure_distinct(p, q);
        let key = RsaPrivateKey::from_primes(p, q).expect("distinct primes should assemble");

        let ciphertext = key.to_public_key().encrypt_raw(&message).expect("message fits");
        let mut counter = entropy[0];
        let r = sample_blinding_factor(key.n(), |buf| {
            for byte in buf.iter_mut() {
                counter = counter.wrapping_add(101);
                *byte = counter;
            }
        })
        .expect("blinding factor");

        // PROPERTY: blinded decryption inverts raw encryption
        prop_assert_eq!(key.decrypt_blinded(&ciphertext, &r).expect("decrypt"), message);
    });
}
