//! Deterministic prime search.
//!
//! A 256-bit seed keys a ChaCha20 stream. The first bytes of the stream
//! become the starting candidate; the rest supply Miller–Rabin witnesses. The
//! search is therefore a pure function of `(seed, bits)`, and two searches
//! share no mutable state.
//!
//! # Security Properties
//!
//! - Width: the two top bits of every candidate are set, so the product of
//!   two `bits`-wide primes is exactly `2 * bits` wide.
//! - Error bound: [`MILLER_RABIN_ROUNDS`] rounds give a false-positive
//!   probability below 2^-48 for adversarial inputs, far lower for random
//!   candidates.

use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use rand_chacha::{
    ChaCha20Rng,
    rand_core::{RngCore, SeedableRng},
};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

/// Miller–Rabin rounds per candidate that survives the sieve.
pub const MILLER_RABIN_ROUNDS: usize = 24;

/// Small primes below this bound are used for trial division.
const SIEVE_LIMIT: u32 = 2000;

/// Odd primes below [`SIEVE_LIMIT`].
fn small_primes() -> &'static [u32] {
    static PRIMES: OnceLock<Vec<u32>> = OnceLock::new();
    PRIMES.get_or_init(|| {
        let limit = SIEVE_LIMIT as usize;
        let mut composite = vec![false; limit];
        let mut primes = Vec::new();
        for i in 2..limit {
            if composite[i] {
                continue;
            }
            if i > 2 {
                primes.push(i as u32);
            }
            let mut j = i * i;
            while j < limit {
                composite[j] = true;
                j += i;
            }
        }
        primes
    })
}

/// Probabilistic primality test (trial division, then Miller–Rabin).
pub fn is_probable_prime(n: &BigUint, rounds: usize, rng: &mut impl RngCore) -> bool {
    if let Some(small) = n.to_u32() {
        if small < 2 {
            return false;
        }
        if small == 2 {
            return true;
        }
    }
    if !n.bit(0) {
        return false;
    }

    for &p in small_primes() {
        if *n == BigUint::from(p) {
            return true;
        }
        if (n % p).is_zero() {
            return false;
        }
    }

    miller_rabin(n, rounds, rng)
}

/// Miller–Rabin on an odd `n` greater than every sieve prime.
fn miller_rabin(n: &BigUint, rounds: usize, rng: &mut impl RngCore) -> bool {
    let one = BigUint::one();
    let two = BigUint::from(2u32);
    let n_minus_one = n - 1u32;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for _ in 0..rounds {
        let a = random_witness(n, rng);
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = x.modpow(&two, n);
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }

    true
}

/// Uniform-enough witness in `[2, n - 2]`.
fn random_witness(n: &BigUint, rng: &mut impl RngCore) -> BigUint {
    let span = n - 3u32;
    let mut bytes = vec![0u8; n.bits().div_ceil(8) as usize + 8];
    rng.fill_bytes(&mut bytes);
    BigUint::from_bytes_be(&bytes) % span + 2u32
}

/// Smallest probable prime `>= start`.
///
/// Odd candidates are pre-filtered with an incremental sieve: residues modulo
/// each small prime are computed once, then advanced arithmetically instead of
/// re-dividing the big integer for every candidate.
pub fn next_prime(start: &BigUint, rng: &mut impl RngCore) -> BigUint {
    let mut base = start.clone();
    if base <= BigUint::from(2u32) {
        return BigUint::from(2u32);
    }
    if !base.bit(0) {
        base += 1u32;
    }

    // Below the sieve bound a candidate can equal its own sieve prime.
    if base.bits() <= 32 {
        while !is_probable_prime(&base, MILLER_RABIN_ROUNDS, rng) {
            base += 2u32;
        }
        return base;
    }

    let primes = small_primes();
    let residues: Vec<u64> =
        primes.iter().map(|&p| (&base % p).to_u64().unwrap_or_default()).collect();

    let mut delta: u64 = 0;
    loop {
        let survives =
            primes.iter().zip(&residues).all(|(&p, &r)| (r + delta) % u64::from(p) != 0);
        if survives {
            let candidate = &base + delta;
            if miller_rabin(&candidate, MILLER_RABIN_ROUNDS, rng) {
                return candidate;
            }
        }
        delta += 2;
    }
}

/// Starting candidate for a seed: `bits` wide, top two bits set, odd.
pub fn candidate_from_seed(seed: &[u8; 32], bits: u64) -> BigUint {
    let mut rng = ChaCha20Rng::from_seed(*seed);
    candidate_from_stream(&mut rng, bits)
}

fn candidate_from_stream(rng: &mut ChaCha20Rng, bits: u64) -> BigUint {
    debug_assert!(bits >= 3, "candidate needs room for two forced top bits");

    let mut bytes = vec![0u8; bits.div_ceil(8) as usize];
    rng.fill_bytes(&mut bytes);

    let mut candidate = BigUint::from_bytes_be(&bytes) % (BigUint::one() << bits);
    candidate.set_bit(bits - 1, true);
    candidate.set_bit(bits - 2, true);
    candidate.set_bit(0, true);
    candidate
}

/// Deterministic `bits`-wide prime for a 256-bit seed.
///
/// Returns the smallest probable prime `>=` the seed's candidate.
///
/// # Errors
///
/// - `PrimeSearch` if the next prime overflows the requested width
pub fn prime_from_seed(seed: &[u8; 32], bits: u64) -> Result<BigUint, CryptoError> {
    let mut rng = ChaCha20Rng::from_seed(*seed);
    let candidate = candidate_from_stream(&mut rng, bits);
    let prime = next_prime(&candidate, &mut rng);

    if prime.bits() != bits {
        return Err(CryptoError::PrimeSearch {
            reason: format!("prime has {} bits, expected {bits}", prime.bits()),
        });
    }

    tracing::trace!(bits, distance = %(&prime - &candidate), "prime found");
    Ok(prime)
}

/// Smallest probable prime strictly greater than `value + 2`.
///
/// Used to separate a colliding prime pair. Witnesses are keyed by the value
/// itself so the result stays deterministic.
pub fn next_prime_after_gap(value: &BigUint) -> BigUint {
    let mut key = [0u8; 32];
    key.copy_from_slice(&Sha256::digest(value.to_bytes_be()));
    let mut rng = ChaCha20Rng::from_seed(key);
    next_prime(&(value + 3u32), &mut rng)
}
