//! RSA key material and raw RSA operations.
//!
//! Messages are encrypted as integers without padding: the plaintext bytes
//! are read big-endian, raised to `e` and written back left-padded to the
//! modulus width. Decryption returns the minimal big-endian encoding of the
//! recovered integer, so a plaintext round-trips exactly when it has no
//! leading zero byte (enforced on encrypt).
//!
//! # Security
//!
//! Unpadded RSA is malleable and deterministic. Ciphertexts produced here are
//! always carried inside an HMAC-tagged container and decrypted only after
//! the tag verifies.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};

use crate::{error::CryptoError, primes::next_prime_after_gap};

/// Public exponent for every generated key.
pub const PUBLIC_EXPONENT: u32 = 65537;

/// Modulus width in bits.
pub const MODULUS_BITS: u64 = 2048;

/// Width of each prime factor.
pub const PRIME_BITS: u64 = MODULUS_BITS / 2;

/// Attempts at drawing a blinding factor before giving up.
const BLINDING_ATTEMPTS: usize = 64;

/// RSA public key `(n, e)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
}

impl RsaPublicKey {
    /// Create a public key from its components.
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// Modulus.
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// Public exponent.
    pub fn e(&self) -> &BigUint {
        &self.e
    }

    /// Modulus width in bytes.
    pub fn size(&self) -> usize {
        self.n.bits().div_ceil(8) as usize
    }

    /// Encrypt a message as an unpadded RSA integer.
    ///
    /// Output is exactly [`Self::size`] bytes.
    ///
    /// # Errors
    ///
    /// - `PlaintextOutOfRange` for an empty message, a message with a leading
    ///   zero byte (it would not survive decryption), or one whose integer
    ///   value is not below `n`
    pub fn encrypt_raw(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match plaintext.first() {
            None => return Err(CryptoError::PlaintextOutOfRange { reason: "empty plaintext" }),
            Some(0) => {
                return Err(CryptoError::PlaintextOutOfRange { reason: "leading zero byte" });
            },
            Some(_) => {},
        }

        let m = BigUint::from_bytes_be(plaintext);
        if m >= self.n {
            return Err(CryptoError::PlaintextOutOfRange { reason: "message exceeds modulus" });
        }

        let c = m.modpow(&self.e, &self.n);
        Ok(left_pad(&c, self.size()))
    }
}

/// RSA private key with CRT parameters.
///
/// # Invariants
///
/// - `n = p * q`, `p != q`
/// - `e * d ≡ 1 (mod (p-1)(q-1))`
/// - `dp = d mod (p-1)`, `dq = d mod (q-1)`, `qinv = q^-1 mod p`
#[derive(Clone, PartialEq, Eq)]
pub struct RsaPrivateKey {
    n: BigUint,
    e: BigUint,
    d: BigUint,
    p: BigUint,
    q: BigUint,
    dp: BigUint,
    dq: BigUint,
    qinv: BigUint,
}

impl RsaPrivateKey {
    /// Assemble a key from two distinct primes and the fixed exponent.
    ///
    /// # Errors
    ///
    /// - `EqualPrimes` if `p == q`
    /// - `NoInverse` if `e` is not invertible mod φ or `q` is not invertible
    ///   mod `p`
    pub fn from_primes(p: BigUint, q: BigUint) -> Result<Self, CryptoError> {
        if p == q {
            return Err(CryptoError::EqualPrimes);
        }

        let e = BigUint::from(PUBLIC_EXPONENT);
        let p1 = &p - 1u32;
        let q1 = &q - 1u32;
        let phi = &p1 * &q1;

        let d = e.modinv(&phi).ok_or(CryptoError::NoInverse { context: "e mod phi" })?;
        let qinv = q.modinv(&p).ok_or(CryptoError::NoInverse { context: "q mod p" })?;
        let dp = &d % &p1;
        let dq = &d % &q1;
        let n = &p * &q;

        Ok(Self { n, e, d, p, q, dp, dq, qinv })
    }

    /// Public half of this key.
    pub fn to_public_key(&self) -> RsaPublicKey {
        RsaPublicKey::new(self.n.clone(), self.e.clone())
    }

    /// Modulus.
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// Public exponent.
    pub fn e(&self) -> &BigUint {
        &self.e
    }

    /// Private exponent.
    pub fn d(&self) -> &BigUint {
        &self.d
    }

    /// Prime factors `(p, q)`.
    pub fn primes(&self) -> (&BigUint, &BigUint) {
        (&self.p, &self.q)
    }

    /// CRT exponents `(d mod (p-1), d mod (q-1))`.
    pub fn crt_exponents(&self) -> (&BigUint, &BigUint) {
        (&self.dp, &self.dq)
    }

    /// CRT coefficient `q^-1 mod p`.
    pub fn crt_coefficient(&self) -> &BigUint {
        &self.qinv
    }

    /// True if `(n, e)` is this key's public half.
    pub fn matches(&self, n: &BigUint, e: &BigUint) -> bool {
        self.n == *n && self.e == *e
    }

    /// Decrypt with multiplicative blinding.
    ///
    /// `r` must be in `[2, n-2]` and coprime to `n`; see
    /// [`sample_blinding_factor`]. The private exponentiation only ever sees
    /// `c * r^e`, which is uniformly distributed and unrelated to `c`.
    ///
    /// # Errors
    ///
    /// - `CiphertextOutOfRange` if the ciphertext integer is not below `n`
    /// - `BlindingFailed` if `r` has no inverse mod `n`
    pub fn decrypt_blinded(&self, ciphertext: &[u8], r: &BigUint) -> Result<Vec<u8>, CryptoError> {
        let c = BigUint::from_bytes_be(ciphertext);
        if c >= self.n {
            return Err(CryptoError::CiphertextOutOfRange);
        }

        let r_inv = r.modinv(&self.n).ok_or(CryptoError::BlindingFailed)?;
        let blinded = (c * r.modpow(&self.e, &self.n)) % &self.n;
        let m_blinded = self.crt_exp(&blinded);
        let m = (m_blinded * r_inv) % &self.n;

        Ok(minimal_bytes(&m))
    }

    /// `c^d mod n` via the CRT parameters.
    fn crt_exp(&self, c: &BigUint) -> BigUint {
        let m1 = c.modpow(&self.dp, &self.p);
        let m2 = c.modpow(&self.dq, &self.q);
        let diff = (&m1 + &self.p - (&m2 % &self.p)) % &self.p;
        let h = (&self.qinv * diff) % &self.p;
        m2 + h * &self.q
    }
}

impl std::fmt::Debug for RsaPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKey")
            .field("bits", &self.n.bits())
            .field("e", &self.e)
            .finish_non_exhaustive()
    }
}

/// Separate a colliding prime pair.
///
/// Returns `(p, q)` unchanged when distinct; otherwise replaces `q` with the
/// smallest prime strictly greater than `q + 2`.
pub fn ensure_distinct(p: BigUint, q: BigUint) -> (BigUint, BigUint) {
    if p != q {
        return (p, q);
    }

    tracing::warn!("prime search returned identical primes; advancing q");
    let q = next_prime_after_gap(&q);
    (p, q)
}

/// Draw a blinding factor uniform in `[2, n-2]` and coprime to `n`.
///
/// `fill` supplies random bytes. Rejection sampling keeps the draw unbiased
/// enough for blinding; a factor sharing a prime with `n` is astronomically
/// unlikely but still rejected.
///
/// # Errors
///
/// - `BlindingFailed` if no usable factor was drawn within the attempt limit
///   (only possible for a degenerate `n` or a broken random source)
pub fn sample_blinding_factor(
    n: &BigUint,
    mut fill: impl FnMut(&mut [u8]),
) -> Result<BigUint, CryptoError> {
    let four = BigUint::from(4u32);
    if *n <= four {
        return Err(CryptoError::BlindingFailed);
    }

    let span = n - 3u32;
    let mut bytes = vec![0u8; n.bits().div_ceil(8) as usize + 8];

    for _ in 0..BLINDING_ATTEMPTS {
        fill(&mut bytes);
        let r = BigUint::from_bytes_be(&bytes) % &span + 2u32;
        if r.gcd(n).is_one() {
            return Ok(r);
        }
    }

    Err(CryptoError::BlindingFailed)
}

/// Big-endian bytes of `value` left-padded with zeros to `len`.
fn left_pad(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; len.saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

/// Minimal big-endian bytes; empty for zero.
fn minimal_bytes(value: &BigUint) -> Vec<u8> {
    if value.is_zero() { Vec::new() } else { value.to_bytes_be() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::prime_from_seed;

    /// Small but real key for fast tests.
    fn test_key() -> RsaPrivateKey {
        let p = prime_from_seed(&[1u8; 32], 256).unwrap();
        let q = prime_from_seed(&[2u8; 32], 256).unwrap();
        RsaPrivateKey::from_primes(p, q).unwrap()
    }

    fn counter_fill() -> impl FnMut(&mut [u8]) {
        let mut counter = 0u8;
        move |buf: &mut [u8]| {
            for byte in buf.iter_mut() {
                counter = counter.wrapping_mul(31).wrapping_add(17);
                *byte = counter;
            }
        }
    }

    #[test]
    fn key_invariants_hold() {
        let key = test_key();
        let (p, q) = key.primes();
        assert_eq!(key.n(), &(p * q));
        assert_eq!(key.n().bits(), 512);
        assert_ne!(p, q);

        let phi = (p - 1u32) * (q - 1u32);
        assert!(((key.e() * key.d()) % &phi).is_one());

        let (dp, dq) = key.crt_exponents();
        assert_eq!(dp, &(key.d() % (p - 1u32)));
        assert_eq!(dq, &(key.d() % (q - 1u32)));
        assert!(((key.crt_coefficient() * q) % p).is_one());
    }

    #[test]
    fn equal_primes_rejected() {
        let p = prime_from_seed(&[1u8; 32], 128).unwrap();
        assert_eq!(RsaPrivateKey::from_primes(p.clone(), p), Err(CryptoError::EqualPrimes));
    }

    #[test]
    fn ensure_distinct_moves_q() {
        let p = prime_from_seed(&[1u8; 32], 128).unwrap();
        let (p2, q) = ensure_distinct(p.clone(), p.clone());
        assert_eq!(p2, p);
        assert!(q > &p + 2u32);

        let other = prime_from_seed(&[2u8; 32], 128).unwrap();
        let (a, b) = ensure_distinct(p.clone(), other.clone());
        assert_eq!((a, b), (p, other));
    }

    #[test]
    fn raw_round_trip() {
        let key = test_key();
        let public = key.to_public_key();
        let r = sample_blinding_factor(key.n(), counter_fill()).unwrap();

        let ciphertext = public.encrypt_raw(b"hello world").unwrap();
        assert_eq!(ciphertext.len(), public.size());

        let plaintext = key.decrypt_blinded(&ciphertext, &r).unwrap();
        assert_eq!(plaintext, b"hello world");
    }

    #[test]
    fn blinding_does_not_change_result() {
        let key = test_key();
        let ciphertext = key.to_public_key().encrypt_raw(b"\x01\x02\x03").unwrap();

        let mut fill = counter_fill();
        for _ in 0..5 {
            let r = sample_blinding_factor(key.n(), &mut fill).unwrap();
            assert_eq!(key.decrypt_blinded(&ciphertext, &r).unwrap(), vec![1, 2, 3]);
        }
    }

    #[test]
    fn crt_matches_plain_exponentiation() {
        let key = test_key();
        let c = BigUint::from(123_456_789u64);
        assert_eq!(key.crt_exp(&c), c.modpow(key.d(), key.n()));
    }

    #[test]
    fn encrypt_rejects_unrepresentable_plaintexts() {
        let public = test_key().to_public_key();

        assert!(matches!(public.encrypt_raw(b""), Err(CryptoError::PlaintextOutOfRange { .. })));
        assert!(matches!(
            public.encrypt_raw(b"\x00abc"),
            Err(CryptoError::PlaintextOutOfRange { .. })
        ));

        let too_big = vec![0xFF; public.size()];
        assert!(matches!(
            public.encrypt_raw(&too_big),
            Err(CryptoError::PlaintextOutOfRange { .. })
        ));
    }

    #[test]
    fn decrypt_rejects_ciphertext_above_modulus() {
        let key = test_key();
        let r = sample_blinding_factor(key.n(), counter_fill()).unwrap();
        let oversized = left_pad(&(key.n() + 1u32), key.to_public_key().size());

        assert_eq!(key.decrypt_blinded(&oversized, &r), Err(CryptoError::CiphertextOutOfRange));
    }

    #[test]
    fn decrypt_zero_is_empty() {
        let key = test_key();
        let r = sample_blinding_factor(key.n(), counter_fill()).unwrap();
        assert_eq!(key.decrypt_blinded(&[0u8; 64], &r).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn blinding_factor_in_range_and_coprime() {
        let key = test_key();
        let mut fill = counter_fill();
        for _ in 0..20 {
            let r = sample_blinding_factor(key.n(), &mut fill).unwrap();
            assert!(r >= BigUint::from(2u32));
            assert!(r <= key.n() - 2u32);
            assert!(r.gcd(key.n()).is_one());
        }
    }

    #[test]
    fn blinding_rejects_degenerate_modulus() {
        assert_eq!(
            sample_blinding_factor(&BigUint::from(4u32), counter_fill()),
            Err(CryptoError::BlindingFailed)
        );
    }

    #[test]
    fn debug_redacts_private_components() {
        let key = test_key();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("bits: 512"));
        assert!(!rendered.contains(&key.d().to_string()));
    }

    #[test]
    fn matches_checks_both_components() {
        let key = test_key();
        assert!(key.matches(key.n(), key.e()));
        assert!(!key.matches(key.n(), &BigUint::from(3u32)));
        assert!(!key.matches(&(key.n() + 2u32), key.e()));
    }
}
