//! RSA ciphertext container.
//!
//! Layout on the wire (all elements DER-style TLV, in this exact order):
//!
//! ```text
//! SEQUENCE {
//!     ciphertext  OCTET STRING
//!     timestamp   OCTET STRING
//!     entropy     OCTET STRING
//!     n           INTEGER
//!     e           INTEGER
//!     tag         OCTET STRING (32 bytes, HMAC-SHA256 over ciphertext)
//! }
//! ```
//!
//! # Invariants
//!
//! - Round trip: `decode(encode(c)) == c` for every container whose fields
//!   fit under [`MAX_CONTAINER_SIZE`].
//! - Canonical: one container has exactly one byte encoding.
//! - Tag binding: `tag` is the HMAC of `ciphertext` keyed per [`TagKeying`].
//!   Which keying a deployment uses is a configuration decision; encoder and
//!   decoder must agree on it.

use bytes::BufMut;
use hmac::{Hmac, Mac};
use num_bigint::BigUint;
use sha2::Sha256;

use crate::{
    der::{
        self, DerReader, TAG_INTEGER, TAG_OCTET_STRING, TAG_SEQUENCE, integer_content, put_element,
    },
    errors::{ContainerError, MalformedReason, Result},
};

type HmacSha256 = Hmac<Sha256>;

/// Integrity tag size (HMAC-SHA256 output).
pub const TAG_SIZE: usize = 32;

/// Bytes of the timestamp field used as key under [`TagKeying::TimestampPrefix`].
pub const TIMESTAMP_KEY_SIZE: usize = 16;

/// Upper bound on the encoded container (16 MB).
pub const MAX_CONTAINER_SIZE: usize = 16 * 1024 * 1024;

/// Number of fields in the sequence.
pub const FIELD_COUNT: usize = 6;

/// Which container field keys the integrity HMAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagKeying {
    /// Full `entropy` field is the HMAC key.
    #[default]
    Entropy,
    /// First 16 bytes of the `timestamp` field are the HMAC key.
    TimestampPrefix,
}

impl TagKeying {
    /// Select the HMAC key from the container's metadata fields.
    pub fn key<'a>(self, timestamp: &'a [u8], entropy: &'a [u8]) -> Result<&'a [u8]> {
        match self {
            Self::Entropy => Ok(entropy),
            Self::TimestampPrefix => {
                timestamp.get(..TIMESTAMP_KEY_SIZE).ok_or(ContainerError::TagKeyUnavailable {
                    source_field: "timestamp",
                    needed: TIMESTAMP_KEY_SIZE,
                    actual: timestamp.len(),
                })
            },
        }
    }
}

/// Decoded container fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// RSA ciphertext bytes
    pub ciphertext: Vec<u8>,
    /// Timestamp recorded at key generation (ISO-8601 text in practice)
    pub timestamp: Vec<u8>,
    /// System entropy recorded at key generation
    pub entropy: Vec<u8>,
    /// RSA modulus
    pub n: BigUint,
    /// RSA public exponent
    pub e: BigUint,
    /// HMAC-SHA256 integrity tag
    pub tag: [u8; TAG_SIZE],
}

impl Container {
    /// Build a container, computing the tag under `keying`.
    pub fn seal(
        n: BigUint,
        e: BigUint,
        ciphertext: Vec<u8>,
        timestamp: Vec<u8>,
        entropy: Vec<u8>,
        keying: TagKeying,
    ) -> Result<Self> {
        let key = keying.key(&timestamp, &entropy)?;
        let tag = compute_tag(key, &ciphertext);
        Ok(Self { ciphertext, timestamp, entropy, n, e, tag })
    }

    /// Recompute the tag and compare it with the stored one in constant time.
    ///
    /// # Errors
    ///
    /// - `IntegrityCheckFailed` if the tags differ
    /// - `TagKeyUnavailable` if the keying convention cannot be applied
    pub fn verify(&self, keying: TagKeying) -> Result<()> {
        let key = keying.key(&self.timestamp, &self.entropy)?;
        verify_tag(key, &self.ciphertext, &self.tag)
    }

    /// Size of the encoded container in bytes.
    pub fn encoded_len(&self) -> usize {
        let content = self.content_len();
        1 + der::length_prefix_len(content) + content
    }

    /// Encode into `dst`.
    ///
    /// # Errors
    ///
    /// - `TooLarge` if the encoding would exceed [`MAX_CONTAINER_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let total = self.encoded_len();
        if total > MAX_CONTAINER_SIZE {
            return Err(ContainerError::TooLarge { size: total, max: MAX_CONTAINER_SIZE });
        }

        dst.put_u8(TAG_SEQUENCE);
        der::put_length(dst, self.content_len());
        put_element(dst, TAG_OCTET_STRING, &self.ciphertext);
        put_element(dst, TAG_OCTET_STRING, &self.timestamp);
        put_element(dst, TAG_OCTET_STRING, &self.entropy);
        put_element(dst, TAG_INTEGER, &integer_content(&self.n));
        put_element(dst, TAG_INTEGER, &integer_content(&self.e));
        put_element(dst, TAG_OCTET_STRING, &self.tag);

        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode from wire bytes.
    ///
    /// Does not verify the tag; see [`Container::verify`].
    ///
    /// # Errors
    ///
    /// - `Malformed` on truncated input, unexpected element tags, wrong field
    ///   count, non-canonical lengths or integers, or trailing bytes
    /// - `TooLarge` if the outer length exceeds [`MAX_CONTAINER_SIZE`]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut outer = DerReader::new(bytes);
        let content = outer.read_element(TAG_SEQUENCE, "container")?;
        if !outer.is_empty() {
            return Err(MalformedReason::TrailingBytes(outer.remaining()).into());
        }
        if content.len() > MAX_CONTAINER_SIZE {
            return Err(ContainerError::TooLarge { size: content.len(), max: MAX_CONTAINER_SIZE });
        }

        let mut fields = FieldReader { inner: DerReader::new(content), read: 0 };

        let ciphertext = fields.next(|r| r.read_octets("ciphertext"))?;
        let timestamp = fields.next(|r| r.read_octets("timestamp"))?;
        let entropy = fields.next(|r| r.read_octets("entropy"))?;
        let n = fields.next(|r| r.read_unsigned("n"))?;
        let e = fields.next(|r| r.read_unsigned("e"))?;
        let raw_tag = fields.next(|r| r.read_octets("tag"))?;
        fields.finish()?;

        let tag: [u8; TAG_SIZE] = raw_tag
            .as_slice()
            .try_into()
            .map_err(|_| MalformedReason::TagLength(raw_tag.len()))?;

        Ok(Self { ciphertext, timestamp, entropy, n, e, tag })
    }

    fn content_len(&self) -> usize {
        let n = integer_content(&self.n).len();
        let e = integer_content(&self.e).len();
        [self.ciphertext.len(), self.timestamp.len(), self.entropy.len(), n, e, TAG_SIZE]
            .into_iter()
            .map(|len| 1 + der::length_prefix_len(len) + len)
            .sum()
    }
}

/// Tracks how many sequence fields have been consumed so that running out
/// of content on a field boundary reports a field-count error rather than
/// a truncation.
struct FieldReader<'a> {
    inner: DerReader<'a>,
    read: usize,
}

impl<'a> FieldReader<'a> {
    fn next<T>(&mut self, read: impl FnOnce(&mut DerReader<'a>) -> Result<T>) -> Result<T> {
        if self.inner.is_empty() {
            return Err(MalformedReason::FieldCount { expected: FIELD_COUNT, found: self.read }
                .into());
        }
        let value = read(&mut self.inner)?;
        self.read += 1;
        Ok(value)
    }

    fn finish(mut self) -> Result<()> {
        if self.inner.is_empty() {
            return Ok(());
        }

        let mut found = self.read;
        while !self.inner.is_empty() {
            self.inner.skip_element()?;
            found += 1;
        }
        Err(MalformedReason::FieldCount { expected: FIELD_COUNT, found }.into())
    }
}

/// HMAC-SHA256 over `message`.
pub fn compute_tag(key: &[u8], message: &[u8]) -> [u8; TAG_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(message);
    let result = mac.finalize().into_bytes();

    let mut tag = [0u8; TAG_SIZE];
    tag.copy_from_slice(&result);
    tag
}

/// Constant-time tag comparison.
pub fn verify_tag(key: &[u8], message: &[u8], tag: &[u8]) -> Result<()> {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac.update(message);
    mac.verify_slice(tag).map_err(|_| ContainerError::IntegrityCheckFailed)
}

/// Seal and encode in one step.
pub fn encode_container(
    n: &BigUint,
    e: &BigUint,
    ciphertext: &[u8],
    timestamp: &[u8],
    entropy: &[u8],
    keying: TagKeying,
) -> Result<Vec<u8>> {
    Container::seal(
        n.clone(),
        e.clone(),
        ciphertext.to_vec(),
        timestamp.to_vec(),
        entropy.to_vec(),
        keying,
    )?
    .to_bytes()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sample(keying: TagKeying) -> Container {
        Container::seal(
            BigUint::from_bytes_be(&[0xA5; 256]),
            BigUint::from(65537u32),
            vec![0x11; 256],
            b"2025-01-01T00:00:00.000000".to_vec(),
            vec![0x22; 32],
            keying,
        )
        .unwrap()
    }

    impl Arbitrary for Container {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with((): Self::Parameters) -> Self::Strategy {
            (
                any::<Vec<u8>>(),
                any::<Vec<u8>>(),
                any::<Vec<u8>>(),
                prop::collection::vec(any::<u8>(), 0..300),
                any::<u64>(),
                any::<[u8; TAG_SIZE]>(),
            )
                .prop_map(|(ciphertext, timestamp, entropy, n, e, tag)| Self {
                    ciphertext,
                    timestamp,
                    entropy,
                    n: BigUint::from_bytes_be(&n),
                    e: BigUint::from(e),
                    tag,
                })
                .boxed()
        }
    }

    proptest! {
        #[test]
        fn container_round_trip(container in any::<Container>()) {
            let wire = container.to_bytes().expect("should encode");
            prop_assert_eq!(wire.len(), container.encoded_len());

            let parsed = Container::decode(&wire).expect("should decode");
            prop_assert_eq!(parsed, container);
        }
    }

    #[test]
    fn seal_then_verify() {
        for keying in [TagKeying::Entropy, TagKeying::TimestampPrefix] {
            let container = sample(keying);
            container.verify(keying).unwrap();
        }
    }

    #[test]
    fn keying_mismatch_fails_verification() {
        let container = sample(TagKeying::Entropy);
        assert_eq!(
            container.verify(TagKeying::TimestampPrefix),
            Err(ContainerError::IntegrityCheckFailed)
        );
    }

    #[test]
    fn entropy_keying_matches_plain_hmac() {
        let container = sample(TagKeying::Entropy);
        assert_eq!(container.tag, compute_tag(&container.entropy, &container.ciphertext));
    }

    #[test]
    fn short_timestamp_cannot_key_tag() {
        let result = Container::seal(
            BigUint::from(15u8),
            BigUint::from(3u8),
            vec![1],
            b"short".to_vec(),
            vec![],
            TagKeying::TimestampPrefix,
        );
        assert!(matches!(
            result,
            Err(ContainerError::TagKeyUnavailable { needed: 16, actual: 5, .. })
        ));
    }

    #[test]
    fn modulus_with_high_bit_round_trips() {
        let container = sample(TagKeying::Entropy);
        let wire = container.to_bytes().unwrap();
        // 0xA5 has its top bit set, so n must carry a zero sign byte
        let needle = [TAG_INTEGER, 0x82, 0x01, 0x01, 0x00, 0xA5];
        assert!(wire.windows(needle.len()).any(|w| w == needle));
        assert_eq!(Container::decode(&wire).unwrap(), container);
    }

    #[test]
    fn rejects_truncated_input() {
        let wire = sample(TagKeying::Entropy).to_bytes().unwrap();
        for cut in [0, 1, 4, wire.len() / 2, wire.len() - 1] {
            let err = Container::decode(&wire[..cut]).unwrap_err();
            assert!(err.is_malformed(), "cut at {cut}: {err:?}");
        }
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut wire = sample(TagKeying::Entropy).to_bytes().unwrap();
        wire.push(0x00);
        assert_eq!(
            Container::decode(&wire),
            Err(ContainerError::Malformed(MalformedReason::TrailingBytes(1)))
        );
    }

    #[test]
    fn rejects_missing_field() {
        let container = sample(TagKeying::Entropy);
        let mut content = Vec::new();
        put_element(&mut content, TAG_OCTET_STRING, &container.ciphertext);
        put_element(&mut content, TAG_OCTET_STRING, &container.timestamp);
        put_element(&mut content, TAG_OCTET_STRING, &container.entropy);
        put_element(&mut content, TAG_INTEGER, &integer_content(&container.n));
        put_element(&mut content, TAG_INTEGER, &integer_content(&container.e));

        let mut wire = Vec::new();
        put_element(&mut wire, TAG_SEQUENCE, &content);

        assert_eq!(
            Container::decode(&wire),
            Err(ContainerError::Malformed(MalformedReason::FieldCount { expected: 6, found: 5 }))
        );
    }

    #[test]
    fn rejects_extra_field() {
        let container = sample(TagKeying::Entropy);
        let wire = container.to_bytes().unwrap();

        // Re-wrap the original content plus one surplus element
        let mut reader = DerReader::new(&wire);
        let mut content = reader.read_element(TAG_SEQUENCE, "container").unwrap().to_vec();
        put_element(&mut content, TAG_OCTET_STRING, b"extra");

        let mut rewrapped = Vec::new();
        put_element(&mut rewrapped, TAG_SEQUENCE, &content);

        assert_eq!(
            Container::decode(&rewrapped),
            Err(ContainerError::Malformed(MalformedReason::FieldCount { expected: 6, found: 7 }))
        );
    }

    #[test]
    fn rejects_short_tag() {
        let container = sample(TagKeying::Entropy);
        let mut content = Vec::new();
        put_element(&mut content, TAG_OCTET_STRING, &container.ciphertext);
        put_element(&mut content, TAG_OCTET_STRING, &container.timestamp);
        put_element(&mut content, TAG_OCTET_STRING, &container.entropy);
        put_element(&mut content, TAG_INTEGER, &integer_content(&container.n));
        put_element(&mut content, TAG_INTEGER, &integer_content(&container.e));
        put_element(&mut content, TAG_OCTET_STRING, &container.tag[..31]);

        let mut wire = Vec::new();
        put_element(&mut wire, TAG_SEQUENCE, &content);

        assert_eq!(
            Container::decode(&wire),
            Err(ContainerError::Malformed(MalformedReason::TagLength(31)))
        );
    }

    #[test]
    fn rejects_wrong_field_kind() {
        let container = sample(TagKeying::Entropy);
        let mut wire = container.to_bytes().unwrap();
        // First field header sits right after the outer sequence header
        let offset = 1 + der::length_prefix_len(container.content_len());
        wire[offset] = TAG_INTEGER;

        assert!(matches!(
            Container::decode(&wire),
            Err(ContainerError::Malformed(MalformedReason::UnexpectedTag {
                field: "ciphertext",
                ..
            }))
        ));
    }

    #[test]
    fn known_encoding() {
        let container = Container {
            ciphertext: vec![0xAB],
            timestamp: vec![],
            entropy: vec![0x01, 0x02],
            n: BigUint::from(0x80u8),
            e: BigUint::from(3u8),
            tag: [0u8; TAG_SIZE],
        };

        let wire = container.to_bytes().unwrap();
        let mut expected = hex::decode("3032").unwrap();
        expected.extend(hex::decode("0401ab").unwrap());
        expected.extend(hex::decode("0400").unwrap());
        expected.extend(hex::decode("04020102").unwrap());
        expected.extend(hex::decode("02020080").unwrap());
        expected.extend(hex::decode("020103").unwrap());
        expected.extend(hex::decode("0420").unwrap());
        expected.extend([0u8; TAG_SIZE]);

        assert_eq!(wire, expected);
    }
}
