//! Minimal DER-style TLV encoding.
//!
//! Only the three element kinds the container needs are supported: SEQUENCE,
//! OCTET STRING and non-negative INTEGER. Lengths use the definite form and
//! are always written (and required on read) in their shortest encoding, so
//! a given value has exactly one valid byte representation.

use bytes::{Buf, BufMut};
use num_bigint::BigUint;

use crate::errors::{MalformedReason, Result};

/// Identifier byte for a constructed SEQUENCE.
pub const TAG_SEQUENCE: u8 = 0x30;
/// Identifier byte for an OCTET STRING.
pub const TAG_OCTET_STRING: u8 = 0x04;
/// Identifier byte for an INTEGER.
pub const TAG_INTEGER: u8 = 0x02;

/// Number of bytes needed to encode `len` as a length prefix.
pub fn length_prefix_len(len: usize) -> usize {
    if len < 0x80 { 1 } else { 1 + significant_bytes(len) }
}

/// Write a definite-form length prefix.
pub fn put_length(dst: &mut impl BufMut, len: usize) {
    if len < 0x80 {
        dst.put_u8(len as u8);
        return;
    }

    let width = significant_bytes(len);
    dst.put_u8(0x80 | width as u8);
    let be = len.to_be_bytes();
    dst.put_slice(&be[be.len() - width..]);
}

/// Write a complete element: identifier, length, content.
pub fn put_element(dst: &mut impl BufMut, tag: u8, content: &[u8]) {
    dst.put_u8(tag);
    put_length(dst, content.len());
    dst.put_slice(content);
}

/// Content octets of a non-negative INTEGER.
///
/// Big-endian, minimal, with a leading zero byte only when the top bit of
/// the first significant byte is set.
pub fn integer_content(value: &BigUint) -> Vec<u8> {
    let mut be = value.to_bytes_be();
    if be.first().is_some_and(|&b| b & 0x80 != 0) {
        be.insert(0, 0x00);
    }
    be
}

fn significant_bytes(len: usize) -> usize {
    let bits = usize::BITS - len.leading_zeros();
    bits.div_ceil(8).max(1) as usize
}

/// Cursor over untrusted container bytes.
///
/// Every read is bounds checked against the remaining input before any data
/// is copied; nothing here panics on malformed input.
pub struct DerReader<'a> {
    buf: &'a [u8],
}

impl<'a> DerReader<'a> {
    /// Wrap a byte slice.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// True once all input has been consumed.
    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Read one element with the given identifier and return its content.
    pub fn read_element(&mut self, expected: u8, field: &'static str) -> Result<&'a [u8]> {
        let found = self.read_u8()?;
        if found != expected {
            return Err(MalformedReason::UnexpectedTag { field, expected, found }.into());
        }

        let len = self.read_length()?;
        self.take(len)
    }

    /// Read an OCTET STRING.
    pub fn read_octets(&mut self, field: &'static str) -> Result<Vec<u8>> {
        Ok(self.read_element(TAG_OCTET_STRING, field)?.to_vec())
    }

    /// Read a non-negative INTEGER.
    pub fn read_unsigned(&mut self, field: &'static str) -> Result<BigUint> {
        let content = self.read_element(TAG_INTEGER, field)?;

        match content {
            [] => Err(MalformedReason::NonMinimalInteger(field).into()),
            [first, ..] if first & 0x80 != 0 => Err(MalformedReason::NegativeInteger(field).into()),
            [0x00, second, ..] if second & 0x80 == 0 => {
                Err(MalformedReason::NonMinimalInteger(field).into())
            },
            _ => Ok(BigUint::from_bytes_be(content)),
        }
    }

    /// Skip one element of any kind. Used to count surplus fields.
    pub fn skip_element(&mut self) -> Result<()> {
        let _tag = self.read_u8()?;
        let len = self.read_length()?;
        self.take(len).map(|_| ())
    }

    fn read_u8(&mut self) -> Result<u8> {
        if !self.buf.has_remaining() {
            return Err(MalformedReason::Truncated { needed: 1, available: 0 }.into());
        }
        Ok(self.buf.get_u8())
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.read_u8()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }

        let width = usize::from(first & 0x7F);
        // 0x80 is the indefinite form, which DER forbids.
        if width == 0 {
            return Err(MalformedReason::NonMinimalLength.into());
        }
        if width > size_of::<usize>() {
            return Err(MalformedReason::LengthOverflow.into());
        }

        let bytes = self.take(width)?;
        if bytes[0] == 0 {
            return Err(MalformedReason::NonMinimalLength.into());
        }

        let len = bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        if len < 0x80 {
            return Err(MalformedReason::NonMinimalLength.into());
        }

        Ok(len)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.buf.remaining();
        if len > available {
            return Err(MalformedReason::Truncated { needed: len, available }.into());
        }

        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }
}
