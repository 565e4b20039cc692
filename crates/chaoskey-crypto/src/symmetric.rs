//! AES-256-CBC with PKCS7 padding.
//!
//! Pure functions: the IV is supplied by the caller, which must draw it fresh
//! from a secure source for every encryption.

use aes::{
    Aes256,
    cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// AES-256 key length.
pub const KEY_SIZE: usize = 32;

/// CBC IV length (one AES block).
pub const IV_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// 256-bit AES key, zeroized on drop.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_SIZE]>);

impl SymmetricKey {
    /// Wrap exactly 32 key bytes.
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Copy key bytes from a slice.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` unless the slice is exactly 32 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let Ok(array) = <[u8; KEY_SIZE]>::try_from(bytes) else {
            return Err(CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() });
        };
        Ok(Self::new(array))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl TryFrom<&[u8]> for SymmetricKey {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_slice(bytes)
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Encrypt with AES-256-CBC and PKCS7 padding.
///
/// Output length is the plaintext length rounded up to the next full block
/// (a full padding block is added when already aligned).
pub fn encrypt_cbc(key: &SymmetricKey, iv: &[u8; IV_SIZE], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.as_bytes().into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-256-CBC and strip PKCS7 padding.
///
/// # Errors
///
/// - `InvalidIvLength` unless `iv` is 16 bytes
/// - `InvalidPadding` if the ciphertext is not block aligned or the padding
///   is inconsistent (typically a wrong key or IV)
pub fn decrypt_cbc(
    key: &SymmetricKey,
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let iv: &[u8; IV_SIZE] = iv
        .try_into()
        .map_err(|_| CryptoError::InvalidIvLength { expected: IV_SIZE, actual: iv.len() })?;

    Aes256CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::InvalidPadding)
}
