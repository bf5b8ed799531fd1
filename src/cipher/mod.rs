//! AES-256-CBC helper with fixed-length key padding.
//!
//! Keys of any length are normalized to 32 bytes: shorter keys are zero-padded
//! at the tail, longer keys keep only their first 32 bytes. The IV is not
//! random, it is taken from the padded key itself (see [`derive_iv`]), so the
//! same `(plaintext, key)` pair always produces the same ciphertext.
//!
//! Ciphertexts produced elsewhere with this scheme must keep decrypting, which
//! is why the IV derivation is kept as-is and isolated in one function.

use aes::{
    cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit},
    Aes256,
};
use thiserror::Error;

pub const KEY_LENGTH: usize = 32;
pub const IV_LENGTH: usize = 16;
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

#[derive(Debug, Error, PartialEq)]
pub enum CipherError {
    #[error("invalid hex ciphertext")]
    Hex(#[from] hex::FromHexError),
    #[error("ciphertext length {0} is not a positive multiple of the block size")]
    Length(usize),
    #[error("invalid padding")]
    Padding,
}

/// Normalize `key` to exactly [`KEY_LENGTH`] bytes.
///
/// Shorter keys are zero filled and longer keys are cut at byte 32. The cut is
/// on bytes, not characters: a multibyte UTF-8 character straddling byte 32
/// keeps its leading bytes. Browser clients that write the key as a string
/// into a zeroed buffer drop such a partial character instead, so keys of that
/// shape produce different ciphertexts there.
#[must_use]
pub fn pad_key(key: &[u8]) -> [u8; KEY_LENGTH] {
    let mut padded = [0u8; KEY_LENGTH];
    let len = key.len().min(KEY_LENGTH);
    padded[..len].copy_from_slice(&key[..len]);
    padded
}

/// Derive the CBC initialization vector from a padded key.
///
/// The IV is the first [`IV_LENGTH`] bytes of the padded key, so it is neither
/// independent of the key nor unique per message. Kept for compatibility with
/// existing ciphertexts; a replacement should use a random IV stored next to
/// the ciphertext.
#[must_use]
pub fn derive_iv(padded_key: &[u8; KEY_LENGTH]) -> [u8; IV_LENGTH] {
    let mut iv = [0u8; IV_LENGTH];
    iv.copy_from_slice(&padded_key[..IV_LENGTH]);
    iv
}

/// Encrypt `plaintext` with AES-256-CBC and PKCS#7 padding.
#[must_use]
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Vec<u8> {
    let key = pad_key(key);
    let iv = derive_iv(&key);

    Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Encrypt and return the ciphertext as lowercase hex.
#[must_use]
pub fn encrypt_hex(plaintext: &[u8], key: &[u8]) -> String {
    hex::encode(encrypt(plaintext, key))
}

/// Decrypt a ciphertext produced by [`encrypt`] with the same key.
///
/// # Errors
/// Returns an error if the ciphertext is not block aligned or the padding is invalid.
pub fn decrypt(ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CipherError::Length(ciphertext.len()));
    }

    let key = pad_key(key);
    let iv = derive_iv(&key);

    Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CipherError::Padding)
}

/// Decrypt a hex encoded ciphertext.
///
/// # Errors
/// Returns an error if `ciphertext` is not valid hex or fails to decrypt.
pub fn decrypt_hex(ciphertext: &str, key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let bytes = hex::decode(ciphertext.trim())?;
    decrypt(&bytes, key)
}
