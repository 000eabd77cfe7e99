//! AES-256-GCM authenticated encryption.
//!
//! This module provides:
//! - [`seal`] — encrypt plaintext under a key + nonce, returning `ciphertext || tag`
//! - [`open`] — authenticate and decrypt `ciphertext || tag` into a [`SecretBuffer`]
//! - [`generate_nonce`] — fresh 96-bit nonce from the OS CSPRNG
//!
//! The tag is appended to the ciphertext (the Web Crypto layout), which is
//! what the `ENCDB` container stores in its ciphertext field.

use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBuffer;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Build a `ring` key, validating the key length first.
fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::Encryption(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Generate a random 96-bit nonce.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails.
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    Ok(nonce)
}

/// Encrypt `plaintext` with AES-256-GCM, returning `ciphertext || tag`.
///
/// The nonce must never be reused with the same key. Callers in this crate
/// derive a fresh key and nonce for every call.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the key is not 32 bytes or sealing fails.
pub fn seal(
    plaintext: &[u8],
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let less_safe_key = aead_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(*nonce);

    let mut in_out = Vec::with_capacity(plaintext.len().saturating_add(TAG_LEN));
    in_out.extend_from_slice(plaintext);

    if less_safe_key
        .seal_in_place_append_tag(nonce, aead::Aad::empty(), &mut in_out)
        .is_err()
    {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    }

    Ok(in_out)
}

/// Authenticate and decrypt `ciphertext || tag`.
///
/// The intermediate buffer is zeroized after the plaintext has been copied
/// into the returned [`SecretBuffer`]. Nothing is returned unless the tag
/// verifies.
///
/// # Errors
///
/// Returns [`CryptoError::Encryption`] if the key is not 32 bytes.
/// Returns [`CryptoError::DecryptionFailed`] if authentication fails
/// (wrong key, tampered data, or input shorter than the tag).
pub fn open(
    ciphertext_and_tag: &[u8],
    key: &[u8],
    nonce: &[u8; NONCE_LEN],
) -> Result<SecretBuffer, CryptoError> {
    let less_safe_key = aead_key(key)?;
    let nonce = aead::Nonce::assume_unique_for_key(*nonce);

    let mut in_out = ciphertext_and_tag.to_vec();
    let result = less_safe_key
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map(|plaintext| SecretBuffer::new(plaintext))
        .map_err(|_| CryptoError::DecryptionFailed);
    in_out.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
