//! Password envelope encryption for serialized database files.
//!
//! This module provides:
//! - [`encrypt`] — fresh salt + nonce, PBKDF2 key, AES-256-GCM → [`EncryptedContainer`]
//! - [`decrypt`] — re-derive the key from the container salt and authenticate
//! - [`seal`] / [`open`] — the same, composed with the binary codec
//!
//! The derived key lives only inside a single call and is zeroized on drop.
//! Salt and nonce are regenerated on every encryption, so the same
//! plaintext and password never produce the same container twice.

use crate::container::{self, EncryptedContainer};
use crate::error::CryptoError;
use crate::kdf;
use crate::memory::SecretBuffer;
use crate::symmetric::{self, NONCE_LEN};

/// Encrypt `plaintext` under `password`.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails, or
/// [`CryptoError::Encryption`] if AES-256-GCM sealing fails.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedContainer, CryptoError> {
    let salt = kdf::generate_salt()?;
    let nonce = symmetric::generate_nonce()?;
    let key = kdf::derive(password, &salt)?;
    let ciphertext = symmetric::seal(plaintext, key.expose(), &nonce)?;

    Ok(EncryptedContainer {
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext,
    })
}

/// Decrypt a parsed container with a candidate password.
///
/// # Errors
///
/// Returns [`CryptoError::DecryptionFailed`] for a wrong password or
/// corrupted data (the two are indistinguishable).
/// Returns [`CryptoError::MalformedContainer`] if the nonce is not 96 bits.
pub fn decrypt(
    container: &EncryptedContainer,
    password: &str,
) -> Result<SecretBuffer, CryptoError> {
    let nonce: [u8; NONCE_LEN] = container.nonce.as_slice().try_into().map_err(|_| {
        CryptoError::MalformedContainer(format!(
            "unsupported nonce length: {} bytes (expected {NONCE_LEN})",
            container.nonce.len()
        ))
    })?;

    let key = kdf::derive(password, &container.salt)?;
    symmetric::open(&container.ciphertext, key.expose(), &nonce)
}

/// Encrypt and serialize in one step, producing the bytes written to disk
/// or uploaded.
///
/// # Errors
///
/// See [`encrypt`] and [`EncryptedContainer::serialize`].
pub fn seal(plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    encrypt(plaintext, password)?.serialize()
}

/// Parse and decrypt serialized container bytes.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedContainer`] if `data` does not parse,
/// otherwise see [`decrypt`].
pub fn open(data: &[u8], password: &str) -> Result<SecretBuffer, CryptoError> {
    let parsed = container::deserialize(data)?;
    decrypt(&parsed, password)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
