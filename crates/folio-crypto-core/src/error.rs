//! Cryptographic error types for `folio-crypto-core`.

use thiserror::Error;

/// Errors produced by envelope encryption and the container codec.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The buffer is not a structurally valid `ENCDB` container
    /// (magic mismatch, truncation, or a length field overrunning the buffer).
    #[error("malformed encrypted container: {0}")]
    MalformedContainer(String),

    /// Authentication tag verification failed.
    ///
    /// Wrong password and corrupted ciphertext are indistinguishable here,
    /// so the message never claims one cause over the other.
    #[error("Failed to decrypt database. Check your password.")]
    DecryptionFailed,

    /// PBKDF2 key derivation failed (invalid parameters).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// AES-256-GCM sealing failure or invalid key material.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Secure buffer allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}

impl CryptoError {
    /// Returns `true` for [`CryptoError::DecryptionFailed`], the only
    /// condition a caller should answer by re-prompting for the password.
    #[must_use]
    pub const fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::DecryptionFailed)
    }
}
