//! PBKDF2-HMAC-SHA256 password key derivation.
//!
//! The iteration count and hash are protocol constants: they are NOT stored
//! in the container, so every reader and writer must agree on them.
//! Changing either requires a new container format revision.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::memory::SecretBytes;

/// PBKDF2 iteration count shared by every `ENCDB` container.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Derived key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Salt length generated for each encryption, in bytes.
pub const SALT_LEN: usize = 16;

/// Derive the AES-256 key for a container from the UTF-8 password and salt.
///
/// Uses [`PBKDF2_ITERATIONS`] rounds of HMAC-SHA256. Any password is
/// accepted here, including the empty string; rejecting weak or empty
/// passwords is the caller's job.
///
/// # Errors
///
/// Never fails with the protocol constants; the `Result` mirrors
/// [`derive_with_iterations`].
pub fn derive(password: &str, salt: &[u8]) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    derive_with_iterations(password.as_bytes(), salt, PBKDF2_ITERATIONS)
}

/// Derive a 256-bit key with an explicit iteration count.
///
/// # Errors
///
/// Returns [`CryptoError::KeyDerivation`] if `iterations` is zero.
pub fn derive_with_iterations(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<SecretBytes<KEY_LEN>, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be at least 1".into(),
        ));
    }

    let mut output = [0u8; KEY_LEN];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, &mut output);

    let key = SecretBytes::new(output);
    output.zeroize();
    Ok(key)
}

/// Fill a fresh salt from the OS CSPRNG.
///
/// # Errors
///
/// Returns [`CryptoError::SecureMemory`] if the CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    Ok(salt)
}
