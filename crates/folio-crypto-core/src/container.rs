//! `ENCDB` binary container: magic, salt, nonce, ciphertext.
//!
//! This module provides:
//! - [`EncryptedContainer`] — the immutable value produced by encryption
//! - [`EncryptedContainer::serialize`] — flat binary encoding
//! - [`deserialize`] — bounds-checked parsing
//! - [`looks_like_container`] — non-failing magic sniff used for dispatch
//!
//! # File Layout
//!
//! ```text
//! Magic (5 B) | Salt Len (u32 LE) | Salt | Nonce Len (u32 LE) | Nonce | Ct Len (u32 LE) | Ciphertext
//! ```
//!
//! - **Magic**: `b"ENCDB"`
//! - **Ciphertext**: AES-256-GCM output with the 16-byte tag appended
//!
//! No padding, no compression, no trailing data. KDF and cipher parameters
//! are protocol constants and do not appear in the layout.

use crate::error::CryptoError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes identifying an encrypted database container.
pub const MAGIC: &[u8; 5] = b"ENCDB";

/// Length of the magic bytes.
pub const MAGIC_LEN: usize = 5;

/// Length of a u32 length prefix.
const LEN_PREFIX: usize = 4;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Parsed encrypted container.
///
/// Built fresh by every encryption and consumed by decryption; never
/// patched in place.
#[must_use = "an encrypted container must be serialized or decrypted"]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedContainer {
    /// KDF salt, unique per encryption.
    pub salt: Vec<u8>,
    /// AEAD nonce (IV), unique per encryption.
    pub nonce: Vec<u8>,
    /// Ciphertext with the authentication tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedContainer {
    /// Exact size of the serialized form in bytes.
    ///
    /// Saturates instead of overflowing; a saturated value is rejected by
    /// [`serialize`](Self::serialize) through the u32 length checks.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        MAGIC_LEN
            .saturating_add(LEN_PREFIX.saturating_mul(3))
            .saturating_add(self.salt.len())
            .saturating_add(self.nonce.len())
            .saturating_add(self.ciphertext.len())
    }

    /// Serialize into the flat `ENCDB` layout.
    ///
    /// Deterministic: the same container always yields the same bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MalformedContainer`] if a field is longer than
    /// a u32 length prefix can describe.
    pub fn serialize(&self) -> Result<Vec<u8>, CryptoError> {
        let salt_len = field_len(&self.salt, "salt")?;
        let nonce_len = field_len(&self.nonce, "nonce")?;
        let ct_len = field_len(&self.ciphertext, "ciphertext")?;

        let mut out = Vec::with_capacity(self.encoded_len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&salt_len.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&nonce_len.to_le_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&ct_len.to_le_bytes());
        out.extend_from_slice(&self.ciphertext);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Sniffing
// ---------------------------------------------------------------------------

/// Returns `true` iff `data` starts with the exact `ENCDB` magic.
///
/// Never fails: short or empty input simply returns `false`, meaning
/// "treat as a plaintext database".
#[must_use]
pub fn looks_like_container(data: &[u8]) -> bool {
    data.get(..MAGIC_LEN)
        .is_some_and(|prefix| prefix == MAGIC.as_slice())
}

// ---------------------------------------------------------------------------
// Deserialization
// ---------------------------------------------------------------------------

/// Parse an `ENCDB` container.
///
/// Every length field is validated against the remaining buffer before
/// slicing. Bytes after the ciphertext are ignored.
///
/// # Errors
///
/// Returns [`CryptoError::MalformedContainer`] on magic mismatch, a buffer
/// truncated inside a length prefix, or a declared length overrunning the buffer.
pub fn deserialize(data: &[u8]) -> Result<EncryptedContainer, CryptoError> {
    if !looks_like_container(data) {
        return Err(CryptoError::MalformedContainer(
            "invalid magic bytes".into(),
        ));
    }

    let mut cursor = MAGIC_LEN;
    let salt = read_field(data, &mut cursor, "salt")?;
    let nonce = read_field(data, &mut cursor, "nonce")?;
    let ciphertext = read_field(data, &mut cursor, "ciphertext")?;

    Ok(EncryptedContainer {
        salt: salt.to_vec(),
        nonce: nonce.to_vec(),
        ciphertext: ciphertext.to_vec(),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn field_len(field: &[u8], name: &str) -> Result<u32, CryptoError> {
    u32::try_from(field.len()).map_err(|_| {
        CryptoError::MalformedContainer(format!("{name} too large for u32 length"))
    })
}

/// Read a u32 from `data` at `cursor` in little-endian order, advancing `cursor`.
fn read_u32_le(data: &[u8], cursor: &mut usize, name: &str) -> Result<usize, CryptoError> {
    let end = cursor
        .checked_add(LEN_PREFIX)
        .ok_or_else(|| CryptoError::MalformedContainer("cursor overflow".into()))?;

    let bytes = data.get(*cursor..end).ok_or_else(|| {
        CryptoError::MalformedContainer(format!(
            "truncated before {name} length at offset {cursor}"
        ))
    })?;

    let mut buf = [0u8; LEN_PREFIX];
    buf.copy_from_slice(bytes);
    *cursor = end;

    usize::try_from(u32::from_le_bytes(buf))
        .map_err(|_| CryptoError::MalformedContainer("u32 value exceeds platform usize".into()))
}

/// Read a length-prefixed field, advancing `cursor` past it.
fn read_field<'a>(
    data: &'a [u8],
    cursor: &mut usize,
    name: &str,
) -> Result<&'a [u8], CryptoError> {
    let len = read_u32_le(data, cursor, name)?;
    let end = cursor
        .checked_add(len)
        .ok_or_else(|| CryptoError::MalformedContainer(format!("{name} length overflow")))?;

    let field = data.get(*cursor..end).ok_or_else(|| {
        CryptoError::MalformedContainer(format!(
            "{name} extends beyond buffer: end={end}, len={}",
            data.len()
        ))
    })?;
    *cursor = end;
    Ok(field)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
