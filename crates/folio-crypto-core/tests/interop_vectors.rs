#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Known-answer vectors pinning bit-exact compatibility with exported
//! `.enc` files produced by the browser app (PBKDF2-SHA256 ×100k, AES-256-GCM).

use folio_crypto_core::container::{deserialize, looks_like_container, EncryptedContainer};
use folio_crypto_core::envelope::{decrypt, open};
use folio_crypto_core::CryptoError;

const PASSWORD: &str = "correct-horse";
const PLAINTEXT: &[u8] = b"SQLite format 3\0portfolio";

/// Full serialized container: salt = 00..0f, nonce = a0..ab.
const CONTAINER_HEX: &str = "454e43444210000000000102030405060708090a0b0c0d0e0f0c000000\
a0a1a2a3a4a5a6a7a8a9aaab29000000b5d061eb5e2ea1c2505c3f739f4130b6beb4d5ccad89ef6ec41bdf\
a98fb423573f6424a6cab9475562";

fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn known_container_parses() {
    let bytes = hex(CONTAINER_HEX);
    assert_eq!(bytes.len(), 86);
    assert!(looks_like_container(&bytes));

    let c = deserialize(&bytes).unwrap();
    assert_eq!(c.salt, (0u8..16).collect::<Vec<_>>());
    assert_eq!(c.nonce, (0xA0u8..0xAC).collect::<Vec<_>>());
    assert_eq!(c.ciphertext.len(), PLAINTEXT.len() + 16);
}

#[test]
fn known_container_decrypts() {
    let plaintext = open(&hex(CONTAINER_HEX), PASSWORD).unwrap();
    assert_eq!(plaintext.expose(), PLAINTEXT);
}

#[test]
fn known_container_rejects_wrong_password() {
    let result = open(&hex(CONTAINER_HEX), "wrong-password");
    assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
}

#[test]
fn reserializing_known_container_is_bit_exact() {
    let bytes = hex(CONTAINER_HEX);
    let c = deserialize(&bytes).unwrap();
    assert_eq!(c.serialize().unwrap(), bytes);
}

#[test]
fn hand_built_container_matches_vector() {
    let bytes = hex(CONTAINER_HEX);
    let parsed = deserialize(&bytes).unwrap();
    let rebuilt = EncryptedContainer {
        salt: (0u8..16).collect(),
        nonce: (0xA0u8..0xAC).collect(),
        ciphertext: parsed.ciphertext.clone(),
    };
    assert_eq!(rebuilt, parsed);
    assert_eq!(decrypt(&rebuilt, PASSWORD).unwrap().expose(), PLAINTEXT);
}
