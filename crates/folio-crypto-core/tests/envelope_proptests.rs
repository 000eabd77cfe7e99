#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for password envelope encryption.
//!
//! Each case runs the full 100,000-iteration KDF, so case counts are kept low.

use folio_crypto_core::container::MAGIC_LEN;
use folio_crypto_core::envelope::{decrypt, encrypt, open, seal};
use folio_crypto_core::CryptoError;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// decrypt(encrypt(P, W), W) == P.
    #[test]
    fn roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
        password in "\\PC{1,32}",
    ) {
        let c = encrypt(&plaintext, &password).expect("encrypt should succeed");
        let p = decrypt(&c, &password).expect("decrypt should succeed");
        prop_assert_eq!(p.expose(), plaintext.as_slice());
    }

    /// W1 != W2 always fails with DecryptionFailed.
    #[test]
    fn wrong_password_rejected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        right in "[a-z]{1,16}",
        wrong in "[a-z]{1,16}",
    ) {
        prop_assume!(right != wrong);
        let c = encrypt(&plaintext, &right).expect("encrypt should succeed");
        prop_assert!(matches!(decrypt(&c, &wrong), Err(CryptoError::DecryptionFailed)));
    }

    /// Flipping any byte of the serialized ciphertext region is detected.
    #[test]
    fn ciphertext_tamper_detected(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        pos in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut bytes = seal(&plaintext, "pw").expect("seal should succeed");
        // magic + salt(4+16) + nonce(4+12) + ct length(4)
        let ct_start = MAGIC_LEN + 4 + 16 + 4 + 12 + 4;
        let region = bytes.len() - ct_start;
        let idx = ct_start + pos.index(region);
        bytes[idx] ^= flip;
        prop_assert!(matches!(open(&bytes, "pw"), Err(CryptoError::DecryptionFailed)));
    }
}

#[test]
fn successive_encryptions_use_fresh_salt_and_nonce() {
    let a = encrypt(b"identical", "identical").unwrap();
    let b = encrypt(b"identical", "identical").unwrap();
    assert_ne!(a.salt, b.salt, "salts must differ");
    assert_ne!(a.nonce, b.nonce, "nonces must differ");
    assert_ne!(a.ciphertext, b.ciphertext, "ciphertexts must differ");
}
