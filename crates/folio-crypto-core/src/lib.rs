//! `folio-crypto-core` — Password envelope encryption for Folio databases.
//!
//! This crate is the audit target: zero network, zero async, zero logging.
//! It turns serialized database bytes into `ENCDB` containers and back.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
pub mod memory;

pub mod kdf;
pub mod symmetric;

pub mod container;

pub mod envelope;

pub use container::{deserialize, looks_like_container, EncryptedContainer, MAGIC};
pub use envelope::{decrypt, encrypt, open, seal};
pub use error::CryptoError;
pub use kdf::PBKDF2_ITERATIONS;
pub use memory::{SecretBuffer, SecretBytes};
