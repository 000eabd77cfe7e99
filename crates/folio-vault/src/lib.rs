//! `folio-vault` — Local database lifecycle for Folio.
//!
//! Holds the single in-memory portfolio database of a session, routes
//! imported files to the plain-open or unlock flow, and produces exports
//! sealed under the session password.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod db;
pub mod error;
pub mod lifecycle;

pub use db::PortfolioDb;
pub use error::VaultError;
pub use lifecycle::{
    DatabaseSession, ExportedDatabase, LoadOutcome, PasswordPrompt, SessionStatus,
    ENCRYPTED_FILE_NAME, ENCRYPTED_MEDIA_TYPE, PLAIN_FILE_NAME, PLAIN_MEDIA_TYPE,
};
