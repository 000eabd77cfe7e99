//! `folio-sync` — Remote synchronization of encrypted Folio databases.
//!
//! Talks to the portfolio presign API, moves `ENCDB` containers through
//! presigned URLs, and reports optimistic-concurrency conflicts to the caller.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod auth;
pub mod client;
pub mod error;
pub mod settings;
pub mod state;

pub use auth::{StaticToken, TokenProvider};
pub use client::{RemoteStatus, SyncClient, UploadOptions, UploadReceipt};
pub use error::SyncError;
pub use settings::SyncSettings;
pub use state::SyncState;
