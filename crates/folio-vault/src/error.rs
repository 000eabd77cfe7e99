//! Session error types for `folio-vault`.

use folio_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by the local database lifecycle.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The embedded engine could not open the database bytes.
    #[error("failed to initialize database engine: {0}")]
    EngineInitFailed(String),

    /// A schema migration failed while opening a database.
    #[error("database migration failed: {0}")]
    MigrationFailed(String),

    /// Wrong password or corrupted container. The two are indistinguishable.
    #[error("Failed to decrypt database. Check your password.")]
    DecryptionFailed,

    /// The pending file starts with the container magic but does not parse.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// The operation is not valid in the current session state.
    #[error("cannot {operation} while session is {state}")]
    InvalidTransition {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the session was in.
        state: &'static str,
    },

    /// An empty password was supplied where one is required.
    #[error("password must not be empty")]
    EmptyPassword,

    /// `SQLite` error on an already-open database.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other cryptographic failure (entropy, key derivation, sealing).
    #[error(transparent)]
    Crypto(CryptoError),
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed => Self::DecryptionFailed,
            CryptoError::MalformedContainer(detail) => Self::MalformedContainer(detail),
            other => Self::Crypto(other),
        }
    }
}

impl From<rusqlite::Error> for VaultError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl VaultError {
    /// `true` when re-prompting for the password is the sensible reaction.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::DecryptionFailed)
    }
}
