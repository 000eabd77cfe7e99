//! Sync error types for `folio-sync`.

use folio_crypto_core::CryptoError;
use thiserror::Error;

/// Errors produced by the sync client.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure or 5xx from the sync backend or object store.
    #[error("remote unreachable: {0}")]
    RemoteUnreachable(String),

    /// Bearer token missing or rejected, or a presigned URL expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The remote copy moved on since it was last observed.
    #[error("a newer remote copy exists: {message}")]
    VersionConflict {
        /// Server-provided explanation.
        message: String,
        /// Authoritative current version, when the remote object exists.
        current_version_id: Option<String>,
        /// Authoritative current `ETag`, when the remote object exists.
        current_etag: Option<String>,
    },

    /// Upload exceeds the backend size cap.
    #[error("object too large: {message}")]
    ObjectTooLarge {
        /// Server-provided or local explanation.
        message: String,
    },

    /// The backend rejected the request body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The downloaded remote object is not an `ENCDB` container.
    #[error("remote object is not an encrypted database")]
    RemoteFormatInvalid,

    /// Wrong password or corrupted remote data. The two are indistinguishable.
    #[error("Failed to decrypt database. Check your password.")]
    DecryptionFailed,

    /// The remote object carries the container magic but does not parse.
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// A status the protocol does not define.
    #[error("unexpected HTTP {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// A 2xx response whose body does not match the protocol.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// An empty password was supplied.
    #[error("password must not be empty")]
    EmptyPassword,

    /// Sync settings are missing or unusable.
    #[error("sync not configured: {0}")]
    NotConfigured(String),

    /// Any other cryptographic failure (entropy, key derivation, sealing).
    #[error(transparent)]
    Crypto(CryptoError),

    /// A background crypto task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// `true` for transient failures worth retrying with backoff or after
    /// refreshing the bearer token.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RemoteUnreachable(_) | Self::Unauthorized(_))
    }
}

impl From<CryptoError> for SyncError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed => Self::DecryptionFailed,
            CryptoError::MalformedContainer(detail) => Self::MalformedContainer(detail),
            other => Self::Crypto(other),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        // Presigned URLs are capabilities; keep them out of messages.
        Self::RemoteUnreachable(err.without_url().to_string())
    }
}
