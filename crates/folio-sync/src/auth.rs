//! Bearer token seam.
//!
//! The identity provider lives outside this crate; the sync client only
//! asks for a token before each backend call.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::SyncError;

/// Source of bearer tokens for the presign endpoints.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return the current bearer token.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unauthorized`] when no session is available.
    async fn bearer_token(&self) -> Result<SecretString, SyncError>;
}

/// A fixed token, or none at all.
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    /// Always hand out `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(SecretString::from(token.into())))
    }

    /// A provider with no signed-in user.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<SecretString, SyncError> {
        match &self.0 {
            Some(token) if !token.expose_secret().is_empty() => {
                Ok(SecretString::from(token.expose_secret().to_owned()))
            }
            _ => Err(SyncError::Unauthorized("No auth token".into())),
        }
    }
}
