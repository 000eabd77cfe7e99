//! Sync settings, stored as plain JSON next to the app preferences.
//!
//! Nothing secret lives here: the bearer token comes from the identity
//! provider and the password never leaves the session.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backend object size cap (25 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 26_214_400;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default `formatVersion` tag sent with uploads.
pub const DEFAULT_FORMAT_VERSION: &str = "1";

/// Default `cipher` tag sent with uploads.
pub const DEFAULT_CIPHER: &str = "aes-gcm";

const SETTINGS_FILE: &str = "sync.json";

/// Remote sync configuration.
///
/// Persisted to `{data_dir}/sync.json`. All fields have defaults; without
/// `portfolioApiUrl` sync is simply not configured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    /// Base URL of the portfolio API (the presign endpoints hang off it).
    #[serde(default)]
    pub portfolio_api_url: Option<String>,

    /// Timeout applied to every HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Local pre-check against the backend cap; `null` disables it.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: Option<u64>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            portfolio_api_url: None,
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_user_agent() -> String {
    concat!("folio-sync/", env!("CARGO_PKG_VERSION")).into()
}
const fn default_max_upload_bytes() -> Option<u64> {
    Some(DEFAULT_MAX_UPLOAD_BYTES)
}

impl SyncSettings {
    /// Settings pointing at `url`, everything else default.
    #[must_use]
    pub fn with_api_url(url: impl Into<String>) -> Self {
        Self {
            portfolio_api_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// The request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load settings from `{data_dir}/sync.json`.
    ///
    /// Returns [`Default::default()`] when the file is missing or
    /// contains invalid JSON.
    #[must_use]
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        fs::read_to_string(&path).map_or_else(
            |_| Self::default(),
            |contents| serde_json::from_str(&contents).unwrap_or_default(),
        )
    }

    /// Persist settings to `{data_dir}/sync.json` (write `.tmp`, then rename).
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the directory does not exist or the
    /// file system rejects the write/rename.
    pub fn save(&self, data_dir: &Path) -> std::io::Result<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let tmp = data_dir.join(".sync.json.tmp");

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        fs::write(&tmp, &json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let s = SyncSettings::default();
        assert!(s.portfolio_api_url.is_none());
        assert_eq!(s.request_timeout_secs, 30);
        assert_eq!(s.max_upload_bytes, Some(26_214_400));
        assert!(s.user_agent.starts_with("folio-sync/"));
        assert_eq!(s.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn load_returns_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(SyncSettings::load(dir.path()), SyncSettings::default());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let s = SyncSettings {
            request_timeout_secs: 5,
            ..SyncSettings::with_api_url("https://api.example.com/prod")
        };
        s.save(dir.path()).unwrap();
        assert_eq!(SyncSettings::load(dir.path()), s);
        assert!(!dir.path().join(".sync.json.tmp").exists());
    }

    #[test]
    fn load_recovers_from_corrupt_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        assert_eq!(SyncSettings::load(dir.path()), SyncSettings::default());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"portfolioApiUrl":"https://x.test"}"#,
        )
        .unwrap();
        let s = SyncSettings::load(dir.path());
        assert_eq!(s.portfolio_api_url.as_deref(), Some("https://x.test"));
        assert_eq!(s.max_upload_bytes, Some(DEFAULT_MAX_UPLOAD_BYTES));
    }

    #[test]
    fn explicit_null_disables_size_check() {
        let s: SyncSettings = serde_json::from_str(r#"{"maxUploadBytes":null}"#).unwrap();
        assert_eq!(s.max_upload_bytes, None);
    }

    #[test]
    fn serde_uses_camel_case() {
        let json = serde_json::to_string(&SyncSettings::default()).unwrap();
        assert!(json.contains("portfolioApiUrl"));
        assert!(json.contains("requestTimeoutSecs"));
        assert!(json.contains("maxUploadBytes"));
        assert!(!json.contains("max_upload_bytes"));
    }
}
