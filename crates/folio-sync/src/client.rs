//! Presigned-URL sync client with optimistic concurrency.
//!
//! The portfolio API hands out short-lived presigned URLs for a single
//! object per user. This client:
//! - asks whether a remote copy exists ([`SyncClient::check_remote`])
//! - downloads and decrypts it ([`SyncClient::download_and_decrypt`])
//! - uploads an already sealed container, stating which remote version it
//!   expects to replace ([`SyncClient::upload_encrypted`])
//!
//! Conflicts are detected by the backend and reported, never resolved here.
//! The cached [`SyncState`] is only written after a fully successful call.
//!
//! KDF and AEAD work runs on tokio's blocking pool, so the async methods
//! must be called from within a tokio runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use folio_crypto_core::{envelope, looks_like_container, SecretBuffer};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::auth::TokenProvider;
use crate::error::SyncError;
use crate::settings::{SyncSettings, DEFAULT_CIPHER, DEFAULT_FORMAT_VERSION};
use crate::state::SyncState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Presign endpoint for downloads, relative to the API base.
pub const DOWNLOAD_PRESIGN_PATH: &str = "/portfolio/presign/download";

/// Presign endpoint for uploads, relative to the API base.
pub const UPLOAD_PRESIGN_PATH: &str = "/portfolio/presign/upload";

const OCTET_STREAM: &str = "application/octet-stream";

/// Longest response body kept in an error message, in characters.
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of a remote existence check.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStatus {
    /// `false` when the user has never uploaded a portfolio.
    pub exists: bool,
    /// Presigned GET URL for the object body.
    #[serde(default, rename = "presignedUrl")]
    pub download_url: Option<String>,
    /// Current remote version id.
    #[serde(default)]
    pub version_id: Option<String>,
    /// Current remote `ETag`.
    #[serde(default, rename = "eTag")]
    pub etag: Option<String>,
    /// Object size in bytes.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Last-modified timestamp as reported by the store.
    #[serde(default)]
    pub last_modified: Option<String>,
    /// User metadata tags stored with the object.
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl fmt::Debug for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStatus")
            .field("exists", &self.exists)
            .field("download_url", &self.download_url.as_ref().map(|_| "***"))
            .field("version_id", &self.version_id)
            .field("etag", &self.etag)
            .field("size_bytes", &self.size_bytes)
            .field("last_modified", &self.last_modified)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Options for [`SyncClient::upload_encrypted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Version the caller believes is current. Defaults to the last observed
    /// [`SyncState::remote_version_id`] when `None`.
    pub expected_version_id: Option<String>,
    /// Optional `ETag` precondition.
    pub expected_etag: Option<String>,
    /// `formatVersion` metadata tag.
    pub format_version: String,
    /// `cipher` metadata tag.
    pub cipher: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            expected_version_id: None,
            expected_etag: None,
            format_version: DEFAULT_FORMAT_VERSION.into(),
            cipher: DEFAULT_CIPHER.into(),
        }
    }
}

/// What the backend reported for a completed upload.
///
/// `current_version_id` is the version the backend checked against, not the
/// version just written. Call [`SyncClient::check_remote`] to learn that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    /// Object key in the store.
    pub key: String,
    /// Remote version observed by the backend before the write.
    pub current_version_id: Option<String>,
    /// How the backend compares versions (e.g. `"versionId"`).
    pub versioning_basis: Option<String>,
    /// Bytes uploaded.
    pub size_bytes: u64,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadPresignRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_version_id: Option<&'a str>,
    #[serde(rename = "expectedETag", skip_serializing_if = "Option::is_none")]
    expected_etag: Option<&'a str>,
    content_length: u64,
    format_version: &'a str,
    cipher: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadPresignResponse {
    presigned_url: String,
    key: String,
    #[serde(default)]
    current_version_id: Option<String>,
    #[serde(default)]
    versioning_basis: Option<String>,
    #[serde(default)]
    upload_headers: HashMap<String, String>,
}

/// Error body of the presign endpoints. Conflicts fill the version fields.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_version_id: Option<String>,
    #[serde(default, rename = "currentETag")]
    current_etag: Option<String>,
}

// ---------------------------------------------------------------------------
// SyncClient
// ---------------------------------------------------------------------------

/// Client for the portfolio presign API.
///
/// Operations that write [`SyncState`] take `&mut self`, so at most one
/// of them is in flight per client.
pub struct SyncClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    max_upload_bytes: Option<u64>,
    state: SyncState,
}

impl fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncClient")
            .field("base_url", &self.base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SyncClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConfigured`] when `portfolioApiUrl` is unset
    /// or the HTTP client cannot be built.
    pub fn new(settings: &SyncSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self, SyncError> {
        let base_url = settings
            .portfolio_api_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| SyncError::NotConfigured("portfolioApiUrl is not set".into()))?
            .trim_end_matches('/')
            .to_owned();

        let http = Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| SyncError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            tokens,
            max_upload_bytes: settings.max_upload_bytes,
            state: SyncState::default(),
        })
    }

    /// The last observed remote state.
    #[must_use]
    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    /// API base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Download
    // -----------------------------------------------------------------------

    /// Ask the backend whether a remote portfolio exists.
    ///
    /// `exists = false` is a normal answer, not an error. On success the
    /// cached version id and `ETag` follow the answer; `last_sync_at` is
    /// left alone.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Unauthorized`] without a token or on 401/403.
    /// - [`SyncError::RemoteUnreachable`] on network failure or 5xx.
    /// - [`SyncError::InvalidResponse`] if the body does not parse.
    pub async fn check_remote(&mut self) -> Result<RemoteStatus, SyncError> {
        let resp = self
            .post_presign(DOWNLOAD_PRESIGN_PATH, &serde_json::json!({}))
            .await?;
        if !resp.status().is_success() {
            return Err(presign_error(resp).await);
        }

        let remote: RemoteStatus = resp.json().await.map_err(|e| {
            SyncError::InvalidResponse(format!("download presign: {}", e.without_url()))
        })?;

        if remote.exists {
            self.state.remote_version_id.clone_from(&remote.version_id);
            self.state.remote_etag.clone_from(&remote.etag);
        } else {
            self.state.remote_version_id = None;
            self.state.remote_etag = None;
        }

        debug!(
            exists = remote.exists,
            version_id = remote.version_id.as_deref().unwrap_or_default(),
            size_bytes = remote.size_bytes.unwrap_or_default(),
            "remote checked"
        );
        Ok(remote)
    }

    /// Download the remote portfolio and decrypt it with `password`.
    ///
    /// Returns `Ok(None)` when there is no remote copy yet.
    ///
    /// # Errors
    ///
    /// - [`SyncError::EmptyPassword`] before any request is made.
    /// - [`SyncError::RemoteFormatInvalid`] if the object is not a container.
    /// - [`SyncError::DecryptionFailed`] / [`SyncError::MalformedContainer`]
    ///   from decryption.
    /// - Any error of [`check_remote`](Self::check_remote), plus
    ///   [`SyncError::Unauthorized`] if the presigned URL has expired.
    pub async fn download_and_decrypt(
        &mut self,
        password: &str,
    ) -> Result<Option<SecretBuffer>, SyncError> {
        let password = non_empty(password)?;

        let remote = self.check_remote().await?;
        if !remote.exists {
            debug!("no remote portfolio");
            return Ok(None);
        }
        let url = remote.download_url.ok_or_else(|| {
            SyncError::InvalidResponse("download presign returned no presignedUrl".into())
        })?;

        let bytes = self.fetch_object(&url).await?;
        if !looks_like_container(&bytes) {
            warn!(size_bytes = bytes.len(), "remote object is not a container");
            return Err(SyncError::RemoteFormatInvalid);
        }

        let plaintext =
            tokio::task::spawn_blocking(move || envelope::open(&bytes, password.expose_secret()))
                .await
                .map_err(|e| SyncError::Task(e.to_string()))??;

        self.state.last_sync_at = Some(Utc::now());
        info!(size_bytes = plaintext.len(), "remote portfolio downloaded");
        Ok(Some(plaintext))
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    /// Upload an already sealed container.
    ///
    /// The backend compares `expected_version_id` (or the last observed
    /// version) with the remote and answers 409 on mismatch. The cached
    /// version id is not advanced from the upload response.
    ///
    /// # Errors
    ///
    /// - [`SyncError::ObjectTooLarge`] if over the local limit (no request
    ///   is sent) or rejected with 413.
    /// - [`SyncError::VersionConflict`] carrying the authoritative version.
    /// - [`SyncError::BadRequest`], [`SyncError::Unauthorized`],
    ///   [`SyncError::RemoteUnreachable`], [`SyncError::InvalidResponse`].
    pub async fn upload_encrypted(
        &mut self,
        encrypted: Vec<u8>,
        options: UploadOptions,
    ) -> Result<UploadReceipt, SyncError> {
        let content_length = u64::try_from(encrypted.len()).map_err(|_| SyncError::ObjectTooLarge {
            message: "payload length does not fit in 64 bits".into(),
        })?;
        if let Some(max) = self.max_upload_bytes {
            if content_length > max {
                return Err(SyncError::ObjectTooLarge {
                    message: format!("{content_length} bytes exceeds the {max}-byte limit"),
                });
            }
        }

        let request = UploadPresignRequest {
            expected_version_id: options
                .expected_version_id
                .as_deref()
                .or(self.state.remote_version_id.as_deref()),
            expected_etag: options.expected_etag.as_deref(),
            content_length,
            format_version: &options.format_version,
            cipher: &options.cipher,
        };
        debug!(
            content_length,
            expected_version_id = request.expected_version_id.unwrap_or_default(),
            "requesting upload URL"
        );

        let resp = self.post_presign(UPLOAD_PRESIGN_PATH, &request).await?;
        if !resp.status().is_success() {
            let err = presign_error(resp).await;
            if let SyncError::VersionConflict {
                current_version_id, ..
            } = &err
            {
                info!(
                    current_version_id = current_version_id.as_deref().unwrap_or_default(),
                    "upload rejected: remote version changed"
                );
            }
            return Err(err);
        }

        let presign: UploadPresignResponse = resp.json().await.map_err(|e| {
            SyncError::InvalidResponse(format!("upload presign: {}", e.without_url()))
        })?;

        let headers = upload_headers(&presign.upload_headers)?;
        let put = self
            .http
            .put(&presign.presigned_url)
            .headers(headers)
            .body(encrypted)
            .send()
            .await?;
        let status = put.status();
        if !status.is_success() {
            let body = put.text().await.unwrap_or_default();
            return Err(object_store_error(status, &body, "upload"));
        }

        self.state.last_sync_at = Some(Utc::now());
        info!(size_bytes = content_length, "portfolio uploaded");

        Ok(UploadReceipt {
            key: presign.key,
            current_version_id: presign.current_version_id,
            versioning_basis: presign.versioning_basis,
            size_bytes: content_length,
        })
    }

    /// Seal `raw` database bytes under `password` and upload the container,
    /// expecting the last observed remote version.
    ///
    /// # Errors
    ///
    /// [`SyncError::EmptyPassword`], sealing failures, or any error of
    /// [`upload_encrypted`](Self::upload_encrypted).
    pub async fn upload_local_database(
        &mut self,
        raw: Vec<u8>,
        password: &str,
    ) -> Result<UploadReceipt, SyncError> {
        let password = non_empty(password)?;

        let sealed = tokio::task::spawn_blocking(move || {
            let mut raw = raw;
            let sealed = envelope::seal(&raw, password.expose_secret());
            raw.zeroize();
            sealed
        })
        .await
        .map_err(|e| SyncError::Task(e.to_string()))??;

        self.upload_encrypted(sealed, UploadOptions::default()).await
    }

    // -----------------------------------------------------------------------
    // HTTP helpers
    // -----------------------------------------------------------------------

    async fn post_presign<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, SyncError> {
        let token = self.tokens.bearer_token().await?;
        let resp = self
            .http
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;
        debug!(path, status = resp.status().as_u16(), "presign response");
        Ok(resp)
    }

    async fn fetch_object(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(object_store_error(status, &body, "download"));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn non_empty(password: &str) -> Result<SecretString, SyncError> {
    if password.is_empty() {
        return Err(SyncError::EmptyPassword);
    }
    Ok(SecretString::from(password.to_owned()))
}

/// Map a non-2xx presign endpoint response to the error taxonomy.
async fn presign_error(resp: Response) -> SyncError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                truncate(&body)
            }
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(message),
        StatusCode::CONFLICT => SyncError::VersionConflict {
            message,
            current_version_id: parsed.current_version_id,
            current_etag: parsed.current_etag,
        },
        StatusCode::PAYLOAD_TOO_LARGE => SyncError::ObjectTooLarge { message },
        StatusCode::BAD_REQUEST => SyncError::BadRequest(message),
        s if s.is_server_error() => {
            SyncError::RemoteUnreachable(format!("HTTP {}: {message}", s.as_u16()))
        }
        s => SyncError::UnexpectedStatus {
            status: s.as_u16(),
            body: truncate(&body),
        },
    }
}

/// Map a non-2xx response from a presigned object URL.
fn object_store_error(status: StatusCode, body: &str, operation: &str) -> SyncError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::Unauthorized(format!("presigned {operation} URL rejected or expired"))
        }
        StatusCode::PAYLOAD_TOO_LARGE => SyncError::ObjectTooLarge {
            message: format!("object store rejected the {operation}"),
        },
        StatusCode::PRECONDITION_FAILED => SyncError::VersionConflict {
            message: "remote object changed during upload".into(),
            current_version_id: None,
            current_etag: None,
        },
        s if s.is_server_error() => {
            SyncError::RemoteUnreachable(format!("object store returned HTTP {}", s.as_u16()))
        }
        s => SyncError::UnexpectedStatus {
            status: s.as_u16(),
            body: truncate(body),
        },
    }
}

/// Content type plus the headers the presigned PUT was signed with.
fn upload_headers(extra: &HashMap<String, String>) -> Result<HeaderMap, SyncError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
    for (name, value) in extra {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SyncError::InvalidResponse(format!("invalid upload header name: {name}")))?;
        let value = HeaderValue::from_str(value).map_err(|_| {
            SyncError::InvalidResponse(format!("invalid value for upload header {name}"))
        })?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY).collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
