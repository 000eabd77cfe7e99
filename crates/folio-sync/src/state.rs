//! Last observed remote state.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Advisory cache of what the client last saw on the remote.
///
/// Only fully successful operations write to it. Correctness is enforced
/// by the server-side version check at upload time, not by this cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Last observed remote version id.
    pub remote_version_id: Option<String>,
    /// Last observed remote `ETag`.
    #[serde(rename = "remoteETag")]
    pub remote_etag: Option<String>,
    /// Time of the last successful download or upload (RFC 3339 on the wire).
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// `true` once a download or upload has completed.
    #[must_use]
    pub const fn has_synced(&self) -> bool {
        self.last_sync_at.is_some()
    }
}
