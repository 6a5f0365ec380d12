//! Row types persisted by the store. Plain data, no behavior: the store
//! owns persistence, callers own the state machine transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DownloadStatus {
    Planning,
    Running,
    Complete,
    Error,
    ChecksumMismatch,
    VerifyFailed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub url: String,
    pub dest: String,
    pub expected_sha256: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub size: u64,
    pub status: DownloadStatus,
    pub retries: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl DownloadRecord {
    pub fn new(url: impl Into<String>, dest: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            expected_sha256: None,
            etag: None,
            last_modified: None,
            size: 0,
            status: DownloadStatus::Planning,
            retries: 0,
            created_at: now,
            updated_at: now,
            last_error: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ChunkStatus {
    Pending,
    Running,
    Complete,
    Dirty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub url: String,
    pub dest: String,
    pub idx: u32,
    pub start: u64,
    pub end: u64,
    pub sha256: Option<String>,
    pub status: ChunkStatus,
}

impl ChunkRecord {
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HostCapsRecord {
    pub host: String,
    pub head_ok: bool,
    pub accept_ranges: bool,
    pub updated_at: DateTime<Utc>,
}
