//! Error taxonomy for the fetch pipeline, matching the failure classes the
//! driver needs to tell apart: retryable (Network, some Protocol) vs.
//! terminal (Auth, Input, Integrity, Filesystem).

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("TLS handshake failed: {0}")]
    TlsFailure(String),

    #[error("authentication required (HTTP {status}); set the token named by your source's token_env")]
    AuthRequired { status: u16 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("unexpected protocol response: {0}")]
    ProtocolOther(String),

    #[error("range request rejected (HTTP 416)")]
    RangeNotSatisfiable,

    #[error("chunk {idx} checksum mismatch: expected {expected}, got {actual}")]
    ChunkChecksumMismatch {
        idx: u32,
        expected: String,
        actual: String,
    },

    #[error("whole-file checksum mismatch: expected {expected}, got {actual}")]
    WholeFileChecksumMismatch { expected: String, actual: String },

    #[error("filesystem error: {0}")]
    Filesystem(#[from] modfetch_fs::Error),

    #[error("state store error: {0}")]
    Store(#[from] modfetch_store::StoreError),

    #[error("download canceled")]
    Canceled,

    #[error("max retries ({0}) exceeded")]
    MaxRetriesExceeded(u32),

    #[error("destination already exists: {0}")]
    DestinationExists(String),
}

impl FetchError {
    /// Retryable per spec 4.5.2: transient network errors, 5xx, 429. Never
    /// 401/403/404.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::NetworkUnreachable(_)
                | FetchError::TlsFailure(_)
                | FetchError::RateLimited { .. }
                | FetchError::ProtocolOther(_)
        )
    }

    /// Maps onto the CLI exit codes in spec section 6.
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchError::AuthRequired { .. } => 3,
            FetchError::NetworkUnreachable(_) | FetchError::TlsFailure(_) => 4,
            FetchError::ChunkChecksumMismatch { .. } | FetchError::WholeFileChecksumMismatch { .. } => 5,
            FetchError::Filesystem(_) => 6,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Maps a transport-level error (any `HttpClient::Error`) onto the taxonomy.
/// Transport errors are always treated as retryable network failures; a
/// transport never surfaces an HTTP status directly, only connection-level
/// failures (DNS, TCP, TLS, timeout, reset).
pub fn network_error<E: std::fmt::Display>(e: &E) -> FetchError {
    FetchError::NetworkUnreachable(e.to_string())
}
