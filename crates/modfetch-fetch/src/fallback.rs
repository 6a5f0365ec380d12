//! C6 — Single-Stream Fallback. Used when the Probe reports no range
//! support, the file size is unknown, or the Chunk Worker Pool escalates
//! after repeated range failures at a host (spec 4.6, 4.9).
//!
//! Unlike the Pool, there is exactly one logical "chunk" here: the whole
//! file. Progress and retry still follow the same shape (a pseudo-chunk
//! row in the store) so callers above the pipeline never special-case
//! single-stream mode.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{info, warn};

use modfetch_metrics::MetricsSink;
use modfetch_store::{ChunkRecord, ChunkStatus, Store};
use modfetch_verify::hash_file;

use crate::cancel::CancelToken;
use crate::error::{network_error, FetchError, Result};
use crate::http::HttpClient;
use crate::pool::RetryPolicy;
use crate::progress::ProgressPublisher;

/// Index reserved for the single pseudo-chunk a fallback download is
/// recorded as, so chunk listing stays uniform between Ranged and
/// SingleStream downloads.
pub const PSEUDO_CHUNK_IDX: u32 = 0;

#[derive(Debug)]
pub enum FallbackOutcome {
    Complete { size: u64 },
    Canceled,
}

pub struct FallbackJob<'a, C: HttpClient> {
    pub client: &'a C,
    pub store: &'a Store,
    pub metrics: &'a Arc<dyn MetricsSink>,
    pub progress: &'a Arc<ProgressPublisher>,
    pub url: &'a str,
    pub dest: &'a str,
    pub headers: &'a [(String, String)],
    pub staged_path: &'a Path,
    pub cancel: &'a CancelToken,
    pub retry: RetryPolicy,
    /// Declared size from the Probe, if known. Drives the 416 short-circuit
    /// (spec 8: "if staged length >= server size, single-stream completes
    /// with status complete and no bytes written").
    pub size: Option<u64>,
}

pub async fn run_fallback<C: HttpClient>(job: FallbackJob<'_, C>) -> Result<FallbackOutcome> {
    job.store.upsert_chunk(&ChunkRecord {
        url: job.url.to_string(),
        dest: job.dest.to_string(),
        idx: PSEUDO_CHUNK_IDX,
        start: 0,
        end: job.size.map(|s| s.saturating_sub(1)).unwrap_or(0),
        sha256: None,
        status: ChunkStatus::Running,
    })?;

    let mut attempt = 0u32;
    loop {
        if job.cancel.is_cancelled() {
            job.store
                .update_chunk_status(job.url, job.dest, PSEUDO_CHUNK_IDX, ChunkStatus::Pending)?;
            return Ok(FallbackOutcome::Canceled);
        }

        match attempt_stream(&job).await {
            Ok(StreamAttempt::AlreadyComplete) => {
                info!(url = job.url, "fallback target already complete (416)");
                return finish(&job);
            }
            Ok(StreamAttempt::Streamed { .. }) => {
                return finish(&job);
            }
            Err(FetchError::Canceled) => {
                job.store
                    .update_chunk_status(job.url, job.dest, PSEUDO_CHUNK_IDX, ChunkStatus::Pending)?;
                return Ok(FallbackOutcome::Canceled);
            }
            Err(e) if !e.is_retryable() => {
                job.store
                    .update_chunk_status(job.url, job.dest, PSEUDO_CHUNK_IDX, ChunkStatus::Pending)?;
                return Err(e);
            }
            Err(e) => {
                warn!(url = job.url, error = %e, attempt, "single-stream attempt failed, resuming from current length");
                attempt += 1;
                job.metrics.inc_retries();
                if attempt >= job.retry.max_retries {
                    job.store.update_chunk_status(
                        job.url,
                        job.dest,
                        PSEUDO_CHUNK_IDX,
                        ChunkStatus::Pending,
                    )?;
                    return Err(FetchError::MaxRetriesExceeded(attempt));
                }
                let retry_after = match &e {
                    FetchError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = job.retry.delay(retry_after);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = job.cancel.cancelled() => {
                        job.store.update_chunk_status(job.url, job.dest, PSEUDO_CHUNK_IDX, ChunkStatus::Pending)?;
                        return Ok(FallbackOutcome::Canceled);
                    }
                }
            }
        }
    }
}

fn finish<C: HttpClient>(job: &FallbackJob<'_, C>) -> Result<FallbackOutcome> {
    let sha = hash_file(job.staged_path)?;
    let total_len = std::fs::metadata(job.staged_path)
        .map(|m| m.len())
        .unwrap_or(0);
    job.store.upsert_chunk(&ChunkRecord {
        url: job.url.to_string(),
        dest: job.dest.to_string(),
        idx: PSEUDO_CHUNK_IDX,
        start: 0,
        end: total_len.saturating_sub(1),
        sha256: Some(sha),
        status: ChunkStatus::Complete,
    })?;
    // Bytes were already reported as they streamed (attempt_stream's read
    // loop calls `add_bytes` per chunk); force a publish of the
    // already-accumulated total instead of adding them again here.
    job.progress.add_bytes(0, true);
    info!(url = job.url, bytes = total_len, "single-stream fallback completed");
    Ok(FallbackOutcome::Complete { size: total_len })
}

enum StreamAttempt {
    AlreadyComplete,
    Streamed { total_len: u64 },
}

async fn attempt_stream<C: HttpClient>(job: &FallbackJob<'_, C>) -> Result<StreamAttempt> {
    let current_len = std::fs::metadata(job.staged_path).map(|m| m.len()).unwrap_or(0);

    let range = if current_len > 0 {
        Some((current_len, None))
    } else {
        None
    };

    let response = tokio::time::timeout(job.retry.request_timeout, job.client.get(job.url, job.headers, range))
        .await
        .map_err(|_| FetchError::NetworkUnreachable("fallback request timed out".to_string()))?
        .map_err(|e| network_error(&e))?;

    match response.status {
        416 => {
            if let Some(size) = job.size {
                if current_len >= size {
                    return Ok(StreamAttempt::AlreadyComplete);
                }
            } else {
                return Ok(StreamAttempt::AlreadyComplete);
            }
            return Err(FetchError::RangeNotSatisfiable);
        }
        200 | 206 => {}
        401 | 403 => return Err(FetchError::AuthRequired { status: response.status }),
        404 => return Err(FetchError::NotFound(job.url.to_string())),
        429 => return Err(FetchError::RateLimited { retry_after: response.retry_after }),
        s if (500..600).contains(&s) => return Err(FetchError::ProtocolOther(format!("HTTP {s}"))),
        s => return Err(FetchError::ProtocolOther(format!("unexpected status {s}"))),
    }

    // A server that answers a ranged request with 200 ignored the Range
    // header and is sending the whole body from byte 0: truncate and
    // restart rather than append a duplicated prefix.
    let restart_from_zero = current_len > 0 && response.status == 200;
    let mut offset = if restart_from_zero { 0 } else { current_len };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(restart_from_zero)
        .open(job.staged_path)
        .map_err(|e| FetchError::Filesystem(modfetch_fs::Error::Write {
            path: job.staged_path.to_path_buf(),
            source: e,
        }))?;
    if !restart_from_zero {
        use std::io::Seek;
        file.seek(std::io::SeekFrom::End(0)).map_err(|e| {
            FetchError::Filesystem(modfetch_fs::Error::Write {
                path: job.staged_path.to_path_buf(),
                source: e,
            })
        })?;
    }

    let mut body = response.body;
    let mut bytes_this_attempt = 0u64;
    loop {
        let next = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => return Err(FetchError::Canceled),
            chunk = body.next() => chunk,
        };
        let Some(item) = next else { break };
        let bytes = item.map_err(|e| network_error(&e))?;
        if bytes.is_empty() {
            continue;
        }
        file.write_all(&bytes).map_err(|e| {
            FetchError::Filesystem(modfetch_fs::Error::Write {
                path: job.staged_path.to_path_buf(),
                source: e,
            })
        })?;
        offset += bytes.len() as u64;
        bytes_this_attempt += bytes.len() as u64;
        job.progress.add_bytes(bytes.len() as u64, false);
    }

    if let Some(size) = job.size {
        if offset != size {
            return Err(FetchError::ProtocolOther(format!(
                "short single-stream read: got {offset} of {size} bytes"
            )));
        }
    }

    Ok(StreamAttempt::Streamed { total_len: bytes_this_attempt })
}
