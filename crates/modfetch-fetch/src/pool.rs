//! The Chunk Worker Pool. Fetches a download's planned ranges in
//! parallel under admission control, with per-chunk retry/backoff,
//! positional writes, and incremental SHA-256.
//!
//! This is the hardest subsystem in the pipeline: every chunk task
//! independently retries, writes only within its own byte range, and
//! can be cooperatively cancelled without leaking its admission tokens.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rand::Rng;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use modfetch_metrics::MetricsSink;
use modfetch_store::{ChunkStatus, Store};
use modfetch_verify::{Hasher, Sha256Hasher};

use crate::cancel::CancelToken;
use crate::error::{network_error, FetchError, Result};
use crate::governor::Governor;
use crate::http::HttpClient;
use crate::planner::PlannedRange;
use crate::positional::write_chunk_at;
use crate::progress::ProgressPublisher;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_ms: u64,
    pub max_ms: u64,
    pub jitter: bool,
    /// Policy ceiling on a server-supplied `Retry-After`: honored, but
    /// never allowed to stall a job past this bound.
    pub retry_after_cap: Duration,
    pub request_timeout: Duration,
}

impl RetryPolicy {
    fn delay(&self, retry_after: Option<Duration>) -> Duration {
        if let Some(d) = retry_after {
            return d.min(self.retry_after_cap);
        }
        if self.jitter && self.max_ms > self.min_ms {
            Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
        } else {
            Duration::from_millis(self.min_ms)
        }
    }
}

#[derive(Debug)]
pub enum PoolOutcome {
    /// Every planned range is `complete`.
    Complete,
    /// The host was demoted to single-stream mode after repeated range
    /// failures; caller should re-plan via the Single-Stream Fallback.
    Escalate,
    Canceled,
}

/// Everything a chunk task needs, borrowed for the lifetime of one
/// `run_pool` call. Grouped so `run_pool`'s signature stays readable.
pub struct PoolJob<'a, C: HttpClient> {
    pub client: &'a C,
    pub store: &'a Store,
    pub governor: &'a Arc<Governor>,
    pub metrics: &'a Arc<dyn MetricsSink>,
    pub progress: &'a Arc<ProgressPublisher>,
    pub url: &'a str,
    pub dest: &'a str,
    pub headers: &'a [(String, String)],
    pub staged_path: &'a Path,
    pub cancel: &'a CancelToken,
    pub retry: RetryPolicy,
    pub per_file_chunks: usize,
}

/// Run every chunk in `ranges` that is not already `complete`, to
/// completion, escalation, or cancellation.
pub async fn run_pool<C: HttpClient + 'static>(job: PoolJob<'_, C>, ranges: &[PlannedRange]) -> Result<PoolOutcome>
where
    C: Clone,
{
    if ranges.is_empty() {
        return Ok(PoolOutcome::Complete);
    }

    let total_size: u64 = ranges.iter().map(|r| r.size()).sum();
    let file_len = ranges.last().map(|r| r.end + 1).unwrap_or(0);
    let file = Arc::new(crate::positional::open_for_positional_write(job.staged_path, file_len)?);
    let host = crate::probe::host_of(job.url)?;
    let file_chunks = Arc::new(Semaphore::new(job.per_file_chunks.max(1)));

    // Sibling abort for escalation/permanent-failure: a host-level "stop
    // the other chunks" signal, distinct from `job.cancel`. `job.cancel` is
    // caller-owned and, for a batch, shared across every job in the batch
    // (spec 5's cooperative cancel is a user action) — it must never be
    // poisoned by one chunk's 404 or by an escalation that the driver is
    // about to recover from via the Single-Stream Fallback.
    let abort = CancelToken::new();

    let existing = job.store.list_chunks(job.url, job.dest)?;
    let mut completed_bytes = 0u64;
    let mut pending = Vec::new();
    for range in ranges {
        // Match on the full range, not just the index: a replan after a
        // server-reported size change reuses indices 0..N for a different
        // tiling, and a stale row must not be mistaken for this one.
        let already_complete = existing
            .iter()
            .find(|c| c.idx == range.idx && c.start == range.start && c.end == range.end)
            .is_some_and(|c| c.status == ChunkStatus::Complete);
        if already_complete {
            completed_bytes += range.size();
        } else {
            job.store.upsert_chunk(&modfetch_store::ChunkRecord {
                url: job.url.to_string(),
                dest: job.dest.to_string(),
                idx: range.idx,
                start: range.start,
                end: range.end,
                sha256: None,
                status: ChunkStatus::Pending,
            })?;
            pending.push(*range);
        }
    }
    job.progress.add_bytes(completed_bytes, true);

    let mut set = tokio::task::JoinSet::new();
    for range in pending {
        let client = job.client.clone();
        let store = job.store.clone_handle();
        let governor_admit_host = host.clone();
        let url = job.url.to_string();
        let dest = job.dest.to_string();
        let headers = job.headers.to_vec();
        let cancel = job.cancel.clone();
        let abort = abort.clone();
        let progress = job.progress.clone();
        let file = file.clone();
        let staged_path = job.staged_path.to_path_buf();
        let file_chunks = file_chunks.clone();
        let retry = job.retry;
        let governor = job.governor.clone();
        let metrics = job.metrics.clone();

        set.spawn(async move {
            let result = run_chunk(ChunkCtx {
                client: &client,
                store: &store,
                governor: governor.as_ref(),
                metrics: metrics.as_ref(),
                url: &url,
                dest: &dest,
                headers: &headers,
                host: &governor_admit_host,
                staged_path: &staged_path,
                file: &file,
                file_chunks: &file_chunks,
                cancel: &cancel,
                abort: &abort,
                retry,
                progress: &progress,
            }, range)
            .await;
            (range, result)
        });
    }

    let mut escalate = false;
    let mut first_error: Option<FetchError> = None;
    while let Some(joined) = set.join_next().await {
        let (range, result) = joined.map_err(|e| FetchError::ProtocolOther(format!("chunk task panicked: {e}")))?;
        match result {
            Ok(()) => {}
            Err(FetchError::Canceled) => {
                // Either `job.cancel` was cancelled by the caller (handled
                // below via `job.cancel.is_cancelled()`), or this chunk
                // backed off because a sibling already tripped `abort` for
                // escalation/a permanent failure — the branches below
                // already recorded that reason, nothing further to do here.
            }
            Err(FetchError::RangeNotSatisfiable) if job.governor.host_mode(&host) == crate::governor::HostMode::SingleStream => {
                escalate = true;
                abort.cancel();
            }
            Err(e) => {
                warn!(url = job.url, idx = range.idx, error = %e, "chunk failed permanently");
                first_error.get_or_insert(e);
                abort.cancel();
            }
        }
    }

    if job.cancel.is_cancelled() {
        return Ok(PoolOutcome::Canceled);
    }
    if escalate {
        return Ok(PoolOutcome::Escalate);
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    info!(url = job.url, bytes = total_size, "pool completed all chunks");
    Ok(PoolOutcome::Complete)
}

struct ChunkCtx<'a, C: HttpClient> {
    client: &'a C,
    store: &'a Store,
    governor: &'a Governor,
    metrics: &'a dyn MetricsSink,
    url: &'a str,
    dest: &'a str,
    headers: &'a [(String, String)],
    host: &'a str,
    staged_path: &'a Path,
    file: &'a Arc<File>,
    file_chunks: &'a Arc<Semaphore>,
    cancel: &'a CancelToken,
    /// Internal sibling-abort signal (escalation or a permanent failure
    /// elsewhere in this pool run) — distinct from `cancel`, which is the
    /// caller-owned, batch-wide user cancellation token.
    abort: &'a CancelToken,
    retry: RetryPolicy,
    progress: &'a Arc<ProgressPublisher>,
}

async fn run_chunk<C: HttpClient>(ctx: ChunkCtx<'_, C>, range: PlannedRange) -> Result<()> {
    ctx.store
        .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Running)?;

    let mut attempt = 0u32;
    loop {
        if ctx.cancel.is_cancelled() || ctx.abort.is_cancelled() {
            ctx.store
                .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
            return Err(FetchError::Canceled);
        }

        let tokens = ctx.governor.admit(ctx.host, ctx.file_chunks).await;
        let outcome = fetch_and_write_range(&ctx, range).await;
        drop(tokens);

        match outcome {
            Ok(sha) => {
                ctx.store.update_chunk_sha(ctx.url, ctx.dest, range.idx, sha)?;
                ctx.governor.record_range_success(ctx.host);
                ctx.progress.add_bytes(range.size(), true);
                ctx.metrics.add_bytes(range.size());
                return Ok(());
            }
            Err(FetchError::Canceled) => {
                ctx.store
                    .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                return Err(FetchError::Canceled);
            }
            Err(FetchError::RangeNotSatisfiable) => {
                ctx.store
                    .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                ctx.governor.record_range_failure(ctx.host);
                return Err(FetchError::RangeNotSatisfiable);
            }
            Err(e) if !e.is_retryable() => {
                ctx.store
                    .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                return Err(e);
            }
            Err(e) => {
                ctx.store
                    .update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                attempt += 1;
                ctx.metrics.inc_retries();
                if attempt >= ctx.retry.max_retries {
                    return Err(FetchError::MaxRetriesExceeded(attempt));
                }
                let retry_after = match &e {
                    FetchError::RateLimited { retry_after } => *retry_after,
                    _ => None,
                };
                let delay = ctx.retry.delay(retry_after);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancel.cancelled() => {
                        ctx.store.update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                        return Err(FetchError::Canceled);
                    }
                    _ = ctx.abort.cancelled() => {
                        ctx.store.update_chunk_status(ctx.url, ctx.dest, range.idx, ChunkStatus::Pending)?;
                        return Err(FetchError::Canceled);
                    }
                }
            }
        }
    }
}

/// Issue the ranged GET, stream the body into the staged file at its
/// absolute offsets, and return the hex SHA-256 of the bytes received.
/// Any failure mid-write leaves the range's bytes untrusted — the next
/// attempt re-requests the whole range from scratch (spec 4.5.3).
async fn fetch_and_write_range<C: HttpClient>(ctx: &ChunkCtx<'_, C>, range: PlannedRange) -> Result<String> {
    let response = tokio::time::timeout(
        ctx.retry.request_timeout,
        ctx.client.get(ctx.url, ctx.headers, Some((range.start, Some(range.end)))),
    )
    .await
    .map_err(|_| FetchError::NetworkUnreachable("chunk request timed out".to_string()))?
    .map_err(|e| network_error(&e))?;

    match response.status {
        200 | 206 => {}
        401 | 403 => return Err(FetchError::AuthRequired { status: response.status }),
        404 => return Err(FetchError::NotFound(ctx.url.to_string())),
        416 => return Err(FetchError::RangeNotSatisfiable),
        429 => return Err(FetchError::RateLimited { retry_after: response.retry_after }),
        s if (500..600).contains(&s) => return Err(FetchError::ProtocolOther(format!("HTTP {s}"))),
        s => return Err(FetchError::ProtocolOther(format!("unexpected status {s}"))),
    }

    let mut hasher = Sha256Hasher::new();
    let mut offset = range.start;
    let mut body = response.body;

    loop {
        let next = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(FetchError::Canceled),
            _ = ctx.abort.cancelled() => return Err(FetchError::Canceled),
            chunk = body.next() => chunk,
        };
        let Some(item) = next else { break };
        let bytes = item.map_err(|e| network_error(&e))?;
        if bytes.is_empty() {
            continue;
        }
        hasher.update(&bytes);

        let file = ctx.file.clone();
        let path = ctx.staged_path.to_path_buf();
        let write_offset = offset;
        tokio::task::spawn_blocking(move || write_chunk_at(&path, &file, write_offset, &bytes))
            .await
            .map_err(|e| FetchError::ProtocolOther(format!("write task panicked: {e}")))??;
        offset += bytes.len() as u64;
    }

    if offset != range.end + 1 {
        return Err(FetchError::ProtocolOther(format!(
            "short read for range {}-{}: received {} of {} bytes",
            range.start,
            range.end,
            offset - range.start,
            range.size()
        )));
    }

    Ok(hex::encode(hasher.finalize()))
}
