//! Orchestrates one `(url, dest)` download job end to end: resolve → probe
//! → plan → pool (or fallback) → verify/repair → finalize. A batch runner
//! (the CLI) calls [`fetch`] once per job; everything below it is already
//! safe to run concurrently across jobs because it only touches its own
//! `(url, dest)` rows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use modfetch_fs::Staging;
use modfetch_metrics::MetricsSink;
use modfetch_store::{ChunkStatus, DownloadRecord, DownloadStatus, Store};

use crate::cancel::CancelToken;
use crate::error::{FetchError, Result};
use crate::fallback::{run_fallback, FallbackJob, FallbackOutcome};
use crate::finalizer::{finalize, FinalizeJob, FinalizeOutcome};
use crate::governor::{Governor, HostMode};
use crate::http::HttpClient;
use crate::planner::{plan, Plan};
use crate::pool::{run_pool, PoolJob, PoolOutcome, RetryPolicy};
use crate::probe;
use crate::progress::ProgressPublisher;
use crate::verifier::{verify_and_repair, VerifyJob, VerifyOutcome};

#[derive(Debug)]
pub enum FetchOutcome {
    Completed(PathBuf),
    AlreadyPresent(PathBuf),
    Canceled,
}

pub struct FetchJob<'a, C: HttpClient> {
    pub client: &'a C,
    pub store: &'a Store,
    pub governor: &'a Arc<Governor>,
    pub metrics: &'a Arc<dyn MetricsSink>,
    pub progress: &'a Arc<ProgressPublisher>,
    pub url: &'a str,
    pub dest: &'a str,
    pub headers: &'a [(String, String)],
    pub expected_sha256: Option<String>,
    pub partials_root: Option<&'a std::path::Path>,
    pub allow_overwrite: bool,
    pub chunk_size: u64,
    pub per_file_chunks: u32,
    pub cache_ttl: Duration,
    pub cancel: &'a CancelToken,
    pub retry: RetryPolicy,
}

pub async fn fetch<C: HttpClient + Clone + 'static>(job: FetchJob<'_, C>) -> Result<FetchOutcome> {
    let staging = Staging::new(job.dest, job.partials_root)?;

    let now = Utc::now();
    let mut record = job
        .store
        .get_download(job.url, job.dest)?
        .unwrap_or_else(|| DownloadRecord::new(job.url, job.dest, now));
    record.expected_sha256 = record.expected_sha256.or_else(|| job.expected_sha256.clone());

    // A destination left over from a prior finalized run is checked before
    // touching the network at all (spec 4.8's idempotent-success path).
    let dest_path = std::path::Path::new(job.dest);
    if dest_path.exists() && !job.allow_overwrite {
        let actual = modfetch_verify::hash_file(dest_path)?;
        match &record.expected_sha256 {
            Some(expected) if expected == &actual => {
                info!(dest = job.dest, "destination already present with matching digest");
                return Ok(FetchOutcome::AlreadyPresent(dest_path.to_path_buf()));
            }
            Some(_) => return Err(FetchError::DestinationExists(job.dest.to_string())),
            None => {
                info!(dest = job.dest, "destination already present, no prior digest on record");
                record.expected_sha256 = Some(actual);
                record.status = DownloadStatus::Complete;
                record.updated_at = now;
                job.store.upsert_download(&record)?;
                return Ok(FetchOutcome::AlreadyPresent(dest_path.to_path_buf()));
            }
        }
    }

    record.status = DownloadStatus::Running;
    record.updated_at = now;
    job.store.upsert_download(&record)?;

    let host = probe::host_of(job.url)?;

    // A resumed download that already knows its size can skip the network
    // round trip entirely when the host's cached capabilities are still
    // fresh (spec 4.3: "cached in HostCaps for subsequent downloads
    // against the same host within TTL").
    let cached_caps = job.store.get_host_caps(&host)?;
    let reuse_cache = record.size > 0
        && cached_caps
            .as_ref()
            .is_some_and(|caps| probe::caps_fresh(caps, job.cache_ttl, now));

    let outcome = if reuse_cache {
        let caps = cached_caps.expect("checked by reuse_cache");
        info!(url = job.url, host, "reusing cached host capabilities, skipping HEAD");
        probe::ProbeOutcome {
            size: Some(record.size),
            accept_ranges: caps.accept_ranges,
            etag: record.etag.clone(),
            last_modified: record.last_modified.clone(),
            head_ok: caps.head_ok,
        }
    } else {
        probe::probe(job.client, job.store, job.url, job.headers).await?
    };
    record.etag = outcome.etag.clone();
    record.last_modified = outcome.last_modified.clone();

    // A prior run of this same job already recorded a size; if the server
    // now reports a different one, the old chunk rows no longer tile
    // `[0, size)` and must be replanned from scratch rather than partially
    // reused (spec 9, open question ii).
    if let Some(new_size) = outcome.size {
        if record.size > 0 && record.size != new_size {
            warn!(
                url = job.url,
                prior_size = record.size,
                new_size,
                "server-reported size changed since the last probe, discarding chunk state and replanning"
            );
            job.store.delete_chunks(job.url, job.dest)?;
        }
        record.size = new_size;
    }
    record.updated_at = Utc::now();
    job.store.upsert_download(&record)?;

    let plan_result = if job.governor.host_mode(&host) == HostMode::SingleStream {
        Plan::SingleStream
    } else {
        plan(outcome.size, outcome.accept_ranges, job.chunk_size, job.per_file_chunks)
    };

    let stream_outcome = match plan_result {
        Plan::Ranged(ranges) if ranges.is_empty() => {
            // Zero-byte file: nothing to stream, just make sure the staged
            // file exists so finalization has something to rename.
            std::fs::File::create(staging.path()).map_err(|e| {
                FetchError::Filesystem(modfetch_fs::Error::Write {
                    path: staging.path().to_path_buf(),
                    source: e,
                })
            })?;
            StreamResult::Done
        }
        Plan::Ranged(ranges) => {
            job.governor.set_host_mode(&host, HostMode::Ranged);
            let pool_outcome = run_pool(
                PoolJob {
                    client: job.client,
                    store: job.store,
                    governor: job.governor,
                    metrics: job.metrics,
                    progress: job.progress,
                    url: job.url,
                    dest: job.dest,
                    headers: job.headers,
                    staged_path: staging.path(),
                    cancel: job.cancel,
                    retry: job.retry,
                    per_file_chunks: job.per_file_chunks as usize,
                },
                &ranges,
            )
            .await?;

            match pool_outcome {
                PoolOutcome::Complete => StreamResult::Done,
                PoolOutcome::Canceled => StreamResult::Canceled,
                PoolOutcome::Escalate => {
                    warn!(url = job.url, "host demoted to single-stream after repeated range failures, escalating");
                    truncate_to_complete_prefix(job.store, job.url, job.dest, staging.path())?;
                    run_single_stream(&job, &staging, outcome.size).await?
                }
            }
        }
        _ => {
            job.governor.set_host_mode(&host, HostMode::SingleStream);
            run_single_stream(&job, &staging, outcome.size).await?
        }
    };

    match stream_outcome {
        StreamResult::Canceled => {
            record.status = DownloadStatus::Error;
            record.last_error = Some("Canceled".to_string());
            record.updated_at = Utc::now();
            job.store.upsert_download(&record)?;
            return Ok(FetchOutcome::Canceled);
        }
        StreamResult::Done => {}
    }

    let verify_outcome = verify_and_repair(VerifyJob {
        client: job.client,
        store: job.store,
        governor: job.governor,
        metrics: job.metrics,
        progress: job.progress,
        url: job.url,
        dest: job.dest,
        headers: job.headers,
        staged_path: staging.path(),
        expected_sha256: record.expected_sha256.clone(),
        cancel: job.cancel,
        retry: job.retry,
        per_file_chunks: job.per_file_chunks as usize,
    })
    .await?;

    let final_sha = match verify_outcome {
        VerifyOutcome::Verified { sha256 } | VerifyOutcome::Repaired { sha256, .. } => sha256,
        VerifyOutcome::Mismatch { expected, actual } => {
            record.status = DownloadStatus::ChecksumMismatch;
            record.last_error = Some(format!("expected {expected}, got {actual}"));
            record.updated_at = Utc::now();
            job.store.upsert_download(&record)?;
            return Err(FetchError::WholeFileChecksumMismatch { expected, actual });
        }
    };

    let size = std::fs::metadata(staging.path()).map(|m| m.len()).unwrap_or(0);
    let finalize_outcome = finalize(FinalizeJob {
        staging,
        store: job.store,
        url: job.url,
        sha256: final_sha,
        size,
        allow_overwrite: job.allow_overwrite,
    })?;

    info!(url = job.url, dest = job.dest, "fetch job finished");
    match finalize_outcome {
        FinalizeOutcome::Placed(path) => Ok(FetchOutcome::Completed(path)),
        FinalizeOutcome::AlreadyPresent(path) => Ok(FetchOutcome::AlreadyPresent(path)),
    }
}

enum StreamResult {
    Done,
    Canceled,
}

async fn run_single_stream<C: HttpClient + Clone + 'static>(
    job: &FetchJob<'_, C>,
    staging: &Staging,
    size: Option<u64>,
) -> Result<StreamResult> {
    let outcome = run_fallback(FallbackJob {
        client: job.client,
        store: job.store,
        metrics: job.metrics,
        progress: job.progress,
        url: job.url,
        dest: job.dest,
        headers: job.headers,
        staged_path: staging.path(),
        cancel: job.cancel,
        retry: job.retry,
        size,
    })
    .await?;

    match outcome {
        FallbackOutcome::Complete { .. } => Ok(StreamResult::Done),
        FallbackOutcome::Canceled => Ok(StreamResult::Canceled),
    }
}

/// Before escalating a partially-chunked download to single-stream,
/// truncate the staged file to the longest byte-contiguous prefix of
/// chunks still marked `complete` starting at index 0, and drop every
/// chunk row — bytes past that prefix are untrusted once range requests
/// to this host are no longer reliable.
fn truncate_to_complete_prefix(
    store: &Store,
    url: &str,
    dest: &str,
    staged_path: &std::path::Path,
) -> Result<()> {
    let mut chunks = store.list_chunks(url, dest)?;
    chunks.sort_by_key(|c| c.idx);

    let mut prefix_len = 0u64;
    for (expected_idx, chunk) in chunks.iter().enumerate() {
        if chunk.idx != expected_idx as u32 || chunk.status != ChunkStatus::Complete {
            break;
        }
        prefix_len = chunk.end + 1;
    }

    if let Ok(file) = std::fs::OpenOptions::new().write(true).open(staged_path) {
        let _ = file.set_len(prefix_len);
    }
    store.delete_chunks(url, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{BoxStream, GetResponse, HeadInfo};
    use bytes::Bytes;
    use tempfile::tempdir;

    const DATA: &[u8] = b"the quick brown fox jumps over the lazy dog";

    #[derive(Clone, Default)]
    struct WholeFileClient {
        accept_ranges: bool,
    }

    impl HttpClient for WholeFileClient {
        type Error = std::io::Error;

        async fn head(&self, _url: &str, _headers: &[(String, String)]) -> std::result::Result<HeadInfo, Self::Error> {
            Ok(HeadInfo {
                status: 200,
                content_length: Some(DATA.len() as u64),
                accept_ranges: self.accept_ranges,
                etag: Some("\"abc\"".to_string()),
                last_modified: None,
            })
        }

        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            range: Option<(u64, Option<u64>)>,
        ) -> std::result::Result<GetResponse<Self::Error>, Self::Error> {
            let (status, chunk): (u16, Vec<u8>) = match range {
                None => (200, DATA.to_vec()),
                Some((start, end)) => {
                    let end = end.map(|e| e as usize).unwrap_or(DATA.len() - 1);
                    (206, DATA[start as usize..=end].to_vec())
                }
            };
            let body: BoxStream<std::result::Result<Bytes, Self::Error>> =
                Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from(chunk))]));
            Ok(GetResponse {
                status,
                content_length: None,
                content_range_total: None,
                retry_after: None,
                www_authenticate: false,
                body,
            })
        }
    }

    fn retry_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            min_ms: 1,
            max_ms: 2,
            jitter: false,
            retry_after_cap: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn run_job(dir: &std::path::Path, accept_ranges: bool) -> FetchOutcome {
        let store = Store::open(dir.join("db")).unwrap();
        let client = WholeFileClient { accept_ranges };
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(None);
        let cancel = CancelToken::new();
        let dest = dir.join("fox.txt");

        fetch(FetchJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url: "https://example.com/fox.txt",
            dest: &dest.to_string_lossy(),
            headers: &[],
            expected_sha256: None,
            partials_root: None,
            allow_overwrite: false,
            chunk_size: 10,
            per_file_chunks: 4,
            cache_ttl: Duration::from_secs(3600),
            cancel: &cancel,
            retry: retry_policy(),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn end_to_end_ranged_download_completes_and_places_file() {
        let dir = tempdir().unwrap();
        let outcome = run_job(dir.path(), true).await;
        let placed = match outcome {
            FetchOutcome::Completed(p) => p,
            other => panic!("expected Completed, got {other:?}"),
        };
        assert_eq!(std::fs::read(&placed).unwrap(), DATA);
        assert!(dir.path().join("fox.txt.sha256").exists());
    }

    #[tokio::test]
    async fn end_to_end_single_stream_download_completes() {
        let dir = tempdir().unwrap();
        let outcome = run_job(dir.path(), false).await;
        let placed = match outcome {
            FetchOutcome::Completed(p) => p,
            other => panic!("expected Completed, got {other:?}"),
        };
        assert_eq!(std::fs::read(&placed).unwrap(), DATA);
    }

    #[tokio::test]
    async fn rerunning_a_completed_job_without_overwrite_is_idempotent() {
        let dir = tempdir().unwrap();
        run_job(dir.path(), true).await;

        let store = Store::open(dir.path().join("db")).unwrap();
        let client = WholeFileClient { accept_ranges: true };
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(None);
        let cancel = CancelToken::new();
        let dest = dir.path().join("fox.txt");

        // Simulate a fresh staging file for a second run against the same
        // destination; the file is already in place with the right bytes.
        let outcome = fetch(FetchJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url: "https://example.com/fox.txt",
            dest: &dest.to_string_lossy(),
            headers: &[],
            expected_sha256: None,
            partials_root: None,
            allow_overwrite: false,
            chunk_size: 10,
            per_file_chunks: 4,
            cache_ttl: Duration::from_secs(3600),
            cancel: &cancel,
            retry: retry_policy(),
        })
        .await
        .unwrap();

        assert!(matches!(outcome, FetchOutcome::AlreadyPresent(_)));
    }

    #[tokio::test]
    async fn server_size_change_discards_stale_chunks_and_replans() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let dest = dir.path().join("fox.txt");
        let dest_str = dest.to_string_lossy().into_owned();
        let url = "https://example.com/fox.txt";

        // A prior, now-stale run recorded a 5-byte file and one complete
        // chunk tiling it.
        let mut prior = DownloadRecord::new(url, &dest_str, Utc::now());
        prior.size = 5;
        prior.status = DownloadStatus::Running;
        store.upsert_download(&prior).unwrap();
        store
            .upsert_chunk(&modfetch_store::ChunkRecord {
                url: url.to_string(),
                dest: dest_str.clone(),
                idx: 0,
                start: 0,
                end: 4,
                sha256: Some(hex::encode(modfetch_verify::Sha256Hasher::digest(b"alpha"))),
                status: ChunkStatus::Complete,
            })
            .unwrap();
        std::fs::write(dir.path().join("fox.txt.part"), b"alpha").unwrap();

        let client = WholeFileClient { accept_ranges: true };
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(None);
        let cancel = CancelToken::new();

        let outcome = fetch(FetchJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url,
            dest: &dest_str,
            headers: &[],
            expected_sha256: None,
            partials_root: None,
            allow_overwrite: false,
            chunk_size: 10,
            per_file_chunks: 4,
            cache_ttl: Duration::from_secs(3600),
            cancel: &cancel,
            retry: retry_policy(),
        })
        .await
        .unwrap();

        let placed = match outcome {
            FetchOutcome::Completed(p) => p,
            other => panic!("expected Completed, got {other:?}"),
        };
        assert_eq!(std::fs::read(&placed).unwrap(), DATA);

        let record = store.get_download(url, &dest_str).unwrap().unwrap();
        assert_eq!(record.size, DATA.len() as u64);
    }
}
