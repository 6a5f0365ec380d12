//! C7 — Verifier/Repairer. One whole-file SHA-256 pass, and on mismatch a
//! single repair attempt that re-downloads only the chunks whose stored
//! per-chunk digest no longer matches the bytes on disk (spec 4.7).

use std::sync::Arc;

use tracing::{info, warn};

use modfetch_metrics::MetricsSink;
use modfetch_store::{ChunkStatus, Store};
use modfetch_verify::hash_file;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::governor::Governor;
use crate::http::HttpClient;
use crate::planner::PlannedRange;
use crate::pool::{run_pool, PoolJob, PoolOutcome, RetryPolicy};
use crate::positional::read_range_at;
use crate::progress::ProgressPublisher;

#[derive(Debug)]
pub enum VerifyOutcome {
    /// Matched on the first pass, or no expected digest was known so the
    /// computed one is now authoritative.
    Verified { sha256: String },
    /// Mismatched, repaired the dirty chunks, and the recomputed digest
    /// now matches.
    Repaired { sha256: String, repaired_chunks: Vec<u32> },
    /// Mismatched and either unrepairable (no per-chunk records, i.e. a
    /// single-stream download) or still mismatched after one repair pass.
    Mismatch { expected: String, actual: String },
}

pub struct VerifyJob<'a, C: HttpClient> {
    pub client: &'a C,
    pub store: &'a Store,
    pub governor: &'a Arc<Governor>,
    pub metrics: &'a Arc<dyn MetricsSink>,
    pub progress: &'a Arc<ProgressPublisher>,
    pub url: &'a str,
    pub dest: &'a str,
    pub headers: &'a [(String, String)],
    pub staged_path: &'a std::path::Path,
    pub expected_sha256: Option<String>,
    pub cancel: &'a CancelToken,
    pub retry: RetryPolicy,
    pub per_file_chunks: usize,
}

pub async fn verify_and_repair<C: HttpClient + Clone + 'static>(job: VerifyJob<'_, C>) -> Result<VerifyOutcome> {
    let actual = hash_file(job.staged_path)?;

    let expected = match &job.expected_sha256 {
        Some(expected) => expected.clone(),
        None => {
            info!(url = job.url, sha256 = %actual, "no expected digest on record, recording computed digest");
            return Ok(VerifyOutcome::Verified { sha256: actual });
        }
    };

    if expected == actual {
        return Ok(VerifyOutcome::Verified { sha256: actual });
    }

    warn!(url = job.url, expected = %expected, actual = %actual, "whole-file checksum mismatch, attempting repair");

    let chunks = job.store.list_chunks(job.url, job.dest)?;
    if chunks.is_empty() {
        // Single-stream downloads have no per-chunk granularity to repair against.
        return Ok(VerifyOutcome::Mismatch { expected, actual });
    }

    let mut dirty = Vec::new();
    for chunk in &chunks {
        let on_disk = read_range_at(job.staged_path, chunk.start, chunk.end)?;
        let recomputed = hex::encode(modfetch_verify::Sha256Hasher::digest(&on_disk));
        let matches_recorded = chunk.sha256.as_deref() == Some(recomputed.as_str());
        if !matches_recorded {
            dirty.push(PlannedRange {
                idx: chunk.idx,
                start: chunk.start,
                end: chunk.end,
            });
        }
    }

    if dirty.is_empty() {
        // Every chunk matches its own recorded digest, yet the whole-file
        // digest still disagrees — corruption outside any tracked chunk
        // (e.g. a truncated/extended file). Not repairable by re-fetch.
        return Ok(VerifyOutcome::Mismatch { expected, actual });
    }

    for range in &dirty {
        job.store
            .update_chunk_status(job.url, job.dest, range.idx, ChunkStatus::Dirty)?;
    }

    let repaired_idxs: Vec<u32> = dirty.iter().map(|r| r.idx).collect();
    let outcome = run_pool(
        PoolJob {
            client: job.client,
            store: job.store,
            governor: job.governor,
            metrics: job.metrics,
            progress: job.progress,
            url: job.url,
            dest: job.dest,
            headers: job.headers,
            staged_path: job.staged_path,
            cancel: job.cancel,
            retry: job.retry,
            per_file_chunks: job.per_file_chunks,
        },
        &dirty,
    )
    .await?;

    if !matches!(outcome, PoolOutcome::Complete) {
        return Ok(VerifyOutcome::Mismatch { expected, actual });
    }

    let recomputed_whole = hash_file(job.staged_path)?;
    if recomputed_whole == expected {
        info!(url = job.url, repaired = ?repaired_idxs, "repair pass fixed checksum mismatch");
        Ok(VerifyOutcome::Repaired {
            sha256: recomputed_whole,
            repaired_chunks: repaired_idxs,
        })
    } else {
        Ok(VerifyOutcome::Mismatch {
            expected,
            actual: recomputed_whole,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{GetResponse, HeadInfo};
    use bytes::Bytes;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct FixedRangeClient;

    impl HttpClient for FixedRangeClient {
        type Error = std::io::Error;

        async fn head(&self, _url: &str, _headers: &[(String, String)]) -> std::result::Result<HeadInfo, Self::Error> {
            unimplemented!()
        }

        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            range: Option<(u64, Option<u64>)>,
        ) -> std::result::Result<GetResponse<Self::Error>, Self::Error> {
            let (start, end) = range.unwrap();
            let end = end.unwrap();
            let data = vec![b'X'; (end - start + 1) as usize];
            let body: crate::http::BoxStream<std::result::Result<Bytes, Self::Error>> =
                Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from(data))]));
            Ok(GetResponse {
                status: 206,
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
            max_retries: 2,
            min_ms: 1,
            max_ms: 2,
            jitter: false,
            retry_after_cap: std::time::Duration::from_secs(5),
            request_timeout: std::time::Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn verified_when_digest_matches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.part");
        std::fs::write(&path, b"hello world").unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let client = FixedRangeClient;
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(Some(11));
        let cancel = CancelToken::new();

        let expected = hex::encode(modfetch_verify::Sha256Hasher::digest(b"hello world"));
        let outcome = verify_and_repair(VerifyJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url: "https://example.com/f",
            dest: "/dest/f",
            headers: &[],
            staged_path: &path,
            expected_sha256: Some(expected.clone()),
            cancel: &cancel,
            retry: retry_policy(),
            per_file_chunks: 2,
        })
        .await
        .unwrap();

        assert!(matches!(outcome, VerifyOutcome::Verified { sha256 } if sha256 == expected));
    }

    #[tokio::test]
    async fn mismatch_with_no_chunk_rows_is_unrepairable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.part");
        std::fs::write(&path, b"hello world").unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();
        let client = FixedRangeClient;
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(Some(11));
        let cancel = CancelToken::new();

        let outcome = verify_and_repair(VerifyJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url: "https://example.com/f",
            dest: "/dest/f",
            headers: &[],
            staged_path: &path,
            expected_sha256: Some("deadbeef".to_string()),
            cancel: &cancel,
            retry: retry_policy(),
            per_file_chunks: 2,
        })
        .await
        .unwrap();

        assert!(matches!(outcome, VerifyOutcome::Mismatch { .. }));
    }

    #[tokio::test]
    async fn repairs_single_dirty_chunk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f.part");
        // Two 5-byte chunks: [0-4] correct "AAAAA", [5-9] corrupted.
        std::fs::write(&path, b"AAAAACCCCC").unwrap();
        let store = Store::open(dir.path().join("db")).unwrap();

        let good_sha = hex::encode(modfetch_verify::Sha256Hasher::digest(b"AAAAA"));
        store
            .upsert_chunk(&modfetch_store::ChunkRecord {
                url: "https://example.com/f".into(),
                dest: "/dest/f".into(),
                idx: 0,
                start: 0,
                end: 4,
                sha256: Some(good_sha),
                status: ChunkStatus::Complete,
            })
            .unwrap();
        let stale_sha = hex::encode(modfetch_verify::Sha256Hasher::digest(b"BBBBB"));
        store
            .upsert_chunk(&modfetch_store::ChunkRecord {
                url: "https://example.com/f".into(),
                dest: "/dest/f".into(),
                idx: 1,
                start: 5,
                end: 9,
                sha256: Some(stale_sha),
                status: ChunkStatus::Complete,
            })
            .unwrap();

        let client = FixedRangeClient; // always serves "XXXXX" for any requested range
        let governor = Arc::new(Governor::new(4, 4));
        let metrics: Arc<dyn MetricsSink> = Arc::new(modfetch_metrics::NoopSink);
        let (progress, _rx) = ProgressPublisher::new(Some(10));
        let cancel = CancelToken::new();

        let expected = hex::encode(modfetch_verify::Sha256Hasher::digest(b"AAAAAXXXXX"));
        let outcome = verify_and_repair(VerifyJob {
            client: &client,
            store: &store,
            governor: &governor,
            metrics: &metrics,
            progress: &progress,
            url: "https://example.com/f",
            dest: "/dest/f",
            headers: &[],
            staged_path: &path,
            expected_sha256: Some(expected.clone()),
            cancel: &cancel,
            retry: retry_policy(),
            per_file_chunks: 2,
        })
        .await
        .unwrap();

        match outcome {
            VerifyOutcome::Repaired { sha256, repaired_chunks } => {
                assert_eq!(sha256, expected);
                assert_eq!(repaired_chunks, vec![1]);
            }
            other => panic!("expected Repaired, got {other:?}"),
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"AAAAAXXXXX");
    }
}
