//! C9 — global and per-host admission control, plus the per-host
//! Ranged/SingleStream state machine.
//!
//! Three bounded, FIFO-fair semaphores (spec 4.9): `global_files`,
//! `per_host_requests`, `per_file_chunks`. `tokio::sync::Semaphore` grants
//! permits in acquisition order, so a slow download's chunks are never
//! starved behind a fast one's.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Consecutive range-request failures at a host before the Governor
/// demotes it to [`HostMode::SingleStream`] (spec 4.9).
pub const RANGE_FAILURE_DEMOTION_THRESHOLD: u32 = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HostMode {
    Unknown,
    Probing,
    Ranged,
    SingleStream,
}

struct HostEntry {
    mode: HostMode,
    consecutive_range_failures: u32,
    semaphore: Arc<Semaphore>,
}

/// Holds all three admission tokens for one chunk attempt. Dropping it
/// releases global, host, and file-scoped capacity together.
pub struct AdmissionTokens {
    _global: OwnedSemaphorePermit,
    _host: OwnedSemaphorePermit,
    _file: OwnedSemaphorePermit,
}

pub struct Governor {
    global_files: Arc<Semaphore>,
    per_host_requests: usize,
    hosts: Mutex<HashMap<String, HostEntry>>,
}

impl Governor {
    pub fn new(global_files: usize, per_host_requests: usize) -> Self {
        Self {
            global_files: Arc::new(Semaphore::new(global_files.max(1))),
            per_host_requests: per_host_requests.max(1),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut hosts = self.hosts.lock().unwrap();
        hosts
            .entry(host.to_string())
            .or_insert_with(|| HostEntry {
                mode: HostMode::Unknown,
                consecutive_range_failures: 0,
                semaphore: Arc::new(Semaphore::new(self.per_host_requests)),
            })
            .semaphore
            .clone()
    }

    pub fn host_mode(&self, host: &str) -> HostMode {
        self.hosts
            .lock()
            .unwrap()
            .get(host)
            .map(|e| e.mode)
            .unwrap_or(HostMode::Unknown)
    }

    pub fn set_host_mode(&self, host: &str, mode: HostMode) {
        let mut hosts = self.hosts.lock().unwrap();
        let entry = hosts.entry(host.to_string()).or_insert_with(|| HostEntry {
            mode: HostMode::Unknown,
            consecutive_range_failures: 0,
            semaphore: Arc::new(Semaphore::new(self.per_host_requests)),
        });
        entry.mode = mode;
        entry.consecutive_range_failures = 0;
    }

    /// Record a range-request failure. Returns `true` exactly when this
    /// call crosses [`RANGE_FAILURE_DEMOTION_THRESHOLD`] and the host was
    /// just demoted to `SingleStream` — the pool should stop issuing
    /// ranged requests to this host and escalate to the fallback.
    pub fn record_range_failure(&self, host: &str) -> bool {
        let mut hosts = self.hosts.lock().unwrap();
        let entry = hosts.entry(host.to_string()).or_insert_with(|| HostEntry {
            mode: HostMode::Ranged,
            consecutive_range_failures: 0,
            semaphore: Arc::new(Semaphore::new(self.per_host_requests)),
        });
        entry.consecutive_range_failures += 1;
        if entry.consecutive_range_failures >= RANGE_FAILURE_DEMOTION_THRESHOLD
            && entry.mode != HostMode::SingleStream
        {
            entry.mode = HostMode::SingleStream;
            true
        } else {
            false
        }
    }

    pub fn record_range_success(&self, host: &str) {
        let mut hosts = self.hosts.lock().unwrap();
        if let Some(entry) = hosts.get_mut(host) {
            entry.consecutive_range_failures = 0;
        }
    }

    /// Acquire all three admission tokens for one chunk attempt, waiting
    /// at each semaphore in turn (spec 4.5: "A chunk waits at a semaphore
    /// for all three tokens before issuing HTTP").
    pub async fn admit(&self, host: &str, per_file_chunks: &Arc<Semaphore>) -> AdmissionTokens {
        let global = self
            .global_files
            .clone()
            .acquire_owned()
            .await
            .expect("global_files semaphore never closed");
        let host_sem = self.host_semaphore(host);
        let host_permit = host_sem
            .acquire_owned()
            .await
            .expect("host semaphore never closed");
        let file_permit = per_file_chunks
            .clone()
            .acquire_owned()
            .await
            .expect("per_file_chunks semaphore never closed");
        AdmissionTokens {
            _global: global,
            _host: host_permit,
            _file: file_permit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admit_grants_tokens_and_releases_on_drop() {
        let governor = Governor::new(1, 1);
        let file_chunks = Arc::new(Semaphore::new(1));

        let tokens = governor.admit("example.com", &file_chunks).await;
        assert_eq!(governor.global_files.available_permits(), 0);
        drop(tokens);
        assert_eq!(governor.global_files.available_permits(), 1);
    }

    #[test]
    fn demotes_host_after_threshold_consecutive_failures() {
        let governor = Governor::new(4, 4);
        for _ in 0..RANGE_FAILURE_DEMOTION_THRESHOLD - 1 {
            assert!(!governor.record_range_failure("host"));
        }
        assert!(governor.record_range_failure("host"));
        assert_eq!(governor.host_mode("host"), HostMode::SingleStream);
    }

    #[test]
    fn success_resets_failure_counter() {
        let governor = Governor::new(4, 4);
        governor.record_range_failure("host");
        governor.record_range_success("host");
        for _ in 0..RANGE_FAILURE_DEMOTION_THRESHOLD - 1 {
            assert!(!governor.record_range_failure("host"));
        }
    }
}
