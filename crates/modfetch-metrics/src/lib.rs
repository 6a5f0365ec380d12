//! Counters and gauges for the download pipeline, behind a narrow trait so
//! the core never depends on a concrete exporter.
//!
//! [`TextfileSink`] is the one real implementation: it accumulates in
//! memory with atomics and writes a Prometheus text-exposition snapshot to
//! disk via [`modfetch_fs::atomic_write`], so a reader (node_exporter's
//! textfile collector, or a human with `cat`) never observes a half-written
//! file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use modfetch_fs::AtomicWriteOptions;

/// Narrow metrics surface the core pipeline calls into. Implementations
/// MAY no-op (see [`NoopSink`]) or persist (see [`TextfileSink`]).
pub trait MetricsSink: Send + Sync {
    fn add_bytes(&self, n: u64);
    fn inc_retries(&self);
    fn inc_success(&self);
    fn observe_download_seconds(&self, seconds: f64);
    fn inc_active(&self, delta: i64);
}

#[derive(Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn add_bytes(&self, _n: u64) {}
    fn inc_retries(&self) {}
    fn inc_success(&self) {}
    fn observe_download_seconds(&self, _seconds: f64) {}
    fn inc_active(&self, _delta: i64) {}
}

struct Counters {
    bytes_total: AtomicU64,
    retries_total: AtomicU64,
    successes_total: AtomicU64,
    download_seconds_sum_millis: AtomicU64,
    download_seconds_count: AtomicU64,
    active_downloads: AtomicI64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            bytes_total: AtomicU64::new(0),
            retries_total: AtomicU64::new(0),
            successes_total: AtomicU64::new(0),
            download_seconds_sum_millis: AtomicU64::new(0),
            download_seconds_count: AtomicU64::new(0),
            active_downloads: AtomicI64::new(0),
        }
    }
}

/// In-memory metrics that can snapshot themselves to a Prometheus textfile.
/// Cheap to clone: internally an `Arc` over the counters.
#[derive(Clone)]
pub struct TextfileSink {
    counters: Arc<Counters>,
}

impl Default for TextfileSink {
    fn default() -> Self {
        Self {
            counters: Arc::new(Counters::default()),
        }
    }
}

impl TextfileSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the current counters as Prometheus text exposition format.
    pub fn snapshot(&self) -> String {
        let c = &self.counters;
        let sum_seconds = c.download_seconds_sum_millis.load(Ordering::Relaxed) as f64 / 1000.0;

        let mut out = String::new();
        out.push_str("# HELP modfetch_bytes_total Bytes downloaded.\n");
        out.push_str("# TYPE modfetch_bytes_total counter\n");
        out.push_str(&format!(
            "modfetch_bytes_total {}\n",
            c.bytes_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP modfetch_retries_total Chunk/stream retries.\n");
        out.push_str("# TYPE modfetch_retries_total counter\n");
        out.push_str(&format!(
            "modfetch_retries_total {}\n",
            c.retries_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP modfetch_successes_total Downloads that reached complete.\n");
        out.push_str("# TYPE modfetch_successes_total counter\n");
        out.push_str(&format!(
            "modfetch_successes_total {}\n",
            c.successes_total.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP modfetch_download_seconds Download wall-clock duration.\n");
        out.push_str("# TYPE modfetch_download_seconds histogram\n");
        out.push_str(&format!(
            "modfetch_download_seconds_sum {sum_seconds}\n"
        ));
        out.push_str(&format!(
            "modfetch_download_seconds_count {}\n",
            c.download_seconds_count.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP modfetch_active_downloads Downloads currently in flight.\n");
        out.push_str("# TYPE modfetch_active_downloads gauge\n");
        out.push_str(&format!(
            "modfetch_active_downloads {}\n",
            c.active_downloads.load(Ordering::Relaxed)
        ));

        out
    }

    /// Atomically write the current snapshot to `path`.
    pub fn write_textfile(&self, path: impl AsRef<Path>) -> modfetch_fs::Result<()> {
        let snapshot = self.snapshot();
        modfetch_fs::atomic_write(path, snapshot.as_bytes(), AtomicWriteOptions::new())
    }
}

impl MetricsSink for TextfileSink {
    fn add_bytes(&self, n: u64) {
        self.counters.bytes_total.fetch_add(n, Ordering::Relaxed);
    }

    fn inc_retries(&self) {
        self.counters.retries_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_success(&self) {
        self.counters.successes_total.fetch_add(1, Ordering::Relaxed);
    }

    fn observe_download_seconds(&self, seconds: f64) {
        let millis = (seconds.max(0.0) * 1000.0).round() as u64;
        self.counters
            .download_seconds_sum_millis
            .fetch_add(millis, Ordering::Relaxed);
        self.counters
            .download_seconds_count
            .fetch_add(1, Ordering::Relaxed);
    }

    fn inc_active(&self, delta: i64) {
        self.counters.active_downloads.fetch_add(delta, Ordering::Relaxed);
    }
}

/// A [`TextfileSink`] paired with the path it writes to, for callers (the
/// CLI binary) that want a single handle to pass down the pipeline and
/// flush on a timer.
pub struct TimerSink {
    sink: TextfileSink,
    path: PathBuf,
}

impl TimerSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: TextfileSink::new(),
            path: path.into(),
        }
    }

    pub fn sink(&self) -> TextfileSink {
        self.sink.clone()
    }

    pub fn flush(&self) -> modfetch_fs::Result<()> {
        self.sink.write_textfile(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn snapshot_reflects_recorded_metrics() {
        let sink = TextfileSink::new();
        sink.add_bytes(1024);
        sink.inc_retries();
        sink.inc_success();
        sink.observe_download_seconds(2.5);
        sink.inc_active(1);

        let snapshot = sink.snapshot();
        assert!(snapshot.contains("modfetch_bytes_total 1024"));
        assert!(snapshot.contains("modfetch_retries_total 1"));
        assert!(snapshot.contains("modfetch_successes_total 1"));
        assert!(snapshot.contains("modfetch_download_seconds_sum 2.5"));
        assert!(snapshot.contains("modfetch_active_downloads 1"));
    }

    #[test]
    fn inc_active_can_go_negative_direction() {
        let sink = TextfileSink::new();
        sink.inc_active(3);
        sink.inc_active(-2);
        assert!(sink.snapshot().contains("modfetch_active_downloads 1"));
    }

    #[test]
    fn write_textfile_is_atomic_and_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("modfetch.prom");
        let sink = TextfileSink::new();
        sink.add_bytes(42);
        sink.write_textfile(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("modfetch_bytes_total 42"));
    }

    #[test]
    fn noop_sink_does_not_panic() {
        let sink = NoopSink;
        sink.add_bytes(1);
        sink.inc_retries();
        sink.inc_success();
        sink.observe_download_seconds(1.0);
        sink.inc_active(1);
    }
}
