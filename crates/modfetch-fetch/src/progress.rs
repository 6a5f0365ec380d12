//! Progress snapshots published by the Chunk Worker Pool / Single-Stream
//! Fallback. Spec 4.5: "publishes `(bytes_completed_now, total_bytes)`
//! snapshots at most once per second plus on every chunk completion;
//! consumers (TUI/metrics) poll."

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;

const PUBLISH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub bytes_completed: u64,
    pub total_bytes: Option<u64>,
}

/// Consumer handle; cheap to clone, backed by a `watch` channel so polling
/// never misses the latest value even if several updates land between
/// polls.
pub type ProgressReceiver = watch::Receiver<Progress>;

pub struct ProgressPublisher {
    tx: watch::Sender<Progress>,
    bytes_completed: AtomicU64,
    total_bytes: Option<u64>,
    last_published: Mutex<Instant>,
}

impl ProgressPublisher {
    pub fn new(total_bytes: Option<u64>) -> (Arc<Self>, ProgressReceiver) {
        let (tx, rx) = watch::channel(Progress {
            bytes_completed: 0,
            total_bytes,
        });
        let publisher = Arc::new(Self {
            tx,
            bytes_completed: AtomicU64::new(0),
            total_bytes,
            last_published: Mutex::new(Instant::now() - PUBLISH_INTERVAL),
        });
        (publisher, rx)
    }

    /// Record `n` newly completed bytes. `force` publishes immediately
    /// regardless of cadence — callers set it on chunk completion.
    pub fn add_bytes(&self, n: u64, force: bool) {
        let total = self.bytes_completed.fetch_add(n, Ordering::Relaxed) + n;
        let mut last = self.last_published.lock().unwrap();
        if force || last.elapsed() >= PUBLISH_INTERVAL {
            *last = Instant::now();
            let _ = self.tx.send(Progress {
                bytes_completed: total,
                total_bytes: self.total_bytes,
            });
        }
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            bytes_completed: self.bytes_completed.load(Ordering::Relaxed),
            total_bytes: self.total_bytes,
        }
    }
}
