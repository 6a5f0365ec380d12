//! Content-addressed, resumable, chunk-parallel HTTP download engine.
//!
//! Ties together capability probing (C3), chunk planning (C4), the chunk
//! worker pool (C5) with its single-stream fallback (C6), whole-file
//! verification and repair (C7), and atomic finalization (C8) — all under
//! the admission control and host state machine of the Governor (C9).
//! [`driver::fetch`] runs one `(url, dest)` job end to end; callers driving
//! a batch (the CLI) call it once per job.

pub mod cancel;
pub mod driver;
pub mod error;
pub mod fallback;
pub mod finalizer;
pub mod governor;
pub mod http;
pub mod planner;
pub mod pool;
pub mod positional;
pub mod probe;
pub mod progress;
pub mod verifier;

pub use cancel::CancelToken;
pub use driver::{fetch, FetchJob, FetchOutcome};
pub use error::{FetchError, Result};
pub use fallback::{run_fallback, FallbackJob, FallbackOutcome};
pub use finalizer::{finalize, FinalizeJob, FinalizeOutcome};
pub use governor::Governor;
pub use http::{ClientOptions, GetResponse, HeadInfo, HttpClient, ReqwestClient};
pub use planner::{plan, PlannedRange, Plan};
pub use pool::{run_pool, PoolJob, PoolOutcome, RetryPolicy};
pub use probe::{probe, ProbeOutcome};
pub use progress::{Progress, ProgressPublisher, ProgressReceiver};
pub use verifier::{verify_and_repair, VerifyJob, VerifyOutcome};
