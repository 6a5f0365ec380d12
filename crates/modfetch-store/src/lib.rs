//! Persistent catalog of downloads, chunks, and host capabilities.
//!
//! Backed by [`sled`], a single-process embedded KV store with internal
//! write serialization: callers get ACID single-writer semantics without
//! taking any locks themselves. Rows are [`postcard`]-encoded and keyed
//! under `dl:`/`ck:`/`hc:` namespaces in one shared tree (see [`keys`]).

mod error;
mod keys;
mod model;
mod store;

pub use error::{Result, StoreError};
pub use model::{ChunkRecord, ChunkStatus, DownloadRecord, DownloadStatus, HostCapsRecord};
pub use store::{IntegrityIssue, Store};
