use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::keys::Keys;
use crate::model::{ChunkRecord, ChunkStatus, DownloadRecord, DownloadStatus, HostCapsRecord};

/// An integrity anomaly found by [`Store::check_integrity`]. Never fatal on
/// its own; `repair_orphans` acts on `OrphanChunks`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IntegrityIssue {
    /// Chunk rows exist for a `(url, dest)` with no matching download row.
    OrphanChunks { url: String, dest: String, count: usize },
    /// A download is marked complete but has no recorded size.
    CompleteWithZeroSize { url: String, dest: String },
}

/// Single-process writer, ACID single-tree catalog of downloads, chunks,
/// and per-host capabilities. Concurrent reads are safe; sled serializes
/// writes internally so callers never need external locking.
///
/// Cheap to clone: `sled::Db` is itself an `Arc` over the shared pagecache,
/// so every clone talks to the same underlying database.
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    path: PathBuf,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    /// A cheap handle to the same store, for handing to a spawned task
    /// that outlives the borrow the caller holds.
    pub fn clone_handle(&self) -> Self {
        self.clone()
    }

    // -- downloads ----------------------------------------------------

    pub fn upsert_download(&self, record: &DownloadRecord) -> Result<()> {
        let key = Keys::download_key(&record.url, &record.dest);
        let val = postcard::to_allocvec(record)?;
        self.db.insert(key, val)?;
        Ok(())
    }

    pub fn get_download(&self, url: &str, dest: &str) -> Result<Option<DownloadRecord>> {
        let key = Keys::download_key(url, dest);
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(Keys::download_prefix()) {
            let (_, val) = entry?;
            out.push(postcard::from_bytes(&val)?);
        }
        Ok(out)
    }

    pub fn delete_download(&self, url: &str, dest: &str) -> Result<()> {
        let key = Keys::download_key(url, dest);
        self.db.remove(key)?;
        Ok(())
    }

    // -- chunks ---------------------------------------------------------

    pub fn upsert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let key = Keys::chunk_key(&record.url, &record.dest, record.idx);
        let val = postcard::to_allocvec(record)?;
        self.db.insert(key, val)?;
        Ok(())
    }

    pub fn list_chunks(&self, url: &str, dest: &str) -> Result<Vec<ChunkRecord>> {
        let mut out = Vec::new();
        for entry in self.db.scan_prefix(Keys::chunk_prefix(url, dest)) {
            let (_, val) = entry?;
            out.push(postcard::from_bytes(&val)?);
        }
        Ok(out)
    }

    pub fn update_chunk_status(
        &self,
        url: &str,
        dest: &str,
        idx: u32,
        status: ChunkStatus,
    ) -> Result<()> {
        self.mutate_chunk(url, dest, idx, |chunk| chunk.status = status)
    }

    pub fn update_chunk_sha(&self, url: &str, dest: &str, idx: u32, sha256: String) -> Result<()> {
        self.mutate_chunk(url, dest, idx, |chunk| {
            chunk.sha256 = Some(sha256);
            chunk.status = ChunkStatus::Complete;
        })
    }

    fn mutate_chunk(
        &self,
        url: &str,
        dest: &str,
        idx: u32,
        f: impl FnOnce(&mut ChunkRecord),
    ) -> Result<()> {
        let key = Keys::chunk_key(url, dest, idx);
        let Some(bytes) = self.db.get(&key)? else {
            warn!(url, dest, idx, "update on untracked chunk");
            return Ok(());
        };
        let mut chunk: ChunkRecord = postcard::from_bytes(&bytes)?;
        f(&mut chunk);
        let val = postcard::to_allocvec(&chunk)?;
        self.db.insert(key, val)?;
        Ok(())
    }

    pub fn delete_chunks(&self, url: &str, dest: &str) -> Result<()> {
        let prefix = Keys::chunk_prefix(url, dest);
        let keys: Vec<_> = self
            .db
            .scan_prefix(&prefix)
            .keys()
            .collect::<std::result::Result<_, _>>()?;
        for key in keys {
            self.db.remove(key)?;
        }
        Ok(())
    }

    // -- host caps --------------------------------------------------------

    pub fn upsert_host_caps(&self, record: &HostCapsRecord) -> Result<()> {
        let key = Keys::host_caps_key(&record.host);
        let val = postcard::to_allocvec(record)?;
        self.db.insert(key, val)?;
        Ok(())
    }

    pub fn get_host_caps(&self, host: &str) -> Result<Option<HostCapsRecord>> {
        let key = Keys::host_caps_key(host);
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(postcard::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- maintenance ------------------------------------------------------

    /// Scan for anomalies without modifying anything. Callers decide whether
    /// to act (e.g. via `repair_orphans`).
    pub fn check_integrity(&self) -> Result<Vec<IntegrityIssue>> {
        let mut issues = Vec::new();

        let mut orphan_counts: std::collections::HashMap<(String, String), usize> =
            std::collections::HashMap::new();
        for entry in self.db.scan_prefix(Keys::chunk_table_prefix()) {
            let (key, val) = entry?;
            let Some(dl_key) = Keys::chunk_key_download_prefix(&key) else {
                continue;
            };
            if self.db.get(&dl_key)?.is_none() {
                let chunk: ChunkRecord = postcard::from_bytes(&val)?;
                *orphan_counts
                    .entry((chunk.url.clone(), chunk.dest.clone()))
                    .or_insert(0) += 1;
            }
        }
        for ((url, dest), count) in orphan_counts {
            issues.push(IntegrityIssue::OrphanChunks { url, dest, count });
        }

        for download in self.list_downloads()? {
            if matches!(download.status, DownloadStatus::Complete) && download.size == 0 {
                issues.push(IntegrityIssue::CompleteWithZeroSize {
                    url: download.url,
                    dest: download.dest,
                });
            }
        }

        Ok(issues)
    }

    /// Remove chunk rows whose `(url, dest)` has no matching download row.
    /// Returns the number of rows removed.
    pub fn repair_orphans(&self) -> Result<usize> {
        let mut removed = 0;
        let mut to_remove = Vec::new();
        for entry in self.db.scan_prefix(Keys::chunk_table_prefix()) {
            let (key, _) = entry?;
            let Some(dl_key) = Keys::chunk_key_download_prefix(&key) else {
                continue;
            };
            if self.db.get(&dl_key)?.is_none() {
                to_remove.push(key);
            }
        }
        for key in to_remove {
            self.db.remove(key)?;
            removed += 1;
        }
        debug!(removed, "repair_orphans complete");
        Ok(removed)
    }

    /// Flush and ask sled to reclaim space freed by removed/overwritten keys.
    pub fn vacuum(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Copy the entire store to `dest` (a directory that must not exist).
    pub fn backup(&self, dest: impl AsRef<Path>) -> Result<()> {
        self.db.flush()?;
        copy_dir_recursive(&self.path, dest.as_ref())
    }
}

fn copy_dir_recursive(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(entry.path(), target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
