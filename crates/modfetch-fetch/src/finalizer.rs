//! Finalizer. Atomically renames the staged `.part` file onto its
//! destination, writes a `<dest>.sha256` sidecar, and marks the download
//! complete.

use std::path::PathBuf;

use chrono::Utc;
use tracing::info;

use modfetch_fs::{atomic_write, AtomicWriteOptions, Staging};
use modfetch_store::{DownloadStatus, Store};
use modfetch_verify::hash_file;

use crate::error::{FetchError, Result};

#[derive(Debug)]
pub enum FinalizeOutcome {
    /// The staged file was renamed into place.
    Placed(PathBuf),
    /// `allow_overwrite` was false, the destination already existed, and
    /// its digest already matched — treated as success, nothing renamed.
    AlreadyPresent(PathBuf),
}

pub struct FinalizeJob<'a> {
    pub staging: Staging,
    pub store: &'a Store,
    pub url: &'a str,
    pub sha256: String,
    pub size: u64,
    pub allow_overwrite: bool,
}

/// Sidecar format: `"{hex}  {basename}\n"`, matching the conventional
/// `sha256sum` checksum-file layout.
fn sidecar_contents(sha256: &str, basename: &str) -> String {
    format!("{sha256}  {basename}\n")
}

pub fn finalize(job: FinalizeJob<'_>) -> Result<FinalizeOutcome> {
    let dest = job.staging.destination().to_path_buf();

    if dest.exists() && !job.allow_overwrite {
        let existing_sha = hash_file(&dest)?;
        if existing_sha == job.sha256 {
            info!(dest = %dest.display(), "destination already present with matching digest, treating as success");
            job.staging.discard()?;
            return Ok(FinalizeOutcome::AlreadyPresent(dest));
        }
        return Err(FetchError::DestinationExists(dest.display().to_string()));
    }

    let final_path = job.staging.commit()?;

    let basename = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sidecar_path = sidecar_path_for(&final_path);
    atomic_write(
        &sidecar_path,
        sidecar_contents(&job.sha256, &basename).as_bytes(),
        AtomicWriteOptions::new(),
    )?;

    if let Some(mut record) = job.store.get_download(job.url, &final_path.to_string_lossy())? {
        record.status = DownloadStatus::Complete;
        record.expected_sha256 = Some(job.sha256.clone());
        record.size = job.size;
        record.updated_at = Utc::now();
        job.store.upsert_download(&record)?;
    }

    info!(dest = %final_path.display(), sha256 = %job.sha256, "finalized download");
    Ok(FinalizeOutcome::Placed(final_path))
}

fn sidecar_path_for(dest: &std::path::Path) -> PathBuf {
    let mut os = dest.as_os_str().to_os_string();
    os.push(".sha256");
    PathBuf::from(os)
}
