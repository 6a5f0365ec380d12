//! The staged `.part` file an artifact is assembled into before finalization.
//!
//! Unlike a typical staging-workspace abstraction, [`Staging`] does **not**
//! clean up on drop: spec section 5 requires that a canceled or failed
//! download's staged bytes survive so the download can resume. Callers that
//! want the staged file gone (e.g. a checksum mismatch with no repair left)
//! call [`Staging::discard`] explicitly.

use std::path::{Path, PathBuf};

use crate::error::from_io;
use crate::primitives::{replace_file, ReplaceFileOptions};
use crate::Result;

pub struct Staging {
    part_path: PathBuf,
    dest_path: PathBuf,
}

impl Staging {
    /// Compute the staged path for `dest`, rooted either alongside `dest` or
    /// under `partials_root` if one is configured, per spec section 6's
    /// staged-layout contract: `<partials_root or dirname(dest)>/<basename(dest)>.part`.
    pub fn new(dest: impl Into<PathBuf>, partials_root: Option<&Path>) -> Result<Self> {
        let dest_path = dest.into();
        let basename = dest_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        let dir = match partials_root {
            Some(root) => root.to_path_buf(),
            None => dest_path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        std::fs::create_dir_all(&dir).map_err(|e| from_io(dir.clone(), e))?;

        Ok(Self {
            part_path: dir.join(format!("{basename}.part")),
            dest_path,
        })
    }

    /// Path of the staged `.part` file.
    pub fn path(&self) -> &Path {
        &self.part_path
    }

    /// Final destination this staging file will be renamed into.
    pub fn destination(&self) -> &Path {
        &self.dest_path
    }

    /// Current on-disk length of the staged file, `0` if it does not exist
    /// yet. Used to resume the Single-Stream Fallback from the right offset.
    pub fn len(&self) -> Result<u64> {
        match std::fs::metadata(&self.part_path) {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(from_io(self.part_path.clone(), e)),
        }
    }

    /// Atomically rename the staged file onto its destination. Always
    /// overwrites; callers (the Finalizer) are responsible for the
    /// `allow_overwrite` / dest-exists-with-same-sha policy described in
    /// spec section 4.8.
    pub fn commit(self) -> Result<PathBuf> {
        replace_file(&self.part_path, &self.dest_path, ReplaceFileOptions::new())?;
        Ok(self.dest_path)
    }

    /// Discard the staged file, e.g. after an unrepairable checksum mismatch.
    pub fn discard(self) -> Result<()> {
        match std::fs::remove_file(&self.part_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(from_io(self.part_path, e)),
        }
    }
}
