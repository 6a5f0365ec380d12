//! Placement of a verified, content-addressed artifact into one or more
//! application-visible target paths.
//!
//! The store keeps exactly one copy of an artifact, keyed by its SHA-256.
//! Placement is how that copy becomes visible at the paths applications
//! actually look for (a model directory, a cache symlink farm, ...). A given
//! artifact can be placed at many targets; placement is idempotent so a
//! re-run of `modfetch place` after a partial failure doesn't redo
//! unnecessary work.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::from_io;
use crate::primitives::{atomic_symlink, hardlink_or_copy, FallbackStrategy, HardlinkOrCopyOptions};
use crate::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceMode {
    /// Symlink the target at the store path. Cheapest, and the default;
    /// breaks if the store path is later moved or pruned.
    #[default]
    Symlink,
    /// Hardlink onto the store path, falling back to a copy across devices.
    Hardlink,
    /// Full copy, independent of the store's lifecycle.
    Copy,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Placement {
    pub target: PathBuf,
    pub mode: PlaceMode,
    /// `false` if the target already existed and was left untouched.
    pub created: bool,
}

/// Place `src` (a verified, already-committed artifact) at every path in
/// `targets`, using `mode`. Returns one [`Placement`] per target, in order.
pub fn place(src: impl AsRef<Path>, targets: &[PathBuf], mode: PlaceMode) -> Result<Vec<Placement>> {
    let src = src.as_ref();
    targets
        .iter()
        .map(|target| place_one(src, target, mode))
        .collect()
}

fn place_one(src: &Path, target: &Path, mode: PlaceMode) -> Result<Placement> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| from_io(parent.to_path_buf(), e))?;
    }

    match mode {
        PlaceMode::Symlink => place_symlink(src, target),
        PlaceMode::Hardlink => place_hardlink_or_copy(src, target, FallbackStrategy::Copy),
        PlaceMode::Copy => place_copy(src, target),
    }
}

fn place_symlink(src: &Path, target: &Path) -> Result<Placement> {
    match std::fs::read_link(target) {
        Ok(existing) if paths_equivalent(&existing, src) => Ok(Placement {
            target: target.to_path_buf(),
            mode: PlaceMode::Symlink,
            created: false,
        }),
        Ok(_) => {
            std::fs::remove_file(target).map_err(|e| from_io(target.to_path_buf(), e))?;
            atomic_symlink(src, target)?;
            Ok(Placement {
                target: target.to_path_buf(),
                mode: PlaceMode::Symlink,
                created: true,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            atomic_symlink(src, target)?;
            Ok(Placement {
                target: target.to_path_buf(),
                mode: PlaceMode::Symlink,
                created: true,
            })
        }
        Err(_) if target.exists() => {
            // Exists but isn't a symlink (a stale regular file/copy).
            std::fs::remove_file(target).map_err(|e| from_io(target.to_path_buf(), e))?;
            atomic_symlink(src, target)?;
            Ok(Placement {
                target: target.to_path_buf(),
                mode: PlaceMode::Symlink,
                created: true,
            })
        }
        Err(e) => Err(from_io(target.to_path_buf(), e)),
    }
}

fn place_hardlink_or_copy(src: &Path, target: &Path, fallback: FallbackStrategy) -> Result<Placement> {
    if target.exists() {
        return Ok(Placement {
            target: target.to_path_buf(),
            mode: PlaceMode::Hardlink,
            created: false,
        });
    }
    hardlink_or_copy(src, target, HardlinkOrCopyOptions::new().fallback(fallback))?;
    Ok(Placement {
        target: target.to_path_buf(),
        mode: PlaceMode::Hardlink,
        created: true,
    })
}

fn place_copy(src: &Path, target: &Path) -> Result<Placement> {
    if target.exists() {
        return Ok(Placement {
            target: target.to_path_buf(),
            mode: PlaceMode::Copy,
            created: false,
        });
    }
    std::fs::copy(src, target).map_err(|e| from_io(target.to_path_buf(), e))?;
    Ok(Placement {
        target: target.to_path_buf(),
        mode: PlaceMode::Copy,
        created: true,
    })
}

fn paths_equivalent(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn symlink_mode_creates_link() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/abcd.bin");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"data").unwrap();
        let target = dir.path().join("models/model.bin");

        let placements = place(&src, &[target.clone()], PlaceMode::Symlink).unwrap();
        assert_eq!(placements.len(), 1);
        assert!(placements[0].created);
        assert_eq!(std::fs::read(&target).unwrap(), b"data");
    }

    #[test]
    fn symlink_mode_is_idempotent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/abcd.bin");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"data").unwrap();
        let target = dir.path().join("models/model.bin");

        place(&src, &[target.clone()], PlaceMode::Symlink).unwrap();
        let second = place(&src, &[target.clone()], PlaceMode::Symlink).unwrap();
        assert!(!second[0].created);
    }

    #[test]
    fn symlink_mode_repairs_stale_link() {
        let dir = tempdir().unwrap();
        let old_src = dir.path().join("store/old.bin");
        let new_src = dir.path().join("store/new.bin");
        std::fs::create_dir_all(dir.path().join("store")).unwrap();
        std::fs::write(&old_src, b"old").unwrap();
        std::fs::write(&new_src, b"new").unwrap();
        let target = dir.path().join("models/model.bin");

        place(&old_src, &[target.clone()], PlaceMode::Symlink).unwrap();
        let second = place(&new_src, &[target.clone()], PlaceMode::Symlink).unwrap();
        assert!(second[0].created);
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }

    #[test]
    fn copy_mode_dedupes_existing_target() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/abcd.bin");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"data").unwrap();
        let target = dir.path().join("models/model.bin");

        place(&src, &[target.clone()], PlaceMode::Copy).unwrap();
        let second = place(&src, &[target.clone()], PlaceMode::Copy).unwrap();
        assert!(!second[0].created);
    }

    #[test]
    fn places_at_multiple_targets() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("store/abcd.bin");
        std::fs::create_dir_all(src.parent().unwrap()).unwrap();
        std::fs::write(&src, b"data").unwrap();
        let targets = vec![
            dir.path().join("a/model.bin"),
            dir.path().join("b/model.bin"),
        ];

        let placements = place(&src, &targets, PlaceMode::Hardlink).unwrap();
        assert_eq!(placements.len(), 2);
        assert!(placements.iter().all(|p| p.created));
    }
}
