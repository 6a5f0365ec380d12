//! Resolves the application-specific target directories an artifact gets
//! placed into (spec 4.10's Placer adapter: "place(src, kind, mode) -> list
//! of created target paths"). The distilled spec treats the directory
//! layout as an external concern; this expansion resolves it with a small
//! `[general.app_dirs]` config table keyed by artifact kind, falling back
//! to a `<download_root>/<kind>/<basename>` convention when a kind has no
//! configured targets.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use modfetch_classify::ArtifactKind;

/// `[general.app_dirs]`: artifact kind name -> directories to place a
/// finalized artifact of that kind into.
pub type AppDirs = HashMap<String, Vec<PathBuf>>;

pub fn target_paths(app_dirs: &AppDirs, download_root: &Path, kind: ArtifactKind, basename: &str) -> Vec<PathBuf> {
    match app_dirs.get(&kind.to_string()) {
        Some(dirs) if !dirs.is_empty() => dirs.iter().map(|d| d.join(basename)).collect(),
        _ => vec![download_root.join(kind.to_string()).join(basename)],
    }
}
