//! Error types for modfetch-fs.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to rename into place at {path}: {source}")]
    Rename { path: PathBuf, source: io::Error },

    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("destination already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("destination path is a directory: {0}")]
    DestinationIsDirectory(PathBuf),

    #[error("cross-device hardlink not supported")]
    CrossDeviceHardlink,

    #[error("symlink not supported on this platform")]
    SymlinkNotSupported,
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn from_io(path: PathBuf, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path),
        io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
        _ => Error::Write { path, source: err },
    }
}
