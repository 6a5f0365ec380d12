//! Atomic single-file rename, used by the Finalizer to move a staged `.part`
//! into its final destination.

use crate::{Error, Result};
use std::path::Path;

#[derive(Clone, Copy, Debug)]
pub struct ReplaceFileOptions {
    pub retry_count: u32,
    pub retry_delay: std::time::Duration,
}

impl Default for ReplaceFileOptions {
    fn default() -> Self {
        Self {
            retry_count: 5,
            retry_delay: std::time::Duration::from_millis(100),
        }
    }
}

impl ReplaceFileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn retry_delay(mut self, delay: std::time::Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Atomically rename `src` onto `dest`, replacing any existing file at
/// `dest`. On Unix, `rename(2)` within a filesystem is already atomic. On
/// Windows, an open handle on `dest` can cause transient `ERROR_ACCESS_DENIED`;
/// retry with backoff rather than surface a spurious failure.
pub fn replace_file(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: ReplaceFileOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    #[cfg(unix)]
    {
        let _ = &options;
        std::fs::rename(src, dest).map_err(|e| Error::Rename {
            path: dest.to_path_buf(),
            source: e,
        })
    }

    #[cfg(windows)]
    {
        let mut attempts = 0;
        loop {
            match std::fs::rename(src, dest) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempts += 1;
                    if attempts >= options.retry_count {
                        return Err(Error::Rename {
                            path: dest.to_path_buf(),
                            source: e,
                        });
                    }
                    std::thread::sleep(options.retry_delay * attempts);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_replace_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("staged.part");
        let dest = dir.path().join("final.bin");
        std::fs::write(&src, "data").unwrap();

        replace_file(&src, &dest, ReplaceFileOptions::new()).unwrap();
        assert!(dest.exists());
        assert!(!src.exists());
        assert_eq!(std::fs::read(&dest).unwrap(), b"data");
    }

    #[test]
    fn test_replace_file_overwrites_existing() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("staged.part");
        let dest = dir.path().join("final.bin");
        std::fs::write(&src, "new").unwrap();
        std::fs::write(&dest, "old").unwrap();

        replace_file(&src, &dest, ReplaceFileOptions::new()).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"new");
    }
}
