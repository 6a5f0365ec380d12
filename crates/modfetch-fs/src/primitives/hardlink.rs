//! Placement primitive: hardlink a finalized artifact into a target directory,
//! falling back to a copy when the target lives on a different filesystem.

use crate::{Error, Result};
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackStrategy {
    #[default]
    Copy,
    Error,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HardlinkOrCopyOptions {
    pub fallback: FallbackStrategy,
}

impl HardlinkOrCopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fallback(mut self, fallback: FallbackStrategy) -> Self {
        self.fallback = fallback;
        self
    }
}

pub fn hardlink_or_copy(
    src: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    options: HardlinkOrCopyOptions,
) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    match std::fs::hard_link(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            if options.fallback == FallbackStrategy::Copy {
                std::fs::copy(src, dest)
                    .map(drop)
                    .map_err(|e| Error::Write {
                        path: dest.to_path_buf(),
                        source: e,
                    })
            } else {
                Err(Error::CrossDeviceHardlink)
            }
        }
        Err(e) => Err(Error::Write {
            path: dest.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
}

/// `ERROR_NOT_SAME_DEVICE`, Windows' hardlink equivalent of EXDEV.
#[cfg(windows)]
fn is_cross_device(e: &std::io::Error) -> bool {
    const ERROR_NOT_SAME_DEVICE: i32 = 17;
    e.raw_os_error() == Some(ERROR_NOT_SAME_DEVICE)
}
