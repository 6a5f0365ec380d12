//! Cross-platform atomic filesystem primitives for staged downloads and
//! placement.
//!
//! This crate owns the parts of the download pipeline that touch the
//! filesystem directly: writing a `.part` staging file, atomically renaming
//! it into place, and placing the finalized artifact into application target
//! directories via symlink, hardlink, or copy.

mod error;
mod permissions;
mod place;
mod primitives;
mod staging;

pub use error::{Error, Result};
pub use permissions::PermissionMode;

pub use primitives::{
    atomic_read, atomic_symlink, atomic_write, hardlink_or_copy, replace_file, AtomicWriteOptions,
    FallbackStrategy, HardlinkOrCopyOptions, ReplaceFileOptions,
};

pub use place::{place, PlaceMode, Placement};
pub use staging::Staging;
