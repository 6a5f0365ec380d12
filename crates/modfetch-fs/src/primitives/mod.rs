pub mod atomic_write;
pub mod hardlink;
pub mod replace_file;
pub mod symlink;

pub use atomic_write::{atomic_read, atomic_write, AtomicWriteOptions};
pub use hardlink::{hardlink_or_copy, FallbackStrategy, HardlinkOrCopyOptions};
pub use replace_file::{replace_file, ReplaceFileOptions};
pub use symlink::atomic_symlink;
