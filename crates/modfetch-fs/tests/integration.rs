use modfetch_fs::{
    atomic_read, atomic_symlink, atomic_write, hardlink_or_copy, replace_file, AtomicWriteOptions,
    FallbackStrategy, HardlinkOrCopyOptions, ReplaceFileOptions,
};
use tempfile::tempdir;

#[test]
fn test_atomic_write_basic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.txt");

    atomic_write(&path, b"hello world", AtomicWriteOptions::new()).unwrap();

    assert!(path.exists());
    assert_eq!(atomic_read(&path).unwrap(), b"hello world");
}

#[test]
fn test_atomic_write_preserves_content_on_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("existing.txt");

    std::fs::write(&path, "original").unwrap();

    let result = atomic_write(&path, b"new content", AtomicWriteOptions::new());

    assert!(result.is_ok());
    assert_eq!(atomic_read(&path).unwrap(), b"new content");
}

#[cfg(unix)]
#[test]
fn test_hardlink_or_copy_hardlink() {
    use std::os::unix::fs::MetadataExt;

    let dir = tempdir().unwrap();
    let src = dir.path().join("source.txt");
    let dest = dir.path().join("hardlink.txt");

    std::fs::write(&src, "shared content").unwrap();

    hardlink_or_copy(&src, &dest, HardlinkOrCopyOptions::new()).unwrap();

    assert!(dest.exists());

    let src_meta = std::fs::metadata(&src).unwrap();
    let dest_meta = std::fs::metadata(&dest).unwrap();

    assert_eq!(src_meta.ino(), dest_meta.ino());
}

#[cfg(not(unix))]
#[test]
fn test_hardlink_or_copy_hardlink() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("source.txt");
    let dest = dir.path().join("hardlink.txt");

    std::fs::write(&src, "shared content").unwrap();

    hardlink_or_copy(&src, &dest, HardlinkOrCopyOptions::new()).unwrap();

    assert!(dest.exists());
    assert_eq!(atomic_read(&dest).unwrap(), b"shared content");
}

#[test]
fn test_hardlink_or_copy_fallback_copy() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("source.txt");
    let dest = dir.path().join("copy.txt");

    std::fs::write(&src, "content to copy").unwrap();

    let options = HardlinkOrCopyOptions::new().fallback(FallbackStrategy::Copy);
    hardlink_or_copy(&src, &dest, options).unwrap();

    assert!(dest.exists());
    assert_eq!(atomic_read(&dest).unwrap(), b"content to copy");
}

#[cfg(unix)]
#[test]
fn test_atomic_write_with_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let path = dir.path().join("executable.sh");

    atomic_write(
        &path,
        b"#!/bin/bash\necho hello",
        AtomicWriteOptions::new().permissions(0o755),
    )
    .unwrap();

    let metadata = std::fs::metadata(&path).unwrap();
    let perms = metadata.permissions().mode();

    assert_eq!(perms & 0o777, 0o755);
}

#[cfg(unix)]
#[test]
fn test_symlink_functionality() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("target_file");
    let link = dir.path().join("symlink");

    std::fs::write(&target, "target content").unwrap();
    atomic_symlink(&target, &link).unwrap();

    assert!(link.is_symlink());
    assert_eq!(atomic_read(&link).unwrap(), b"target content");
}

/// The Finalizer's exact usage: a staged `.part` file renamed onto its
/// destination, replacing whatever (if anything) was there before.
#[test]
fn test_replace_file_stages_into_destination() {
    let dir = tempdir().unwrap();
    let staged = dir.path().join("model.bin.part");
    let dest = dir.path().join("model.bin");

    std::fs::write(&staged, "weights").unwrap();
    replace_file(&staged, &dest, ReplaceFileOptions::new()).unwrap();

    assert!(dest.exists());
    assert!(!staged.exists());
    assert_eq!(atomic_read(&dest).unwrap(), b"weights");
}

#[test]
fn test_replace_file_overwrites_existing_destination() {
    let dir = tempdir().unwrap();
    let staged = dir.path().join("model.bin.part");
    let dest = dir.path().join("model.bin");

    std::fs::write(&dest, "old weights").unwrap();
    std::fs::write(&staged, "new weights").unwrap();
    replace_file(&staged, &dest, ReplaceFileOptions::new()).unwrap();

    assert_eq!(atomic_read(&dest).unwrap(), b"new weights");
}
