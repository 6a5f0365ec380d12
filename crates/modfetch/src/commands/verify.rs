//! `modfetch verify --path <file>` — recomputes a file's SHA-256 and, if a
//! `<file>.sha256` sidecar exists, compares against it.

use std::path::{Path, PathBuf};

use modfetch_verify::hash_file;

use crate::cli::VerifyArgs;
use crate::exit::{self, CliError};

pub fn run(args: &VerifyArgs) -> Result<(), CliError> {
    let path = &args.path;
    if !path.is_file() {
        return Err(CliError::bad_input(format!("{} is not a file", path.display())));
    }

    let actual = hash_file(path).map_err(|e| CliError::new(exit::FILESYSTEM, e.to_string()))?;
    let sidecar = sidecar_path(path);

    match read_sidecar_digest(&sidecar) {
        Some(expected) if expected.eq_ignore_ascii_case(&actual) => {
            println!("{actual}  {}  OK", path.display());
            Ok(())
        }
        Some(expected) => {
            println!("{actual}  {}  FAILED (sidecar says {expected})", path.display());
            Err(CliError::new(
                exit::CHECKSUM,
                format!("checksum mismatch: expected {expected}, got {actual}"),
            ))
        }
        None => {
            println!("{actual}  {}  (no sidecar on disk)", path.display());
            Ok(())
        }
    }
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".sha256");
    PathBuf::from(os)
}

fn read_sidecar_digest(sidecar: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(sidecar).ok()?;
    contents.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn matches_sidecar_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"weights").unwrap();
        let digest = hash_file(&path).unwrap();
        std::fs::write(sidecar_path(&path), format!("{digest}  model.bin\n")).unwrap();

        let args = VerifyArgs { path: path.clone() };
        assert!(run(&args).is_ok());
    }

    #[test]
    fn reports_mismatch_against_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"weights").unwrap();
        std::fs::write(sidecar_path(&path), "0000000000000000000000000000000000000000000000000000000000000000  model.bin\n").unwrap();

        let args = VerifyArgs { path: path.clone() };
        let err = run(&args).unwrap_err();
        assert_eq!(err.code, exit::CHECKSUM);
    }

    #[test]
    fn succeeds_without_a_sidecar() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"weights").unwrap();

        let args = VerifyArgs { path: path.clone() };
        assert!(run(&args).is_ok());
    }
}
