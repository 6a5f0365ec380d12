//! Positional (offset-based) writes into the staged file.
//!
//! Multiple chunk tasks write disjoint byte ranges of the same `.part`
//! file concurrently. Per spec section 9 ("do not rely on any
//! language-default append semantics for multi-writer correctness"),
//! every write specifies its absolute offset via `pwrite`/`seek_write`
//! rather than a shared file cursor, so concurrent writers never race.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{FetchError, Result};

#[cfg(unix)]
fn write_at(file: &File, offset: u64, buf: &[u8]) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, mut offset: u64, buf: &[u8]) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    let mut written = 0;
    while written < buf.len() {
        let n = file.seek_write(&buf[written..], offset)?;
        written += n;
        offset += n as u64;
    }
    Ok(())
}

/// Open the staged file for positional writes, creating it if absent
/// without truncating existing bytes (a resume must not lose prior
/// writes), and ensure it is at least `len` bytes long so a chunk late in
/// the file can write at its offset without extending length itself —
/// spec 5's "no task extends the file length beyond its chunk end".
pub fn open_for_positional_write(path: &Path, len: u64) -> Result<File> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .read(true)
        .truncate(false)
        .open(path)
        .map_err(|e| write_error(path, e))?;
    let current_len = file.metadata().map_err(|e| write_error(path, e))?.len();
    if current_len < len {
        file.set_len(len).map_err(|e| write_error(path, e))?;
    }
    Ok(file)
}

/// Write `buf` at absolute `offset` into `file`. Blocking; run inside
/// `tokio::task::spawn_blocking`.
pub fn write_chunk_at(path: &Path, file: &File, offset: u64, buf: &[u8]) -> Result<()> {
    write_at(file, offset, buf).map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Filesystem(modfetch_fs::Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read back the bytes in `[start, end]` (inclusive) for re-hash during
/// repair (spec 4.7).
pub fn read_range_at(path: &Path, start: u64, end: u64) -> Result<Vec<u8>> {
    #[cfg(unix)]
    fn read_at(file: &File, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_at(file: &File, mut offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        use std::os::windows::fs::FileExt;
        let mut read = 0;
        while read < buf.len() {
            let n = file.seek_read(&mut buf[read..], offset)?;
            if n == 0 {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            read += n;
            offset += n as u64;
        }
        Ok(())
    }

    let file = File::open(path).map_err(|e| read_error(path, e))?;
    let len = (end - start + 1) as usize;
    let mut buf = vec![0u8; len];
    read_at(&file, start, &mut buf).map_err(|e| read_error(path, e))?;
    Ok(buf)
}

fn read_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Filesystem(modfetch_fs::Error::Read {
        path: path.to_path_buf(),
        source,
    })
}
