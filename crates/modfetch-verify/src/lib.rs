//! Streaming SHA-256 verification for downloaded artifacts.
//!
//! Incremental hashing that rides along with data movement instead of
//! requiring a second read pass: a [`VerifiedReader`] updates its digest as
//! bytes flow through it, so a chunk write and its checksum share one pass
//! over the buffer.
//!
//! # Example
//!
//! ```
//! use modfetch_verify::{VerifiedReader, Sha256Hasher};
//!
//! let data = b"hello world";
//! let expected = Sha256Hasher::digest(data);
//!
//! let mut reader = VerifiedReader::new(&data[..], Sha256Hasher::new());
//! let mut buffer = Vec::new();
//! std::io::copy(&mut reader, &mut buffer).unwrap();
//! reader.finish(&expected).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::hasher::{DigestHasher, Hasher, Sha256Hasher};
pub use self::reader::VerifiedReader;
pub use self::stream::{hash_file, hash_reader, HASH_BUFFER_SIZE};

mod error;
mod hasher;
mod reader;
mod stream;
