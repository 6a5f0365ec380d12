use std::io::{self, Read};

use crate::{Hasher, Result, VerificationError};

pub struct VerifiedReader<R, H> {
    inner:  R,
    hasher: H,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(inner: R, hasher: H) -> Self { Self { inner, hasher } }

    pub fn into_inner(self) -> (R, H) { (self.inner, self.hasher) }

    pub fn hasher(&self) -> &H { &self.hasher }
}

impl<R, H: Hasher> VerifiedReader<R, H> {
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.hasher.finalize();
        if actual.as_slice() == expected {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: expected.to_vec(),
                actual,
            })
        }
    }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}
