use sha2::digest::Digest as ShaDigest;

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

pub struct Sha256Hasher(sha2::Sha256);

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }
    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self(sha2::Sha256::new())
    }

    pub fn digest(data: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(data).to_vec()
    }
}

/// Generic over any `sha2`-style digest, for call sites that want to be
/// explicit about the algorithm at the type level instead of going through
/// [`Sha256Hasher`].
pub struct DigestHasher<D: ShaDigest + Send>(D);

impl<D: ShaDigest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }
    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

impl<D: ShaDigest + Send + Default> Default for DigestHasher<D> {
    fn default() -> Self {
        Self(D::default())
    }
}
