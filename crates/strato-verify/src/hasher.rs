use digest::Digest;

/// Minimal hasher interface for streaming verification.
/// Implementations must be Send for cross-task safety.
pub trait Hasher: Send {
    /// Update the hash with new data.
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the hash digest.
    /// Consumes self to prevent reuse.
    fn finalize(self) -> Vec<u8>;
}

/// Generic hasher wrapper for any `digest::Digest` implementation.
/// Enables composability with external crates like `md-5` and `sha2`.
pub struct DigestHasher<D: Digest + Send>(D);

impl<D: Digest + Send> DigestHasher<D> {
    /// Create from a digest instance.
    pub fn from_digest(digest: D) -> Self {
        Self(digest)
    }
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

/// Built-in hashers as type aliases and constructors for convenience.

#[cfg(feature = "md5")]
pub type Md5Hasher = DigestHasher<md5::Md5>;

#[cfg(feature = "md5")]
impl Md5Hasher {
    /// Create a new MD5 hasher instance.
    pub fn new() -> Self {
        DigestHasher::from_digest(md5::Md5::new())
    }

    /// One-shot MD5 digest of a byte slice.
    pub fn digest(data: &[u8]) -> Vec<u8> {
        md5::Md5::digest(data).to_vec()
    }
}

#[cfg(feature = "sha256")]
pub type Sha256Hasher = DigestHasher<sha2::Sha256>;

#[cfg(feature = "sha256")]
impl Sha256Hasher {
    /// Create a new SHA-256 hasher instance.
    pub fn new() -> Self {
        DigestHasher::from_digest(sha2::Sha256::new())
    }

    /// One-shot SHA-256 digest of a byte slice.
    pub fn digest(data: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(data).to_vec()
    }
}
