use crate::hash::ContentHash;

/// Domain-separated BLAKE3 hasher.
///
/// The domain tag is fed to the hasher ahead of the content so that a blob and
/// a tree with identical bytes never share a hash.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file contents.
    pub const BLOB: Self = Self::new("folio-blob-v1");
    /// Hasher for directory listings.
    pub const TREE: Self = Self::new("folio-tree-v1");
    /// Hasher for commit objects.
    pub const COMMIT: Self = Self::new("folio-commit-v1");

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash `data` under this hasher's domain.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_digest(*hasher.finalize().as_bytes())
    }

    /// Returns `true` if `data` hashes to `expected` under this domain.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
