//! Password hasher doubles.

use charon::hasher::{HashError, PasswordHasher};

const PREFIX: &[u8] = b"plain$";

/// Reversible "hash": the plaintext behind a fixed prefix.
///
/// Lets tests assert on stored digests without a real algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PlainHasher {
    /// The plaintext behind a digest produced by this hasher.
    pub fn reveal(digest: &[u8]) -> Option<&[u8]> {
        digest.strip_prefix(PREFIX)
    }
}

impl PasswordHasher for PlainHasher {
    fn hash(&self, plain: &[u8]) -> Result<Vec<u8>, HashError> {
        let mut digest = PREFIX.to_vec();
        digest.extend_from_slice(plain);
        Ok(digest)
    }

    fn compare(&self, digest: &[u8], plain: &[u8]) -> bool {
        Self::reveal(digest) == Some(plain)
    }
}

/// Hasher that always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingHasher;

impl PasswordHasher for FailingHasher {
    fn hash(&self, _plain: &[u8]) -> Result<Vec<u8>, HashError> {
        Err(HashError("hasher unavailable".into()))
    }

    fn compare(&self, _digest: &[u8], _plain: &[u8]) -> bool {
        false
    }
}
