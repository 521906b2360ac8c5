//! Password hashing capability.
//!
//! The service never picks an algorithm; it is handed a [`PasswordHasher`].

use thiserror::Error;

/// The hasher could not produce a digest.
#[derive(Debug, Error)]
#[error("password hashing failed: {0}")]
pub struct HashError(pub String);

/// One-way password digest and comparison.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &[u8]) -> Result<Vec<u8>, HashError>;

    /// True if `plain` produces `digest`.
    fn compare(&self, digest: &[u8], plain: &[u8]) -> bool;
}

impl<H: PasswordHasher + ?Sized> PasswordHasher for std::sync::Arc<H> {
    fn hash(&self, plain: &[u8]) -> Result<Vec<u8>, HashError> {
        (**self).hash(plain)
    }

    fn compare(&self, digest: &[u8], plain: &[u8]) -> bool {
        (**self).compare(digest, plain)
    }
}
