//! Refresh token generation.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{CoreError, Result};

/// Bytes of entropy fed into each token.
pub const SEED_LEN: usize = 64;

/// Length of the hex-encoded token.
pub const TOKEN_LEN: usize = 64;

/// Generate an opaque refresh token.
///
/// A random seed is digested with BLAKE3 and hex encoded, giving a
/// fixed-length token that reveals nothing about the seed.
pub fn generate_refresh_token() -> Result<String> {
    let mut seed = [0u8; SEED_LEN];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|e| CoreError::TokenGeneration(e.to_string()))?;
    Ok(hex::encode(blake3::hash(&seed).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_refresh_token().unwrap();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_tokens_differ() {
        let a = generate_refresh_token().unwrap();
        let b = generate_refresh_token().unwrap();
        assert_ne!(a, b);
    }
}
