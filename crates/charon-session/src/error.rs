//! Error types for the session module.

use thiserror::Error;

/// Errors reported by a session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No session matches the token, subject or ambient context.
    #[error("session not found")]
    NotFound,

    /// The request handed to the store was malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session call canceled")]
    Canceled,

    #[error("session call deadline exceeded")]
    DeadlineExceeded,

    /// Any other failure of the backing store.
    #[error("session backend error: {0}")]
    Backend(String),
}

/// Why a call stopped before its work completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupt {
    #[error("canceled")]
    Canceled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl From<Interrupt> for SessionError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Canceled => Self::Canceled,
            Interrupt::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
