//! Error types for the policy module.

use thiserror::Error;

/// A policy decision against the caller. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// The actor lacks the permission, ownership or clearance required.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The request asks for something no actor may ask for this way.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl PolicyError {
    pub(crate) fn denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }
}

/// Result type for policy decisions.
pub type Result<T> = std::result::Result<T, PolicyError>;
