//! Error types for Charon core.

use thiserror::Error;

/// Errors produced by the pure core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("malformed permission: {0}")]
    MalformedPermission(String),

    #[error("empty slice, permissions cannot be registered")]
    EmptyPermissions,

    #[error("subsystem name is empty string, permissions cannot be registered")]
    EmptySubsystem,

    #[error("provided permissions do not belong to one subsystem: expected {expected}, got {got}")]
    InconsistentSubsystem { expected: String, got: String },

    #[error("malformed subject id: {0}")]
    MalformedSubjectId(String),

    #[error("token generation failure: {0}")]
    TokenGeneration(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
