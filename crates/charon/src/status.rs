//! Caller-facing failure taxonomy.
//!
//! Every service operation fails with a [`Status`]. Collaborator errors are
//! classified into a [`Code`] exactly once, at the point they are received;
//! nothing downstream re-derives the code.

use std::error::Error as StdError;
use std::fmt;

use charon_core::CoreError;
use charon_policy::PolicyError;
use charon_session::{Interrupt, SessionError};
use charon_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Machine-readable failure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Canceled,
    DeadlineExceeded,
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "invalid argument",
            Code::Unauthenticated => "unauthenticated",
            Code::PermissionDenied => "permission denied",
            Code::NotFound => "not found",
            Code::AlreadyExists => "already exists",
            Code::FailedPrecondition => "failed precondition",
            Code::Canceled => "canceled",
            Code::DeadlineExceeded => "deadline exceeded",
            Code::Internal => "internal",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// A classified failure with an optional underlying cause.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct Status {
    code: Code,
    message: String,
    #[source]
    cause: Option<Cause>,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// Status wrapping a collaborator error.
    pub fn with_cause(
        code: Code,
        message: impl Into<String>,
        cause: impl Into<Cause>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(Code::Unauthenticated, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(Code::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Code::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(Code::AlreadyExists, message)
    }

    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition, message)
    }

    /// Internal failure caused by a collaborator. Logged here, once.
    pub fn internal(message: impl Into<String>, cause: impl Into<Cause>) -> Self {
        let status = Self::with_cause(Code::Internal, message, cause);
        error!(message = %status.message, cause = ?status.cause, "internal failure");
        status
    }
}

impl From<PolicyError> for Status {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::PermissionDenied(msg) => Status::permission_denied(msg),
            PolicyError::InvalidArgument(msg) => Status::invalid_argument(msg),
        }
    }
}

impl From<Interrupt> for Status {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Canceled => Status::new(Code::Canceled, "call canceled"),
            Interrupt::DeadlineExceeded => Status::new(Code::DeadlineExceeded, "deadline exceeded"),
        }
    }
}

/// Storage failures. `NotFound`, `AlreadyExists` and dependents keep their
/// meaning; everything else is internal.
impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::NotFound { .. } => Code::NotFound,
            StoreError::AlreadyExists { .. } => Code::AlreadyExists,
            StoreError::Dependent { .. } => Code::FailedPrecondition,
            _ => return Status::internal("storage failure", err),
        };
        Status::with_cause(code, err.to_string(), err)
    }
}

/// Session store failures. `NotFound` is surfaced as is; callers that
/// treat it differently match on the [`SessionError`] before converting.
impl From<SessionError> for Status {
    fn from(err: SessionError) -> Self {
        let code = match err {
            SessionError::NotFound => Code::NotFound,
            SessionError::InvalidArgument(_) => Code::InvalidArgument,
            SessionError::Canceled => Code::Canceled,
            SessionError::DeadlineExceeded => Code::DeadlineExceeded,
            SessionError::Backend(_) => return Status::internal("session store failure", err),
        };
        Status::with_cause(code, err.to_string(), err)
    }
}

/// Core errors reaching the service come from caller input, except token
/// generation which is an entropy failure.
impl From<CoreError> for Status {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TokenGeneration(_) => Status::internal("token generation failed", err),
            other => Status::invalid_argument(other.to_string()),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, Status>;
