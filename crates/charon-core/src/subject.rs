//! Session subject identifiers.
//!
//! A session is bound to a subject of the form `charon:user:<id>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Prefix shared by every user subject.
pub const SUBJECT_PREFIX: &str = "charon:user:";

/// Globally unique subject identifier of a user session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn from_user_id(user_id: i64) -> Self {
        Self(format!("{SUBJECT_PREFIX}{user_id}"))
    }

    /// Wrap a raw identifier as received from the session store.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract the numeric user id.
    pub fn user_id(&self) -> Result<i64> {
        let id = self.0.strip_prefix(SUBJECT_PREFIX).ok_or_else(|| {
            CoreError::MalformedSubjectId(format!(
                "expected prefix {SUBJECT_PREFIX}, got {:?}",
                self.0
            ))
        })?;
        if id.is_empty() {
            return Err(CoreError::MalformedSubjectId(format!(
                "missing user id in {:?}",
                self.0
            )));
        }
        id.parse::<i64>()
            .map_err(|e| CoreError::MalformedSubjectId(format!("{:?}: {e}", self.0)))
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for SubjectId {
    fn from(user_id: i64) -> Self {
        Self::from_user_id(user_id)
    }
}
