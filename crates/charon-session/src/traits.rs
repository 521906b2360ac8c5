//! SessionStore trait: the contract of the session-management collaborator.

use std::collections::BTreeMap;

use async_trait::async_trait;
use charon_core::SubjectId;

use crate::context::CallContext;
use crate::error::Result;

/// A live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub subject: SubjectId,
    /// Free-form client identifier supplied on login.
    pub client: String,
    /// Refresh token the session was started with, if any.
    pub refresh_token: Option<String>,
    pub bag: BTreeMap<String, String>,
    /// Unix milliseconds.
    pub expire_at: Option<i64>,
}

/// Input for starting a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSession {
    pub subject: SubjectId,
    pub client: String,
    pub refresh_token: Option<String>,
    pub bag: BTreeMap<String, String>,
}

impl StartSession {
    pub fn new(subject: SubjectId, client: impl Into<String>) -> Self {
        Self {
            subject,
            client: client.into(),
            refresh_token: None,
            bag: BTreeMap::new(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

/// The session store collaborator.
///
/// Missing sessions are reported as [`SessionError::NotFound`]; callers
/// decide whether that is an error.
///
/// [`SessionError::NotFound`]: crate::SessionError::NotFound
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session and return it, token included.
    async fn start_session(&self, start: StartSession) -> Result<Session>;

    async fn get_session(&self, token: &str) -> Result<Session>;

    /// The session bound to the call's ambient context.
    async fn context_session(&self, ctx: &CallContext) -> Result<Session>;

    /// Delete every session of `subject` started with `refresh_token`.
    /// Returns how many were removed; `NotFound` when there were none.
    async fn delete_sessions(&self, subject: &SubjectId, refresh_token: &str) -> Result<u64>;

    async fn abandon_session(&self, token: &str) -> Result<()>;
}
