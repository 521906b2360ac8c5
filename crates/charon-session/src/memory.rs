//! In-memory session store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use charon_core::{generate_refresh_token, now_millis, SubjectId};

use crate::context::CallContext;
use crate::error::{Result, SessionError};
use crate::traits::{Session, SessionStore, StartSession};

/// Sessions kept in a map keyed by token.
///
/// Expired sessions are treated as missing and dropped lazily on lookup.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Option<Duration>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Sessions expire `ttl` after they are started.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = now_millis();
        self.sessions
            .read()
            .map(|s| s.values().filter(|s| !is_expired(s, now)).count())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> SessionError {
        SessionError::Backend("session map lock poisoned".into())
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(session: &Session, now: i64) -> bool {
    session.expire_at.is_some_and(|at| now > at)
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn start_session(&self, start: StartSession) -> Result<Session> {
        if start.subject.as_str().is_empty() {
            return Err(SessionError::InvalidArgument("empty subject".into()));
        }

        let token =
            generate_refresh_token().map_err(|e| SessionError::Backend(e.to_string()))?;
        let session = Session {
            token: token.clone(),
            subject: start.subject,
            client: start.client,
            refresh_token: start.refresh_token,
            bag: start.bag,
            expire_at: self.ttl.map(|ttl| now_millis() + ttl.as_millis() as i64),
        };

        self.sessions
            .write()
            .map_err(|_| Self::poisoned())?
            .insert(token, session.clone());

        debug!(subject = %session.subject, "session started");
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> Result<Session> {
        if token.is_empty() {
            return Err(SessionError::InvalidArgument("empty session token".into()));
        }

        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        match sessions.get(token) {
            Some(s) if is_expired(s, now_millis()) => {
                sessions.remove(token);
                Err(SessionError::NotFound)
            }
            Some(s) => Ok(s.clone()),
            None => Err(SessionError::NotFound),
        }
    }

    async fn context_session(&self, ctx: &CallContext) -> Result<Session> {
        match ctx.token() {
            Some(token) => self.get_session(token).await,
            None => Err(SessionError::NotFound),
        }
    }

    async fn delete_sessions(&self, subject: &SubjectId, refresh_token: &str) -> Result<u64> {
        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        let before = sessions.len();
        sessions.retain(|_, s| {
            !(&s.subject == subject && s.refresh_token.as_deref() == Some(refresh_token))
        });
        let removed = (before - sessions.len()) as u64;

        debug!(%subject, removed, "sessions deleted");
        if removed == 0 {
            return Err(SessionError::NotFound);
        }
        Ok(removed)
    }

    async fn abandon_session(&self, token: &str) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(|_| Self::poisoned())?;
        sessions
            .remove(token)
            .map(|_| ())
            .ok_or(SessionError::NotFound)
    }
}
