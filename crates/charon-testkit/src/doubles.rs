//! Session store doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use charon_core::SubjectId;
use charon_session::{
    CallContext, MemorySessionStore, Result, Session, SessionError, SessionStore, StartSession,
};

/// In-memory session store that counts calls and can be slowed down.
#[derive(Debug, Default)]
pub struct RecordingSessionStore {
    inner: MemorySessionStore,
    lookup_delay: Option<Duration>,
    lookups: AtomicUsize,
    deletes: AtomicUsize,
}

impl RecordingSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every session lookup, for deadline and cancellation tests.
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// How many times `get_session` or `context_session` ran.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// How many times `delete_sessions` ran, whatever its outcome.
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    async fn delay(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl SessionStore for RecordingSessionStore {
    async fn start_session(&self, start: StartSession) -> Result<Session> {
        self.inner.start_session(start).await
    }

    async fn get_session(&self, token: &str) -> Result<Session> {
        self.delay().await;
        self.inner.get_session(token).await
    }

    async fn context_session(&self, ctx: &CallContext) -> Result<Session> {
        self.delay().await;
        self.inner.context_session(ctx).await
    }

    async fn delete_sessions(&self, subject: &SubjectId, refresh_token: &str) -> Result<u64> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_sessions(subject, refresh_token).await
    }

    async fn abandon_session(&self, token: &str) -> Result<()> {
        self.inner.abandon_session(token).await
    }
}

/// Session store whose every call fails with the same error.
#[derive(Debug, Clone, Copy)]
pub enum FailingSessionStore {
    Backend,
    Canceled,
    DeadlineExceeded,
}

impl FailingSessionStore {
    fn error(&self) -> SessionError {
        match self {
            Self::Backend => SessionError::Backend("session store unavailable".into()),
            Self::Canceled => SessionError::Canceled,
            Self::DeadlineExceeded => SessionError::DeadlineExceeded,
        }
    }
}

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn start_session(&self, _start: StartSession) -> Result<Session> {
        Err(self.error())
    }

    async fn get_session(&self, _token: &str) -> Result<Session> {
        Err(self.error())
    }

    async fn context_session(&self, _ctx: &CallContext) -> Result<Session> {
        Err(self.error())
    }

    async fn delete_sessions(&self, _subject: &SubjectId, _refresh_token: &str) -> Result<u64> {
        Err(self.error())
    }

    async fn abandon_session(&self, _token: &str) -> Result<()> {
        Err(self.error())
    }
}
