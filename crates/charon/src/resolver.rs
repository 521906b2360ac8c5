//! Actor resolution: session token to identity plus effective permissions.

use charon_policy::Actor;
use charon_session::{CallContext, Session, SessionError, SessionStore};
use charon_store::Store;
use tracing::debug;

use crate::status::{Result, Status};

/// Turns the session bound to a call into an [`Actor`].
///
/// Read-only and idempotent: resolve once per call, then discard.
pub struct ActorResolver<'a, S: ?Sized, SS: ?Sized> {
    store: &'a S,
    sessions: &'a SS,
}

impl<'a, S, SS> ActorResolver<'a, S, SS>
where
    S: Store + ?Sized,
    SS: SessionStore + ?Sized,
{
    pub fn new(store: &'a S, sessions: &'a SS) -> Self {
        Self { store, sessions }
    }

    /// Resolve the actor of the call.
    ///
    /// An explicit token in the context wins over the ambient session.
    pub async fn resolve(&self, ctx: &CallContext) -> Result<Actor> {
        let session = match ctx.token() {
            Some(token) => self.sessions.get_session(token).await,
            None => self.sessions.context_session(ctx).await,
        };
        self.actor_for(session, ctx.is_local()).await
    }

    /// Resolve the actor owning `token`, regardless of the call's own token.
    pub async fn resolve_token(&self, ctx: &CallContext, token: &str) -> Result<Actor> {
        let session = self.sessions.get_session(token).await;
        self.actor_for(session, ctx.is_local()).await
    }

    async fn actor_for(
        &self,
        session: std::result::Result<Session, SessionError>,
        is_local: bool,
    ) -> Result<Actor> {
        let session = match session {
            Ok(session) => session,
            Err(SessionError::NotFound) if is_local => {
                debug!("no session, local trusted caller");
                return Ok(Actor::local());
            }
            Err(SessionError::NotFound) => {
                return Err(Status::unauthenticated("session not found"));
            }
            Err(err @ (SessionError::Canceled | SessionError::DeadlineExceeded)) => {
                return Err(err.into());
            }
            Err(err) => return Err(Status::internal("session lookup failed", err)),
        };

        let user_id = session
            .subject
            .user_id()
            .map_err(|err| Status::internal("session bound to malformed subject", err))?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await
            .map_err(|err| Status::internal("user lookup failed", err))?
            .ok_or_else(|| Status::permission_denied("actor does not exist"))?;

        let permissions = self
            .store
            .find_permissions_by_user_id(user.id)
            .await
            .map_err(|err| Status::internal("permission lookup failed", err))?;

        debug!(
            user_id = user.id,
            permissions = permissions.len(),
            "actor resolved"
        );

        // Local trust only stands in for a missing session.
        Ok(Actor::new(user, permissions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charon_core::{catalogue, NewUser, Permissions, SubjectId};
    use charon_session::{MemorySessionStore, StartSession};
    use charon_store::MemoryStore;

    use crate::status::Code;

    /// Session store that fails every call with a fixed error.
    struct Broken(fn() -> SessionError);

    #[async_trait]
    impl SessionStore for Broken {
        async fn start_session(&self, _: StartSession) -> charon_session::Result<Session> {
            Err((self.0)())
        }
        async fn get_session(&self, _: &str) -> charon_session::Result<Session> {
            Err((self.0)())
        }
        async fn context_session(&self, _: &CallContext) -> charon_session::Result<Session> {
            Err((self.0)())
        }
        async fn delete_sessions(&self, _: &SubjectId, _: &str) -> charon_session::Result<u64> {
            Err((self.0)())
        }
        async fn abandon_session(&self, _: &str) -> charon_session::Result<()> {
            Err((self.0)())
        }
    }

    async fn login(sessions: &MemorySessionStore, user_id: i64) -> String {
        sessions
            .start_session(StartSession::new(SubjectId::from_user_id(user_id), "test"))
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn test_resolves_user_and_permissions() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let user = store
            .create_user(NewUser {
                username: "alice".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        store
            .insert_missing_permissions(&catalogue::catalogue())
            .await
            .unwrap();
        store
            .set_user_permissions(
                user.id,
                &Permissions::from(vec![catalogue::GROUP_CAN_RETRIEVE]),
            )
            .await
            .unwrap();

        let token = login(&sessions, user.id).await;
        let ctx = CallContext::new().with_token(token);
        let actor = ActorResolver::new(&store, &sessions).resolve(&ctx).await.unwrap();

        assert_eq!(actor.id(), user.id);
        assert!(actor.has(&catalogue::GROUP_CAN_RETRIEVE));
        assert!(!actor.is_local);
    }

    #[tokio::test]
    async fn test_session_wins_over_local_trust() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let user = store
            .create_user(NewUser {
                username: "mallory".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let token = login(&sessions, user.id).await;
        let ctx = CallContext::new().with_token(token).local();
        let actor = ActorResolver::new(&store, &sessions).resolve(&ctx).await.unwrap();

        assert_eq!(actor.id(), user.id);
        assert!(!actor.is_local);
        assert!(!actor.is_anonymous_local());
    }

    #[tokio::test]
    async fn test_missing_session() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let resolver = ActorResolver::new(&store, &sessions);

        let err = resolver.resolve(&CallContext::new()).await.unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let actor = resolver.resolve(&CallContext::new().local()).await.unwrap();
        assert!(actor.is_anonymous_local());
        assert!(actor.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_session_outlived_user() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let token = login(&sessions, 42).await;

        let err = ActorResolver::new(&store, &sessions)
            .resolve(&CallContext::new().with_token(token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::PermissionDenied);
    }

    #[tokio::test]
    async fn test_malformed_subject_is_internal() {
        let store = MemoryStore::new();
        let sessions = MemorySessionStore::new();
        let token = sessions
            .start_session(StartSession::new(SubjectId::new("someone:else:1"), "test"))
            .await
            .unwrap()
            .token;

        let err = ActorResolver::new(&store, &sessions)
            .resolve(&CallContext::new().with_token(token))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }

    #[tokio::test]
    async fn test_session_store_failures() {
        let store = MemoryStore::new();
        let ctx = CallContext::new().with_token("t").local();

        let backend = Broken(|| SessionError::Backend("down".into()));
        let err = ActorResolver::new(&store, &backend).resolve(&ctx).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);

        let canceled = Broken(|| SessionError::Canceled);
        let err = ActorResolver::new(&store, &canceled).resolve(&ctx).await.unwrap_err();
        assert_eq!(err.code(), Code::Canceled);

        let deadline = Broken(|| SessionError::DeadlineExceeded);
        let err = ActorResolver::new(&store, &deadline).resolve(&ctx).await.unwrap_err();
        assert_eq!(err.code(), Code::DeadlineExceeded);
    }
}
