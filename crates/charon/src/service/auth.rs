//! Login, logout and session introspection.

use charon_core::request::{LoginRequest, LoginStrategy};
use charon_core::{now_millis, SubjectId, User};
use charon_policy::Actor;
use charon_session::{CallContext, Session, SessionError, SessionStore, StartSession};
use charon_store::Store;
use tracing::{debug, info, info_span, warn};

use super::Service;
use crate::hasher::PasswordHasher;
use crate::resolver::ActorResolver;
use crate::status::{Result, Status};

const BAD_CREDENTIALS: &str = "user does not exist or password do not match";

impl<S, SS, H> Service<S, SS, H>
where
    S: Store,
    SS: SessionStore,
    H: PasswordHasher,
{
    /// Exchange credentials or a refresh token for a new session.
    pub async fn login(&self, ctx: &CallContext, req: LoginRequest) -> Result<Session> {
        self.call(ctx, info_span!("login"), async {
            let (user, refresh_token) = match req.strategy {
                LoginStrategy::UsernameAndPassword { username, password } => {
                    if username.is_empty() || password.is_empty() {
                        return Err(Status::invalid_argument(
                            "username and password are required",
                        ));
                    }
                    (self.check_password(&username, &password).await?, None)
                }
                LoginStrategy::RefreshToken { refresh_token } => {
                    if refresh_token.is_empty() {
                        return Err(Status::invalid_argument("refresh token is required"));
                    }
                    let user = self.check_refresh_token(&refresh_token).await?;
                    (user, Some(refresh_token))
                }
            };

            if !user.is_confirmed {
                warn!(user_id = user.id, "login refused, user not confirmed");
                return Err(Status::unauthenticated("user is not confirmed"));
            }
            if !user.is_active {
                warn!(user_id = user.id, "login refused, user not active");
                return Err(Status::unauthenticated("user is not active"));
            }

            let mut start = StartSession::new(SubjectId::from_user_id(user.id), req.client);
            if let Some(token) = &refresh_token {
                start = start.with_refresh_token(token.clone());
            }
            let session = self.sessions.start_session(start).await?;

            let now = now_millis();
            self.store.update_last_login(user.id, now).await?;
            if let Some(token) = &refresh_token {
                self.store.mark_refresh_token_used(token, now).await?;
            }

            info!(user_id = user.id, by_refresh_token = refresh_token.is_some(), "logged in");
            Ok(session)
        })
        .await
    }

    /// Abandon the session of the call.
    pub async fn logout(&self, ctx: &CallContext) -> Result<()> {
        self.call(ctx, info_span!("logout"), async {
            let token = ctx
                .token()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| Status::invalid_argument("access token is required"))?;
            self.sessions.abandon_session(token).await?;
            debug!("logged out");
            Ok(())
        })
        .await
    }

    /// True if `token` names a live session.
    pub async fn is_authenticated(&self, ctx: &CallContext, token: &str) -> Result<bool> {
        self.call(ctx, info_span!("is_authenticated"), async {
            if token.is_empty() {
                return Err(Status::invalid_argument("access token is required"));
            }
            match self.sessions.get_session(token).await {
                Ok(_) => Ok(true),
                Err(SessionError::NotFound) => Ok(false),
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    /// The actor behind `token`, or behind the call itself when no token
    /// is given.
    pub async fn actor(&self, ctx: &CallContext, token: Option<&str>) -> Result<Actor> {
        self.call(ctx, info_span!("actor"), async {
            match token.filter(|t| !t.is_empty()) {
                Some(token) => {
                    ActorResolver::new(self.store.as_ref(), self.sessions.as_ref())
                        .resolve_token(ctx, token)
                        .await
                }
                None => self.resolve(ctx).await,
            }
        })
        .await
    }

    async fn check_password(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .find_user_by_username(username)
            .await?
            .ok_or_else(|| Status::unauthenticated(BAD_CREDENTIALS))?;

        if !self.hasher.compare(&user.password, password.as_bytes()) {
            warn!(user_id = user.id, "login refused, password mismatch");
            return Err(Status::unauthenticated(BAD_CREDENTIALS));
        }
        Ok(user)
    }

    async fn check_refresh_token(&self, token: &str) -> Result<User> {
        let refresh_token = self
            .store
            .find_refresh_token(token)
            .await?
            .ok_or_else(|| Status::unauthenticated("refresh token does not exist"))?;

        if refresh_token.revoked {
            return Err(Status::unauthenticated("refresh token is revoked"));
        }
        if refresh_token.is_expired(now_millis()) {
            return Err(Status::unauthenticated("refresh token is expired"));
        }

        self.store
            .find_user_by_id(refresh_token.user_id)
            .await?
            .ok_or_else(|| Status::unauthenticated("refresh token owner does not exist"))
    }
}
