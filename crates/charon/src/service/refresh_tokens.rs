//! Refresh token lifecycle: issue, list, revoke.
//!
//! Revocation is one-way and also drops every live session that was
//! started with the revoked token.

use charon_core::request::{
    CreateRefreshTokenRequest, ListRefreshTokensRequest, RevokeRefreshTokenRequest,
};
use charon_core::{generate_refresh_token, NewRefreshToken, RefreshToken, SubjectId};
use charon_session::{CallContext, SessionError, SessionStore};
use charon_store::Store;
use tracing::{debug, info, info_span, warn, Instrument};

use super::Service;
use crate::hasher::PasswordHasher;
use crate::status::{Code, Result, Status};

impl<S, SS, H> Service<S, SS, H>
where
    S: Store,
    SS: SessionStore,
    H: PasswordHasher,
{
    /// Issue a refresh token bound to the actor.
    pub async fn create_refresh_token(
        &self,
        ctx: &CallContext,
        req: CreateRefreshTokenRequest,
    ) -> Result<RefreshToken> {
        self.call(ctx, info_span!("create_refresh_token"), async {
            let actor = self.resolve(ctx).await?;
            actor.firewall().create_refresh_token()?;

            let token = self
                .store
                .create_refresh_token(NewRefreshToken {
                    token: generate_refresh_token()?,
                    user_id: actor.id(),
                    notes: req.notes,
                    expire_at: req.expire_at,
                    created_by: Some(actor.id()),
                })
                .await?;

            info!(user_id = token.user_id, expire_at = ?token.expire_at, "refresh token created");
            Ok(token)
        })
        .await
    }

    /// List refresh tokens, narrowed to the actor's own without the
    /// stranger permission.
    pub async fn list_refresh_tokens(
        &self,
        ctx: &CallContext,
        req: ListRefreshTokensRequest,
    ) -> Result<Vec<RefreshToken>> {
        self.call(ctx, info_span!("list_refresh_tokens"), async {
            let mut query = req.query;
            query.page = self.page(query.page);

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_refresh_tokens(&mut query)?;

            Ok(self.store.find_refresh_tokens(&query).await?)
        })
        .await
    }

    /// Revoke a refresh token and drop the sessions started with it.
    ///
    /// Revoking an already revoked token succeeds. The store may commit the
    /// revocation after the call was canceled or ran out of time; in that
    /// case the sessions are still dropped before the interrupt is reported.
    pub async fn revoke_refresh_token(
        &self,
        ctx: &CallContext,
        req: RevokeRefreshTokenRequest,
    ) -> Result<RefreshToken> {
        let span = info_span!("revoke_refresh_token", user_id = req.user_id);
        let result = self.call(ctx, span.clone(), async {
            if req.token.is_empty() {
                return Err(Status::invalid_argument("refresh token cannot be empty"));
            }
            if req.user_id <= 0 {
                return Err(Status::invalid_argument("refresh token user id cannot be empty"));
            }

            let actor = self.resolve(ctx).await?;
            let found = self
                .store
                .find_refresh_token_by_user(&req.token, req.user_id)
                .await?
                .ok_or_else(|| Status::not_found("refresh token does not exist"))?;
            actor.firewall().revoke_refresh_token(&found)?;

            let revoked = self
                .store
                .revoke_refresh_token(&req.token, req.user_id, Some(actor.id()))
                .await?;

            let subject = SubjectId::from_user_id(revoked.user_id);
            match self.sessions.delete_sessions(&subject, &revoked.token).await {
                Ok(count) => debug!(sessions = count, "sessions of revoked token dropped"),
                Err(SessionError::NotFound) => debug!("no live session for revoked token"),
                Err(err) => return Err(err.into()),
            }

            info!(user_id = revoked.user_id, "refresh token revoked");
            Ok(revoked)
        })
        .await;

        if let Err(status) = &result {
            if matches!(status.code(), Code::Canceled | Code::DeadlineExceeded) {
                self.sweep_revoked(&req).instrument(span).await;
            }
        }
        result
    }

    /// Drop the sessions of `req.token` if storage has it revoked.
    ///
    /// Runs outside the call's deadline. Failures are only logged, the
    /// caller already gets the interrupt.
    async fn sweep_revoked(&self, req: &RevokeRefreshTokenRequest) {
        if req.token.is_empty() || req.user_id <= 0 {
            return;
        }
        let token = match self
            .store
            .find_refresh_token_by_user(&req.token, req.user_id)
            .await
        {
            Ok(Some(token)) if token.revoked => token,
            Ok(_) => return,
            Err(err) => {
                warn!(error = %err, "revoked token lookup failed after interrupt");
                return;
            }
        };

        let subject = SubjectId::from_user_id(token.user_id);
        match self.sessions.delete_sessions(&subject, &token.token).await {
            Ok(count) => debug!(sessions = count, "sessions of revoked token dropped after interrupt"),
            Err(SessionError::NotFound) => {}
            Err(err) => warn!(error = %err, "dropping sessions after interrupt failed"),
        }
    }
}
