//! The Service: every administrative operation, end to end.
//!
//! Each operation follows the same path: validate the request, resolve the
//! actor, ask the firewall, then delegate to storage. The whole path runs
//! under the call's deadline and cancellation token.

mod auth;
mod groups;
mod permissions;
mod refresh_tokens;
mod users;

use std::future::Future;
use std::sync::Arc;

use charon_core::{catalogue, Page};
use charon_policy::Actor;
use charon_session::{CallContext, SessionStore};
use charon_store::Store;
use tracing::{Instrument, Span};

use crate::config::ServiceConfig;
use crate::hasher::PasswordHasher;
use crate::registry::{PermissionRegistry, Registration};
use crate::resolver::ActorResolver;
use crate::status::{Result, Status};

/// The Charon service.
///
/// Generic over its three collaborators: row storage, the session store
/// and the password hasher.
pub struct Service<S, SS, H> {
    store: Arc<S>,
    sessions: Arc<SS>,
    hasher: H,
    registry: PermissionRegistry,
    config: ServiceConfig,
}

impl<S, SS, H> Service<S, SS, H>
where
    S: Store,
    SS: SessionStore,
    H: PasswordHasher,
{
    pub fn new(store: S, sessions: SS, hasher: H, config: ServiceConfig) -> Self {
        Self::with_shared(Arc::new(store), Arc::new(sessions), hasher, config)
    }

    /// Build a service over collaborators that are shared with other code.
    pub fn with_shared(
        store: Arc<S>,
        sessions: Arc<SS>,
        hasher: H,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            sessions,
            hasher,
            registry: PermissionRegistry::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn sessions(&self) -> &SS {
        &self.sessions
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Startup work: reconcile the compiled-in catalogue when configured.
    pub async fn init(&self) -> Result<Option<Registration>> {
        if !self.config.register_catalogue_on_start {
            return Ok(None);
        }
        let registration = self
            .registry
            .register(self.store.as_ref(), &catalogue::catalogue())
            .await?;
        Ok(Some(registration))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Drive one operation under the call's deadline, cancellation and span.
    async fn call<T, F>(&self, ctx: &CallContext, span: Span, op: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        ctx.run(op).instrument(span).await
    }

    async fn resolve(&self, ctx: &CallContext) -> Result<Actor> {
        ActorResolver::new(self.store.as_ref(), self.sessions.as_ref())
            .resolve(ctx)
            .await
    }

    fn page(&self, page: Page) -> Page {
        page.clamped(self.config.default_list_limit, self.config.max_list_limit)
    }

    fn hash_password(&self, plain: &str) -> Result<Vec<u8>> {
        self.hasher
            .hash(plain.as_bytes())
            .map_err(|err| Status::internal("password hashing failed", err))
    }
}

/// The user id recorded as author of a change, if the actor has one.
fn author(actor: &Actor) -> Option<i64> {
    if actor.is_anonymous_local() {
        None
    } else {
        Some(actor.id())
    }
}

fn require_id(id: i64, what: &str) -> Result<()> {
    if id <= 0 {
        return Err(Status::invalid_argument(format!("{what} id is missing")));
    }
    Ok(())
}
