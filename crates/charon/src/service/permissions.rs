//! Permission rows and catalogue registration.

use charon_core::request::{ListPermissionsRequest, RegisterPermissionsRequest};
use charon_core::{PermissionRecord, Permissions};
use charon_session::{CallContext, SessionStore};
use charon_store::Store;
use tracing::info_span;

use super::{require_id, Service};
use crate::hasher::PasswordHasher;
use crate::registry::Registration;
use crate::status::{Result, Status};

impl<S, SS, H> Service<S, SS, H>
where
    S: Store,
    SS: SessionStore,
    H: PasswordHasher,
{
    pub async fn get_permission(&self, ctx: &CallContext, id: i64) -> Result<PermissionRecord> {
        self.call(ctx, info_span!("get_permission", permission_id = id), async {
            require_id(id, "permission")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().get_permission()?;

            self.store
                .find_permission_by_id(id)
                .await?
                .ok_or_else(|| Status::not_found(format!("permission {id} not found")))
        })
        .await
    }

    /// List permissions sorted by subsystem, module, then action.
    pub async fn list_permissions(
        &self,
        ctx: &CallContext,
        req: ListPermissionsRequest,
    ) -> Result<Vec<PermissionRecord>> {
        self.call(ctx, info_span!("list_permissions"), async {
            let mut query = req.query;
            query.page = self.page(query.page);

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_permissions()?;

            Ok(self.store.find_permissions(&query).await?)
        })
        .await
    }

    /// Reconcile a subsystem's declared catalogue with storage.
    pub async fn register_permissions(
        &self,
        ctx: &CallContext,
        req: RegisterPermissionsRequest,
    ) -> Result<Registration> {
        self.call(ctx, info_span!("register_permissions"), async {
            let declared = Permissions::parse_all(&req.permissions)?;
            declared.single_subsystem()?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().register_permissions()?;

            self.registry.register(self.store.as_ref(), &declared).await
        })
        .await
    }
}
