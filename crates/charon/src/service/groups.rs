//! Groups and the permissions granted to them.

use charon_core::request::{
    CreateGroupRequest, ListGroupsRequest, ListMembershipRequest, ModifyGroupRequest,
    SetPermissionsRequest,
};
use charon_core::{Group, GroupPatch, NewGroup, Permissions, SetResult};
use charon_session::{CallContext, SessionStore};
use charon_store::{Store, StoreExt};
use tracing::{info, info_span};

use super::{author, require_id, Service};
use crate::hasher::PasswordHasher;
use crate::status::{Result, Status};

impl<S, SS, H> Service<S, SS, H>
where
    S: Store,
    SS: SessionStore,
    H: PasswordHasher,
{
    pub async fn create_group(&self, ctx: &CallContext, req: CreateGroupRequest) -> Result<Group> {
        let span = info_span!("create_group", name = %req.name);
        self.call(ctx, span, async {
            if req.name.is_empty() {
                return Err(Status::invalid_argument("group name is required"));
            }

            let actor = self.resolve(ctx).await?;
            actor.firewall().create_group()?;

            let group = self
                .store
                .create_group(NewGroup {
                    name: req.name,
                    description: req.description.unwrap_or_default(),
                    created_by: author(&actor),
                })
                .await?;
            info!(group_id = group.id, "group created");
            Ok(group)
        })
        .await
    }

    pub async fn modify_group(&self, ctx: &CallContext, req: ModifyGroupRequest) -> Result<Group> {
        self.call(ctx, info_span!("modify_group", group_id = req.id), async {
            require_id(req.id, "group")?;
            if req.name.as_deref() == Some("") {
                return Err(Status::invalid_argument("group name cannot be empty"));
            }

            let actor = self.resolve(ctx).await?;
            actor.firewall().modify_group()?;

            let group = self
                .store
                .update_group(
                    req.id,
                    GroupPatch {
                        name: req.name,
                        description: req.description,
                        updated_by: author(&actor),
                    },
                )
                .await?;
            info!(group_id = group.id, "group modified");
            Ok(group)
        })
        .await
    }

    /// Delete a group. Groups with members or permissions cannot go.
    pub async fn delete_group(&self, ctx: &CallContext, id: i64) -> Result<Group> {
        self.call(ctx, info_span!("delete_group", group_id = id), async {
            require_id(id, "group")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().delete_group()?;

            let group = self.store.require_group(id).await?;
            self.store.delete_group(id).await?;
            info!(group_id = id, "group deleted");
            Ok(group)
        })
        .await
    }

    pub async fn get_group(&self, ctx: &CallContext, id: i64) -> Result<Group> {
        self.call(ctx, info_span!("get_group", group_id = id), async {
            require_id(id, "group")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().get_group()?;

            Ok(self.store.require_group(id).await?)
        })
        .await
    }

    pub async fn list_groups(&self, ctx: &CallContext, req: ListGroupsRequest) -> Result<Vec<Group>> {
        self.call(ctx, info_span!("list_groups"), async {
            let mut query = req.query;
            query.page = self.page(query.page);

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_groups()?;

            Ok(self.store.find_groups(&query).await?)
        })
        .await
    }

    pub async fn list_group_permissions(
        &self,
        ctx: &CallContext,
        req: ListMembershipRequest,
    ) -> Result<Permissions> {
        self.call(ctx, info_span!("list_group_permissions", group_id = req.id), async {
            require_id(req.id, "group")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_group_permissions()?;

            self.store.require_group(req.id).await?;
            let permissions = self.store.find_permissions_by_group_id(req.id).await?;
            Ok(self.page(req.page).apply(permissions).into_iter().collect())
        })
        .await
    }

    /// Replace the permissions granted to a group.
    pub async fn set_group_permissions(
        &self,
        ctx: &CallContext,
        req: SetPermissionsRequest,
    ) -> Result<SetResult> {
        self.call(ctx, info_span!("set_group_permissions", group_id = req.id), async {
            require_id(req.id, "group")?;
            let permissions = Permissions::parse_all(&req.permissions)?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().set_group_permissions()?;

            if req.force {
                self.store.insert_missing_permissions(&permissions).await?;
            }
            let result = self.store.set_group_permissions(req.id, &permissions).await?;

            info!(
                group_id = req.id,
                created = result.created,
                removed = result.removed,
                untouched = result.untouched,
                "group permissions set"
            );
            Ok(result)
        })
        .await
    }
}
