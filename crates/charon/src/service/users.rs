//! User accounts, their direct grants and their group memberships.

use charon_core::request::{
    BelongsToRequest, CreateUserRequest, IsGrantedRequest, ListMembershipRequest,
    ListUsersRequest, ModifyUserRequest, SetPermissionsRequest, SetUserGroupsRequest,
};
use charon_core::{
    generate_refresh_token, Group, NewUser, Permission, Permissions, SetResult, User, UserPatch,
};
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
    /// Create a user.
    ///
    /// A local trusted caller without a session may only create the very
    /// first user, and only as a superuser.
    pub async fn create_user(&self, ctx: &CallContext, req: CreateUserRequest) -> Result<User> {
        let span = info_span!("create_user", username = %req.username);
        self.call(ctx, span, async {
            self.validate_username(&req.username)?;
            if req.secure_password.is_none() {
                self.validate_password(&req.plain_password)?;
            }

            let actor = self.resolve(ctx).await?;
            actor.firewall().create_user(&req)?;

            if actor.is_anonymous_local() {
                if req.is_superuser != Some(true) {
                    return Err(Status::permission_denied(
                        "local caller without a session can only create the initial superuser",
                    ));
                }
                if self.store.count_users().await? > 0 {
                    return Err(Status::already_exists("initial superuser already exists"));
                }
            }

            let password = match req.secure_password {
                Some(secure) => secure,
                None => self.hash_password(&req.plain_password)?,
            };
            let confirmation_token = generate_refresh_token()?.into_bytes();

            let user = self
                .store
                .create_user(NewUser {
                    username: req.username,
                    password,
                    first_name: req.first_name,
                    last_name: req.last_name,
                    is_superuser: req.is_superuser.unwrap_or(false),
                    is_staff: req.is_staff.unwrap_or(false),
                    is_active: req.is_active.unwrap_or(false),
                    is_confirmed: req.is_confirmed.unwrap_or(false),
                    confirmation_token,
                    created_by: author(&actor),
                })
                .await?;

            info!(
                user_id = user.id,
                created_by = ?user.created_by,
                is_superuser = user.is_superuser,
                is_staff = user.is_staff,
                "user created"
            );
            Ok(user)
        })
        .await
    }

    pub async fn modify_user(&self, ctx: &CallContext, req: ModifyUserRequest) -> Result<User> {
        self.call(ctx, info_span!("modify_user", user_id = req.id), async {
            require_id(req.id, "user")?;
            if let Some(username) = &req.username {
                self.validate_username(username)?;
            }
            if let (Some(password), None) = (&req.plain_password, &req.secure_password) {
                self.validate_password(password)?;
            }

            let actor = self.resolve(ctx).await?;
            let target = self.store.require_user(req.id).await?;
            actor.firewall().modify_user(&req, &target)?;

            let password = match (req.secure_password, &req.plain_password) {
                (Some(secure), _) => Some(secure),
                (None, Some(plain)) => Some(self.hash_password(plain)?),
                (None, None) => None,
            };

            let user = self
                .store
                .update_user(
                    req.id,
                    UserPatch {
                        username: req.username,
                        password,
                        first_name: req.first_name,
                        last_name: req.last_name,
                        is_superuser: req.is_superuser,
                        is_staff: req.is_staff,
                        is_active: req.is_active,
                        is_confirmed: req.is_confirmed,
                        updated_by: author(&actor),
                    },
                )
                .await?;

            info!(user_id = user.id, "user modified");
            Ok(user)
        })
        .await
    }

    /// Delete a user. Users still holding grants or memberships cannot go.
    pub async fn delete_user(&self, ctx: &CallContext, id: i64) -> Result<User> {
        self.call(ctx, info_span!("delete_user", user_id = id), async {
            require_id(id, "user")?;

            let actor = self.resolve(ctx).await?;
            let target = self.store.require_user(id).await?;
            actor.firewall().delete_user(&target)?;

            self.store.delete_user(id).await?;
            info!(user_id = id, "user deleted");
            Ok(target)
        })
        .await
    }

    pub async fn get_user(&self, ctx: &CallContext, id: i64) -> Result<User> {
        self.call(ctx, info_span!("get_user", user_id = id), async {
            require_id(id, "user")?;

            let actor = self.resolve(ctx).await?;
            let target = self.store.require_user(id).await?;
            actor.firewall().get_user(&target)?;
            Ok(target)
        })
        .await
    }

    /// List users, narrowed to what the actor may see.
    pub async fn list_users(&self, ctx: &CallContext, req: ListUsersRequest) -> Result<Vec<User>> {
        self.call(ctx, info_span!("list_users"), async {
            let mut query = req.query;
            query.page = self.page(query.page);

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_users(&mut query)?;

            Ok(self.store.find_users(&query).await?)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    /// Effective permissions of a user: direct and inherited from groups.
    pub async fn list_user_permissions(
        &self,
        ctx: &CallContext,
        req: ListMembershipRequest,
    ) -> Result<Permissions> {
        self.call(ctx, info_span!("list_user_permissions", user_id = req.id), async {
            require_id(req.id, "user")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_user_permissions(req.id)?;

            if !self.store.user_exists(req.id).await? {
                return Err(Status::not_found(format!("user {} not found", req.id)));
            }
            let permissions = self.store.find_permissions_by_user_id(req.id).await?;
            Ok(self.page(req.page).apply(permissions).into_iter().collect())
        })
        .await
    }

    /// Replace the permissions granted directly to a user.
    pub async fn set_user_permissions(
        &self,
        ctx: &CallContext,
        req: SetPermissionsRequest,
    ) -> Result<SetResult> {
        self.call(ctx, info_span!("set_user_permissions", user_id = req.id), async {
            require_id(req.id, "user")?;
            let permissions = Permissions::parse_all(&req.permissions)?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().set_user_permissions()?;

            if req.force {
                self.store.insert_missing_permissions(&permissions).await?;
            }
            let result = self.store.set_user_permissions(req.id, &permissions).await?;

            info!(
                user_id = req.id,
                created = result.created,
                removed = result.removed,
                untouched = result.untouched,
                "user permissions set"
            );
            Ok(result)
        })
        .await
    }

    pub async fn is_granted(&self, ctx: &CallContext, req: IsGrantedRequest) -> Result<bool> {
        self.call(ctx, info_span!("is_granted", user_id = req.user_id), async {
            require_id(req.user_id, "user")?;
            let permission = Permission::parse(&req.permission)?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().is_granted(req.user_id)?;

            Ok(self.store.is_granted(req.user_id, &permission).await?)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memberships
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn list_user_groups(
        &self,
        ctx: &CallContext,
        req: ListMembershipRequest,
    ) -> Result<Vec<Group>> {
        self.call(ctx, info_span!("list_user_groups", user_id = req.id), async {
            require_id(req.id, "user")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().list_user_groups(req.id)?;

            if !self.store.user_exists(req.id).await? {
                return Err(Status::not_found(format!("user {} not found", req.id)));
            }
            let groups = self.store.find_groups_by_user_id(req.id).await?;
            Ok(self.page(req.page).apply(groups))
        })
        .await
    }

    /// Replace the user's group memberships.
    pub async fn set_user_groups(
        &self,
        ctx: &CallContext,
        req: SetUserGroupsRequest,
    ) -> Result<SetResult> {
        self.call(ctx, info_span!("set_user_groups", user_id = req.user_id), async {
            require_id(req.user_id, "user")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().set_user_groups()?;

            let result = self.store.set_user_groups(req.user_id, &req.groups).await?;
            info!(
                user_id = req.user_id,
                created = result.created,
                removed = result.removed,
                untouched = result.untouched,
                "user groups set"
            );
            Ok(result)
        })
        .await
    }

    pub async fn belongs_to(&self, ctx: &CallContext, req: BelongsToRequest) -> Result<bool> {
        let span = info_span!("belongs_to", user_id = req.user_id, group_id = req.group_id);
        self.call(ctx, span, async {
            require_id(req.user_id, "user")?;
            require_id(req.group_id, "group")?;

            let actor = self.resolve(ctx).await?;
            actor.firewall().belongs_to(req.user_id)?;

            Ok(self.store.belongs_to(req.user_id, req.group_id).await?)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    fn validate_username(&self, username: &str) -> Result<()> {
        if username.chars().count() < self.config.min_username_length {
            return Err(Status::invalid_argument(format!(
                "username needs to be at least {} characters long",
                self.config.min_username_length
            )));
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<()> {
        if password.chars().count() < self.config.min_password_length {
            return Err(Status::invalid_argument(format!(
                "password needs to be at least {} characters long",
                self.config.min_password_length
            )));
        }
        Ok(())
    }
}
