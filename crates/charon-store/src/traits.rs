//! Store trait: the abstract interface for the relational-storage collaborator.
//!
//! The service never touches rows directly; every read and write goes
//! through this trait. Implementations include SQLite (primary) and
//! in-memory (for tests).

use async_trait::async_trait;
use charon_core::{
    Group, GroupPatch, GroupQuery, NewGroup, NewRefreshToken, NewUser, Permission,
    PermissionQuery, PermissionRecord, Permissions, RefreshToken, RefreshTokenQuery, SetResult,
    User, UserPatch, UserQuery,
};

use crate::error::{Result, StoreError};

/// Counts reported by a registry reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionChanges {
    pub created: i64,
    pub removed: i64,
}

/// The Store trait: async interface for users, groups, permissions and
/// refresh tokens.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Absence is not an error** for single-row lookups: they return `Ok(None)`.
/// - **Uniqueness** violations surface as [`StoreError::AlreadyExists`].
/// - **Dependents**: deleting a user that still holds groups or direct
///   permissions fails with [`StoreError::Dependent`].
/// - **Set operations** (`set_*`, `apply_permission_changes`) are atomic.
/// - **Listing** applies the query's page verbatim; callers clamp it first.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // User Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user. Username collisions return `AlreadyExists`.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn user_exists(&self, id: i64) -> Result<bool>;

    /// Total number of users, regardless of flags.
    async fn count_users(&self) -> Result<i64>;

    /// List users ordered by id.
    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>>;

    /// Apply a partial update. Missing user returns `NotFound`.
    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User>;

    async fn delete_user(&self, id: i64) -> Result<()>;

    async fn update_last_login(&self, id: i64, at: i64) -> Result<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Permission Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Effective permissions of a user: direct grants plus grants inherited
    /// from every group the user belongs to, deduplicated and sorted.
    async fn find_permissions_by_user_id(&self, user_id: i64) -> Result<Permissions>;

    async fn find_permissions_by_group_id(&self, group_id: i64) -> Result<Permissions>;

    /// Every stored permission of one subsystem.
    async fn find_permissions_by_subsystem(&self, subsystem: &str) -> Result<Permissions>;

    async fn find_permission_by_id(&self, id: i64) -> Result<Option<PermissionRecord>>;

    /// List permissions ordered by subsystem, module, then action.
    async fn find_permissions(&self, query: &PermissionQuery) -> Result<Vec<PermissionRecord>>;

    /// Insert `create` and delete `remove` in one transaction.
    ///
    /// Every permission must belong to `subsystem`; anything else fails with
    /// `InvalidData` before any row is touched. Deleting a permission also
    /// drops the grants that reference it.
    async fn apply_permission_changes(
        &self,
        subsystem: &str,
        create: &[Permission],
        remove: &[Permission],
    ) -> Result<PermissionChanges>;

    /// Insert the permissions that are not stored yet. Returns how many
    /// rows were created.
    async fn insert_missing_permissions(&self, permissions: &Permissions) -> Result<i64>;

    /// True if the permission is among the user's effective permissions.
    async fn is_granted(&self, user_id: i64, permission: &Permission) -> Result<bool>;

    /// Replace the permissions granted directly to a user.
    ///
    /// Unknown user or permission returns `NotFound`.
    async fn set_user_permissions(&self, user_id: i64, permissions: &Permissions)
        -> Result<SetResult>;

    /// Replace the permissions granted to a group.
    async fn set_group_permissions(
        &self,
        group_id: i64,
        permissions: &Permissions,
    ) -> Result<SetResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a group. Name collisions return `AlreadyExists`.
    async fn create_group(&self, group: NewGroup) -> Result<Group>;

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>>;

    async fn find_groups(&self, query: &GroupQuery) -> Result<Vec<Group>>;

    /// Groups the user belongs to, ordered by id.
    async fn find_groups_by_user_id(&self, user_id: i64) -> Result<Vec<Group>>;

    async fn update_group(&self, id: i64, patch: GroupPatch) -> Result<Group>;

    /// Delete a group. Groups with members or permissions are `Dependent`.
    async fn delete_group(&self, id: i64) -> Result<()>;

    async fn belongs_to(&self, user_id: i64, group_id: i64) -> Result<bool>;

    /// Replace the user's group memberships.
    async fn set_user_groups(&self, user_id: i64, group_ids: &[i64]) -> Result<SetResult>;

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh Token Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a refresh token. A token value collision returns `AlreadyExists`.
    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshToken>;

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;

    async fn find_refresh_token_by_user(
        &self,
        token: &str,
        user_id: i64,
    ) -> Result<Option<RefreshToken>>;

    /// List tokens ordered by creation time.
    async fn find_refresh_tokens(&self, query: &RefreshTokenQuery) -> Result<Vec<RefreshToken>>;

    /// Set the revoked flag. Revoking an already revoked token succeeds and
    /// returns it unchanged.
    async fn revoke_refresh_token(
        &self,
        token: &str,
        user_id: i64,
        revoked_by: Option<i64>,
    ) -> Result<RefreshToken>;

    async fn mark_refresh_token_used(&self, token: &str, at: i64) -> Result<()>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Fetch a user, turning absence into `NotFound`.
    fn require_user(&self, id: i64) -> impl std::future::Future<Output = Result<User>> + Send;

    /// Fetch a group, turning absence into `NotFound`.
    fn require_group(&self, id: i64) -> impl std::future::Future<Output = Result<Group>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn require_user(&self, id: i64) -> Result<User> {
        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn require_group(&self, id: i64) -> Result<Group> {
        self.find_group_by_id(id)
            .await?
            .ok_or_else(|| StoreError::not_found("group", id))
    }
}
