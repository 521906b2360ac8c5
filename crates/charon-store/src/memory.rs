//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use charon_core::{
    now_millis, Group, GroupPatch, GroupQuery, NewGroup, NewRefreshToken, NewUser, Permission,
    PermissionQuery, PermissionRecord, Permissions, RefreshToken, RefreshTokenQuery, SetResult,
    SortOrder, User, UserPatch, UserQuery,
};

use crate::error::{Result, StoreError};
use crate::traits::{PermissionChanges, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    users: BTreeMap<i64, User>,
    groups: BTreeMap<i64, Group>,
    permissions: BTreeMap<i64, PermissionRecord>,

    /// (user_id, permission_id)
    user_permissions: BTreeSet<(i64, i64)>,
    /// (group_id, permission_id)
    group_permissions: BTreeSet<(i64, i64)>,
    /// (user_id, group_id)
    user_groups: BTreeSet<(i64, i64)>,

    refresh_tokens: BTreeMap<String, RefreshToken>,

    next_user_id: i64,
    next_group_id: i64,
    next_permission_id: i64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn permission_id(&self, permission: &Permission) -> Option<i64> {
        self.permissions
            .values()
            .find(|r| &r.permission == permission)
            .map(|r| r.id)
    }

    fn permissions_by_ids(&self, ids: impl IntoIterator<Item = i64>) -> Permissions {
        let mut found: Vec<Permission> = ids
            .into_iter()
            .filter_map(|id| self.permissions.get(&id))
            .map(|r| r.permission.clone())
            .collect();
        found.sort_by(|a, b| a.split().cmp(&b.split()));
        found.dedup();
        Permissions::from(found)
    }

    fn effective_permission_ids(&self, user_id: i64) -> BTreeSet<i64> {
        let mut ids: BTreeSet<i64> = self
            .user_permissions
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, p)| *p)
            .collect();

        for (_, group_id) in self.user_groups.iter().filter(|(u, _)| *u == user_id) {
            ids.extend(
                self.group_permissions
                    .iter()
                    .filter(|(g, _)| g == group_id)
                    .map(|(_, p)| *p),
            );
        }
        ids
    }

    fn resolve_permission_ids(&self, permissions: &Permissions) -> Result<BTreeSet<i64>> {
        permissions
            .iter()
            .map(|p| {
                self.permission_id(p)
                    .ok_or_else(|| StoreError::not_found("permission", p))
            })
            .collect()
    }

    fn insert_permission(&mut self, permission: &Permission, now: i64) -> bool {
        if self.permission_id(permission).is_some() {
            return false;
        }
        self.next_permission_id += 1;
        let id = self.next_permission_id;
        self.permissions.insert(
            id,
            PermissionRecord {
                id,
                permission: permission.clone(),
                created_at: now,
                updated_at: None,
            },
        );
        true
    }

    fn remove_permission(&mut self, permission: &Permission) -> bool {
        let Some(id) = self.permission_id(permission) else {
            return false;
        };
        self.permissions.remove(&id);
        self.user_permissions.retain(|(_, p)| *p != id);
        self.group_permissions.retain(|(_, p)| *p != id);
        true
    }
}

/// Replace every `(owner, *)` link in `links` with `(owner, desired)`.
fn set_links(links: &mut BTreeSet<(i64, i64)>, owner: i64, desired: &BTreeSet<i64>) -> SetResult {
    let current: BTreeSet<i64> = links
        .iter()
        .filter(|(o, _)| *o == owner)
        .map(|(_, t)| *t)
        .collect();

    let mut created = 0;
    for target in desired.difference(&current) {
        links.insert((owner, *target));
        created += 1;
    }

    let mut removed = 0;
    for target in current.difference(desired) {
        links.remove(&(owner, *target));
        removed += 1;
    }

    SetResult {
        created,
        removed,
        untouched: desired.len() as i64 - created,
    }
}

fn ordered<T>(mut items: Vec<T>, order: SortOrder) -> Vec<T> {
    if order == SortOrder::Descending {
        items.reverse();
    }
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inner = self.write()?;

        if inner.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::already_exists("user", &user.username));
        }

        inner.next_user_id += 1;
        let created = User {
            id: inner.next_user_id,
            username: user.username,
            password: user.password,
            first_name: user.first_name,
            last_name: user.last_name,
            is_superuser: user.is_superuser,
            is_staff: user.is_staff,
            is_active: user.is_active,
            is_confirmed: user.is_confirmed,
            confirmation_token: user.confirmation_token,
            last_login_at: None,
            created_at: now_millis(),
            created_by: user.created_by,
            updated_at: None,
            updated_by: None,
        };
        inner.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let inner = self.read()?;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn user_exists(&self, id: i64) -> Result<bool> {
        Ok(self.read()?.users.contains_key(&id))
    }

    async fn count_users(&self) -> Result<i64> {
        Ok(self.read()?.users.len() as i64)
    }

    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let inner = self.read()?;
        let users: Vec<User> = inner
            .users
            .values()
            .filter(|u| query.is_superuser.map_or(true, |v| u.is_superuser == v))
            .filter(|u| query.is_staff.map_or(true, |v| u.is_staff == v))
            .filter(|u| query.created_by.map_or(true, |v| u.created_by == Some(v)))
            .cloned()
            .collect();

        Ok(query.page.apply(ordered(users, query.order)))
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User> {
        let mut inner = self.write()?;

        if let Some(username) = &patch.username {
            if inner
                .users
                .values()
                .any(|u| u.id != id && &u.username == username)
            {
                return Err(StoreError::already_exists("user", username));
            }
        }

        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;

        if let Some(v) = patch.username {
            user.username = v;
        }
        if let Some(v) = patch.password {
            user.password = v;
        }
        if let Some(v) = patch.first_name {
            user.first_name = v;
        }
        if let Some(v) = patch.last_name {
            user.last_name = v;
        }
        if let Some(v) = patch.is_superuser {
            user.is_superuser = v;
        }
        if let Some(v) = patch.is_staff {
            user.is_staff = v;
        }
        if let Some(v) = patch.is_active {
            user.is_active = v;
        }
        if let Some(v) = patch.is_confirmed {
            user.is_confirmed = v;
        }
        user.updated_at = Some(now_millis());
        user.updated_by = patch.updated_by;

        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        let mut inner = self.write()?;

        if !inner.users.contains_key(&id) {
            return Err(StoreError::not_found("user", id));
        }
        if inner.user_permissions.iter().any(|(u, _)| *u == id) {
            return Err(StoreError::Dependent {
                entity: "user",
                key: id.to_string(),
                dependents: "permissions",
            });
        }
        if inner.user_groups.iter().any(|(u, _)| *u == id) {
            return Err(StoreError::Dependent {
                entity: "user",
                key: id.to_string(),
                dependents: "groups",
            });
        }

        inner.users.remove(&id);
        inner.refresh_tokens.retain(|_, t| t.user_id != id);
        Ok(())
    }

    async fn update_last_login(&self, id: i64, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("user", id))?;
        user.last_login_at = Some(at);
        Ok(())
    }

    async fn find_permissions_by_user_id(&self, user_id: i64) -> Result<Permissions> {
        let inner = self.read()?;
        Ok(inner.permissions_by_ids(inner.effective_permission_ids(user_id)))
    }

    async fn find_permissions_by_group_id(&self, group_id: i64) -> Result<Permissions> {
        let inner = self.read()?;
        let ids = inner
            .group_permissions
            .iter()
            .filter(|(g, _)| *g == group_id)
            .map(|(_, p)| *p);
        Ok(inner.permissions_by_ids(ids))
    }

    async fn find_permissions_by_subsystem(&self, subsystem: &str) -> Result<Permissions> {
        let inner = self.read()?;
        let ids = inner
            .permissions
            .values()
            .filter(|r| r.permission.subsystem() == subsystem)
            .map(|r| r.id);
        Ok(inner.permissions_by_ids(ids))
    }

    async fn find_permission_by_id(&self, id: i64) -> Result<Option<PermissionRecord>> {
        Ok(self.read()?.permissions.get(&id).cloned())
    }

    async fn find_permissions(&self, query: &PermissionQuery) -> Result<Vec<PermissionRecord>> {
        let inner = self.read()?;
        let mut records: Vec<PermissionRecord> = inner
            .permissions
            .values()
            .filter(|r| {
                query
                    .subsystem
                    .as_deref()
                    .map_or(true, |v| r.permission.subsystem() == v)
            })
            .filter(|r| {
                query
                    .module
                    .as_deref()
                    .map_or(true, |v| r.permission.module() == v)
            })
            .filter(|r| {
                query
                    .action
                    .as_deref()
                    .map_or(true, |v| r.permission.action() == v)
            })
            .cloned()
            .collect();
        records.sort_by(|a, b| a.permission.split().cmp(&b.permission.split()));

        Ok(query.page.apply(ordered(records, query.order)))
    }

    async fn apply_permission_changes(
        &self,
        subsystem: &str,
        create: &[Permission],
        remove: &[Permission],
    ) -> Result<PermissionChanges> {
        if let Some(p) = create
            .iter()
            .chain(remove)
            .find(|p| p.subsystem() != subsystem)
        {
            return Err(StoreError::InvalidData(format!(
                "permission {} does not belong to subsystem {}",
                p, subsystem
            )));
        }

        let mut inner = self.write()?;
        let now = now_millis();
        let mut changes = PermissionChanges::default();

        for p in create {
            if inner.insert_permission(p, now) {
                changes.created += 1;
            }
        }
        for p in remove {
            if inner.remove_permission(p) {
                changes.removed += 1;
            }
        }

        Ok(changes)
    }

    async fn insert_missing_permissions(&self, permissions: &Permissions) -> Result<i64> {
        let mut inner = self.write()?;
        let now = now_millis();
        Ok(permissions
            .iter()
            .filter(|p| inner.insert_permission(p, now))
            .count() as i64)
    }

    async fn is_granted(&self, user_id: i64, permission: &Permission) -> Result<bool> {
        let inner = self.read()?;
        Ok(match inner.permission_id(permission) {
            Some(id) => inner.effective_permission_ids(user_id).contains(&id),
            None => false,
        })
    }

    async fn set_user_permissions(
        &self,
        user_id: i64,
        permissions: &Permissions,
    ) -> Result<SetResult> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        let desired = inner.resolve_permission_ids(permissions)?;
        Ok(set_links(&mut inner.user_permissions, user_id, &desired))
    }

    async fn set_group_permissions(
        &self,
        group_id: i64,
        permissions: &Permissions,
    ) -> Result<SetResult> {
        let mut inner = self.write()?;
        if !inner.groups.contains_key(&group_id) {
            return Err(StoreError::not_found("group", group_id));
        }
        let desired = inner.resolve_permission_ids(permissions)?;
        Ok(set_links(&mut inner.group_permissions, group_id, &desired))
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        let mut inner = self.write()?;

        if inner.groups.values().any(|g| g.name == group.name) {
            return Err(StoreError::already_exists("group", &group.name));
        }

        inner.next_group_id += 1;
        let created = Group {
            id: inner.next_group_id,
            name: group.name,
            description: group.description,
            created_at: now_millis(),
            created_by: group.created_by,
            updated_at: None,
            updated_by: None,
        };
        inner.groups.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(&id).cloned())
    }

    async fn find_groups(&self, query: &GroupQuery) -> Result<Vec<Group>> {
        let inner = self.read()?;
        let groups: Vec<Group> = inner
            .groups
            .values()
            .filter(|g| query.created_by.map_or(true, |v| g.created_by == Some(v)))
            .cloned()
            .collect();

        Ok(query.page.apply(ordered(groups, query.order)))
    }

    async fn find_groups_by_user_id(&self, user_id: i64) -> Result<Vec<Group>> {
        let inner = self.read()?;
        Ok(inner
            .user_groups
            .iter()
            .filter(|(u, _)| *u == user_id)
            .filter_map(|(_, g)| inner.groups.get(g).cloned())
            .collect())
    }

    async fn update_group(&self, id: i64, patch: GroupPatch) -> Result<Group> {
        let mut inner = self.write()?;

        if let Some(name) = &patch.name {
            if inner.groups.values().any(|g| g.id != id && &g.name == name) {
                return Err(StoreError::already_exists("group", name));
            }
        }

        let group = inner
            .groups
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("group", id))?;
        if let Some(v) = patch.name {
            group.name = v;
        }
        if let Some(v) = patch.description {
            group.description = v;
        }
        group.updated_at = Some(now_millis());
        group.updated_by = patch.updated_by;

        Ok(group.clone())
    }

    async fn delete_group(&self, id: i64) -> Result<()> {
        let mut inner = self.write()?;

        if !inner.groups.contains_key(&id) {
            return Err(StoreError::not_found("group", id));
        }
        if inner.user_groups.iter().any(|(_, g)| *g == id) {
            return Err(StoreError::Dependent {
                entity: "group",
                key: id.to_string(),
                dependents: "members",
            });
        }
        if inner.group_permissions.iter().any(|(g, _)| *g == id) {
            return Err(StoreError::Dependent {
                entity: "group",
                key: id.to_string(),
                dependents: "permissions",
            });
        }

        inner.groups.remove(&id);
        Ok(())
    }

    async fn belongs_to(&self, user_id: i64, group_id: i64) -> Result<bool> {
        Ok(self.read()?.user_groups.contains(&(user_id, group_id)))
    }

    async fn set_user_groups(&self, user_id: i64, group_ids: &[i64]) -> Result<SetResult> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::not_found("user", user_id));
        }
        if let Some(missing) = group_ids.iter().find(|g| !inner.groups.contains_key(*g)) {
            return Err(StoreError::not_found("group", missing));
        }
        let desired: BTreeSet<i64> = group_ids.iter().copied().collect();
        Ok(set_links(&mut inner.user_groups, user_id, &desired))
    }

    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshToken> {
        let mut inner = self.write()?;

        if inner.refresh_tokens.contains_key(&token.token) {
            return Err(StoreError::already_exists("refresh token", &token.token));
        }
        if !inner.users.contains_key(&token.user_id) {
            return Err(StoreError::not_found("user", token.user_id));
        }

        let created = RefreshToken {
            token: token.token,
            user_id: token.user_id,
            notes: token.notes,
            expire_at: token.expire_at,
            revoked: false,
            last_used_at: None,
            created_at: now_millis(),
            created_by: token.created_by,
            updated_at: None,
            updated_by: None,
        };
        inner
            .refresh_tokens
            .insert(created.token.clone(), created.clone());

        Ok(created)
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        Ok(self.read()?.refresh_tokens.get(token).cloned())
    }

    async fn find_refresh_token_by_user(
        &self,
        token: &str,
        user_id: i64,
    ) -> Result<Option<RefreshToken>> {
        let inner = self.read()?;
        Ok(inner
            .refresh_tokens
            .get(token)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn find_refresh_tokens(&self, query: &RefreshTokenQuery) -> Result<Vec<RefreshToken>> {
        let inner = self.read()?;
        let mut tokens: Vec<RefreshToken> = inner
            .refresh_tokens
            .values()
            .filter(|t| query.user_id.map_or(true, |v| t.user_id == v))
            .filter(|t| query.revoked.map_or(true, |v| t.revoked == v))
            .cloned()
            .collect();
        tokens.sort_by(|a, b| (a.created_at, &a.token).cmp(&(b.created_at, &b.token)));

        Ok(query.page.apply(ordered(tokens, query.order)))
    }

    async fn revoke_refresh_token(
        &self,
        token: &str,
        user_id: i64,
        revoked_by: Option<i64>,
    ) -> Result<RefreshToken> {
        let mut inner = self.write()?;
        let stored = inner
            .refresh_tokens
            .get_mut(token)
            .filter(|t| t.user_id == user_id)
            .ok_or_else(|| StoreError::not_found("refresh token", token))?;

        if !stored.revoked {
            stored.revoked = true;
            stored.updated_at = Some(now_millis());
            stored.updated_by = revoked_by;
        }

        Ok(stored.clone())
    }

    async fn mark_refresh_token_used(&self, token: &str, at: i64) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .refresh_tokens
            .get_mut(token)
            .ok_or_else(|| StoreError::not_found("refresh token", token))?;
        stored.last_used_at = Some(at);
        Ok(())
    }
}
