//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Charon. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use charon_core::{
    now_millis, Group, GroupPatch, GroupQuery, NewGroup, NewRefreshToken, NewUser, Permission,
    PermissionQuery, PermissionRecord, Permissions, RefreshToken, RefreshTokenQuery, SetResult,
    SortOrder, User, UserPatch, UserQuery,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{PermissionChanges, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

const USER_COLUMNS: &str = "id, username, password, first_name, last_name, is_superuser, \
     is_staff, is_active, is_confirmed, confirmation_token, last_login_at, created_at, \
     created_by, updated_at, updated_by";

const GROUP_COLUMNS: &str =
    "id, name, description, created_at, created_by, updated_at, updated_by";

const PERMISSION_COLUMNS: &str = "id, subsystem, module, action, created_at, updated_at";

const REFRESH_TOKEN_COLUMNS: &str = "token, user_id, notes, expire_at, revoked, last_used_at, \
     created_at, created_by, updated_at, updated_by";

/// Effective permission ids of user `?1`: direct grants plus group grants.
const EFFECTIVE_PERMISSION_IDS: &str = "SELECT permission_id FROM user_permissions WHERE user_id = ?1
     UNION
     SELECT gp.permission_id FROM group_permissions gp
     JOIN user_groups ug ON ug.group_id = gp.group_id
     WHERE ug.user_id = ?1";

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password: row.get("password")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        is_superuser: row.get("is_superuser")?,
        is_staff: row.get("is_staff")?,
        is_active: row.get("is_active")?,
        is_confirmed: row.get("is_confirmed")?,
        confirmation_token: row.get("confirmation_token")?,
        last_login_at: row.get("last_login_at")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}

fn row_to_group(row: &rusqlite::Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}

fn row_to_permission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Permission> {
    let subsystem: String = row.get("subsystem")?;
    let module: String = row.get("module")?;
    let action: String = row.get("action")?;

    Permission::new(subsystem, module, action).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_permission_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PermissionRecord> {
    Ok(PermissionRecord {
        id: row.get("id")?,
        permission: row_to_permission(row)?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_refresh_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefreshToken> {
    Ok(RefreshToken {
        token: row.get("token")?,
        user_id: row.get("user_id")?,
        notes: row.get("notes")?,
        expire_at: row.get("expire_at")?,
        revoked: row.get("revoked")?,
        last_used_at: row.get("last_used_at")?,
        created_at: row.get("created_at")?,
        created_by: row.get("created_by")?,
        updated_at: row.get("updated_at")?,
        updated_by: row.get("updated_by")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    }
}

fn find_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        params![id],
        row_to_user,
    )
    .optional()
    .map_err(StoreError::from)
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    conn.query_row(sql, params![id], |row| row.get(0))
        .map_err(StoreError::from)
}

fn sorted_permissions(conn: &Connection, sql: &str, key: &dyn rusqlite::ToSql) -> Result<Permissions> {
    let mut stmt = conn.prepare(sql)?;
    let permissions = stmt
        .query_map([key], row_to_permission)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(Permissions::from(permissions))
}

fn resolve_permission_ids(tx: &Transaction<'_>, permissions: &Permissions) -> Result<BTreeSet<i64>> {
    let mut stmt = tx.prepare(
        "SELECT id FROM permissions WHERE subsystem = ?1 AND module = ?2 AND action = ?3",
    )?;

    let mut ids = BTreeSet::new();
    for p in permissions {
        let id: Option<i64> = stmt
            .query_row(params![p.subsystem(), p.module(), p.action()], |row| {
                row.get(0)
            })
            .optional()?;
        ids.insert(id.ok_or_else(|| StoreError::not_found("permission", p))?);
    }
    Ok(ids)
}

/// Replace every `owner_column = owner` link of `table` with `desired`.
///
/// `table` and the column names are compile-time constants.
fn set_links(
    tx: &Transaction<'_>,
    table: &str,
    owner_column: &str,
    target_column: &str,
    owner: i64,
    desired: &BTreeSet<i64>,
) -> Result<SetResult> {
    let current: BTreeSet<i64> = tx
        .prepare(&format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            target_column, table, owner_column
        ))?
        .query_map(params![owner], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    let mut created = 0;
    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
            table, owner_column, target_column
        ))?;
        for target in desired.difference(&current) {
            created += insert.execute(params![owner, target])? as i64;
        }
    }

    let mut removed = 0;
    {
        let mut delete = tx.prepare(&format!(
            "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
            table, owner_column, target_column
        ))?;
        for target in current.difference(desired) {
            removed += delete.execute(params![owner, target])? as i64;
        }
    }

    Ok(SetResult {
        created,
        removed,
        untouched: desired.len() as i64 - created,
    })
}

fn insert_permission(conn: &Connection, permission: &Permission, now: i64) -> Result<i64> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO permissions (subsystem, module, action, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            permission.subsystem(),
            permission.module(),
            permission.action(),
            now
        ],
    )?;
    Ok(affected as i64)
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO users (
                    username, password, first_name, last_name, is_superuser, is_staff,
                    is_active, is_confirmed, confirmation_token, created_at, created_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    user.username,
                    user.password,
                    user.first_name,
                    user.last_name,
                    user.is_superuser,
                    user.is_staff,
                    user.is_active,
                    user.is_confirmed,
                    user.confirmation_token,
                    now_millis(),
                    user.created_by,
                ],
            );
            match inserted {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::already_exists("user", &user.username))
                }
                other => other?,
            };

            let id = conn.last_insert_rowid();
            find_user(conn, id)?.ok_or_else(|| StoreError::not_found("user", id))
        })
        .await
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>> {
        self.run(move |conn| find_user(conn, id)).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                row_to_user,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn user_exists(&self, id: i64) -> Result<bool> {
        self.run(move |conn| {
            exists(
                conn,
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
                id,
            )
        })
        .await
    }

    async fn count_users(&self) -> Result<i64> {
        self.run(|conn| {
            conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
                .map_err(StoreError::from)
        })
        .await
    }

    async fn find_users(&self, query: &UserQuery) -> Result<Vec<User>> {
        let query = query.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE (?1 IS NULL OR is_superuser = ?1)
                   AND (?2 IS NULL OR is_staff = ?2)
                   AND (?3 IS NULL OR created_by = ?3)
                 ORDER BY id {}
                 LIMIT ?4 OFFSET ?5",
                USER_COLUMNS,
                direction(query.order)
            ))?;

            let users = stmt
                .query_map(
                    params![
                        query.is_superuser,
                        query.is_staff,
                        query.created_by,
                        query.page.limit,
                        query.page.offset
                    ],
                    row_to_user,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(users)
        })
        .await
    }

    async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User> {
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE users SET
                    username = COALESCE(?2, username),
                    password = COALESCE(?3, password),
                    first_name = COALESCE(?4, first_name),
                    last_name = COALESCE(?5, last_name),
                    is_superuser = COALESCE(?6, is_superuser),
                    is_staff = COALESCE(?7, is_staff),
                    is_active = COALESCE(?8, is_active),
                    is_confirmed = COALESCE(?9, is_confirmed),
                    updated_at = ?10,
                    updated_by = ?11
                 WHERE id = ?1",
                params![
                    id,
                    patch.username,
                    patch.password,
                    patch.first_name,
                    patch.last_name,
                    patch.is_superuser,
                    patch.is_staff,
                    patch.is_active,
                    patch.is_confirmed,
                    now_millis(),
                    patch.updated_by,
                ],
            );
            let affected = match updated {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::already_exists(
                        "user",
                        patch.username.unwrap_or_default(),
                    ))
                }
                other => other?,
            };
            if affected == 0 {
                return Err(StoreError::not_found("user", id));
            }

            find_user(conn, id)?.ok_or_else(|| StoreError::not_found("user", id))
        })
        .await
    }

    async fn delete_user(&self, id: i64) -> Result<()> {
        self.run(move |conn| {
            let tx = conn.transaction()?;

            if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", id)? {
                return Err(StoreError::not_found("user", id));
            }
            for (table, dependents) in [("user_permissions", "permissions"), ("user_groups", "groups")] {
                let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1)", table);
                if exists(&tx, &sql, id)? {
                    return Err(StoreError::Dependent {
                        entity: "user",
                        key: id.to_string(),
                        dependents,
                    });
                }
            }

            tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_last_login(&self, id: i64, at: i64) -> Result<()> {
        self.run(move |conn| {
            let affected = conn.execute(
                "UPDATE users SET last_login_at = ?2 WHERE id = ?1",
                params![id, at],
            )?;
            if affected == 0 {
                return Err(StoreError::not_found("user", id));
            }
            Ok(())
        })
        .await
    }

    async fn find_permissions_by_user_id(&self, user_id: i64) -> Result<Permissions> {
        self.run(move |conn| {
            let sql = format!(
                "SELECT subsystem, module, action FROM permissions
                 WHERE id IN ({})
                 ORDER BY subsystem, module, action",
                EFFECTIVE_PERMISSION_IDS
            );
            sorted_permissions(conn, &sql, &user_id)
        })
        .await
    }

    async fn find_permissions_by_group_id(&self, group_id: i64) -> Result<Permissions> {
        self.run(move |conn| {
            sorted_permissions(
                conn,
                "SELECT p.subsystem, p.module, p.action FROM permissions p
                 JOIN group_permissions gp ON gp.permission_id = p.id
                 WHERE gp.group_id = ?1
                 ORDER BY p.subsystem, p.module, p.action",
                &group_id,
            )
        })
        .await
    }

    async fn find_permissions_by_subsystem(&self, subsystem: &str) -> Result<Permissions> {
        let subsystem = subsystem.to_string();
        self.run(move |conn| {
            sorted_permissions(
                conn,
                "SELECT subsystem, module, action FROM permissions
                 WHERE subsystem = ?1
                 ORDER BY subsystem, module, action",
                &subsystem,
            )
        })
        .await
    }

    async fn find_permission_by_id(&self, id: i64) -> Result<Option<PermissionRecord>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM permissions WHERE id = ?1", PERMISSION_COLUMNS),
                params![id],
                row_to_permission_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_permissions(&self, query: &PermissionQuery) -> Result<Vec<PermissionRecord>> {
        let query = query.clone();
        self.run(move |conn| {
            let dir = direction(query.order);
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM permissions
                 WHERE (?1 IS NULL OR subsystem = ?1)
                   AND (?2 IS NULL OR module = ?2)
                   AND (?3 IS NULL OR action = ?3)
                 ORDER BY subsystem {dir}, module {dir}, action {dir}
                 LIMIT ?4 OFFSET ?5",
                PERMISSION_COLUMNS,
                dir = dir
            ))?;

            let records = stmt
                .query_map(
                    params![
                        query.subsystem,
                        query.module,
                        query.action,
                        query.page.limit,
                        query.page.offset
                    ],
                    row_to_permission_record,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(records)
        })
        .await
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

        let create = create.to_vec();
        let remove = remove.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();
            let mut changes = PermissionChanges::default();

            for p in &create {
                changes.created += insert_permission(&tx, p, now)?;
            }
            for p in &remove {
                changes.removed += tx.execute(
                    "DELETE FROM permissions WHERE subsystem = ?1 AND module = ?2 AND action = ?3",
                    params![p.subsystem(), p.module(), p.action()],
                )? as i64;
            }

            tx.commit()?;
            Ok(changes)
        })
        .await
    }

    async fn insert_missing_permissions(&self, permissions: &Permissions) -> Result<i64> {
        let permissions = permissions.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let now = now_millis();
            let mut created = 0;
            for p in &permissions {
                created += insert_permission(&tx, p, now)?;
            }
            tx.commit()?;
            Ok(created)
        })
        .await
    }

    async fn is_granted(&self, user_id: i64, permission: &Permission) -> Result<bool> {
        let permission = permission.clone();
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT EXISTS(
                        SELECT 1 FROM permissions
                        WHERE id IN ({})
                          AND subsystem = ?2 AND module = ?3 AND action = ?4
                    )",
                    EFFECTIVE_PERMISSION_IDS
                ),
                params![
                    user_id,
                    permission.subsystem(),
                    permission.module(),
                    permission.action()
                ],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_user_permissions(
        &self,
        user_id: i64,
        permissions: &Permissions,
    ) -> Result<SetResult> {
        let permissions = permissions.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", user_id)? {
                return Err(StoreError::not_found("user", user_id));
            }
            let desired = resolve_permission_ids(&tx, &permissions)?;
            let result = set_links(
                &tx,
                "user_permissions",
                "user_id",
                "permission_id",
                user_id,
                &desired,
            )?;
            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn set_group_permissions(
        &self,
        group_id: i64,
        permissions: &Permissions,
    ) -> Result<SetResult> {
        let permissions = permissions.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1)", group_id)? {
                return Err(StoreError::not_found("group", group_id));
            }
            let desired = resolve_permission_ids(&tx, &permissions)?;
            let result = set_links(
                &tx,
                "group_permissions",
                "group_id",
                "permission_id",
                group_id,
                &desired,
            )?;
            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group> {
        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO groups (name, description, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4)",
                params![group.name, group.description, now_millis(), group.created_by],
            );
            match inserted {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::already_exists("group", &group.name))
                }
                other => other?,
            };

            let id = conn.last_insert_rowid();
            conn.query_row(
                &format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS),
                params![id],
                row_to_group,
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_group_by_id(&self, id: i64) -> Result<Option<Group>> {
        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS),
                params![id],
                row_to_group,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_groups(&self, query: &GroupQuery) -> Result<Vec<Group>> {
        let query = query.clone();
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM groups
                 WHERE (?1 IS NULL OR created_by = ?1)
                 ORDER BY id {}
                 LIMIT ?2 OFFSET ?3",
                GROUP_COLUMNS,
                direction(query.order)
            ))?;

            let groups = stmt
                .query_map(
                    params![query.created_by, query.page.limit, query.page.offset],
                    row_to_group,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(groups)
        })
        .await
    }

    async fn find_groups_by_user_id(&self, user_id: i64) -> Result<Vec<Group>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT g.id, g.name, g.description, g.created_at, g.created_by,
                        g.updated_at, g.updated_by
                 FROM groups g
                 JOIN user_groups ug ON ug.group_id = g.id
                 WHERE ug.user_id = ?1
                 ORDER BY g.id",
            )?;

            let groups = stmt
                .query_map(params![user_id], row_to_group)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(groups)
        })
        .await
    }

    async fn update_group(&self, id: i64, patch: GroupPatch) -> Result<Group> {
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE groups SET
                    name = COALESCE(?2, name),
                    description = COALESCE(?3, description),
                    updated_at = ?4,
                    updated_by = ?5
                 WHERE id = ?1",
                params![id, patch.name, patch.description, now_millis(), patch.updated_by],
            );
            let affected = match updated {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::already_exists(
                        "group",
                        patch.name.unwrap_or_default(),
                    ))
                }
                other => other?,
            };
            if affected == 0 {
                return Err(StoreError::not_found("group", id));
            }

            conn.query_row(
                &format!("SELECT {} FROM groups WHERE id = ?1", GROUP_COLUMNS),
                params![id],
                row_to_group,
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_group(&self, id: i64) -> Result<()> {
        self.run(move |conn| {
            let tx = conn.transaction()?;

            if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1)", id)? {
                return Err(StoreError::not_found("group", id));
            }
            for (table, dependents) in [("user_groups", "members"), ("group_permissions", "permissions")] {
                let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE group_id = ?1)", table);
                if exists(&tx, &sql, id)? {
                    return Err(StoreError::Dependent {
                        entity: "group",
                        key: id.to_string(),
                        dependents,
                    });
                }
            }

            tx.execute("DELETE FROM groups WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn belongs_to(&self, user_id: i64, group_id: i64) -> Result<bool> {
        self.run(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user_groups WHERE user_id = ?1 AND group_id = ?2)",
                params![user_id, group_id],
                |row| row.get(0),
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn set_user_groups(&self, user_id: i64, group_ids: &[i64]) -> Result<SetResult> {
        let desired: BTreeSet<i64> = group_ids.iter().copied().collect();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", user_id)? {
                return Err(StoreError::not_found("user", user_id));
            }
            for group_id in &desired {
                if !exists(&tx, "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1)", *group_id)? {
                    return Err(StoreError::not_found("group", group_id));
                }
            }
            let result = set_links(&tx, "user_groups", "user_id", "group_id", user_id, &desired)?;
            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn create_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshToken> {
        self.run(move |conn| {
            if !exists(conn, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)", token.user_id)? {
                return Err(StoreError::not_found("user", token.user_id));
            }

            let inserted = conn.execute(
                "INSERT INTO refresh_tokens (token, user_id, notes, expire_at, created_at, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    token.token,
                    token.user_id,
                    token.notes,
                    token.expire_at,
                    now_millis(),
                    token.created_by,
                ],
            );
            match inserted {
                Err(e) if is_unique_violation(&e) => {
                    return Err(StoreError::already_exists("refresh token", &token.token))
                }
                other => other?,
            };

            conn.query_row(
                &format!(
                    "SELECT {} FROM refresh_tokens WHERE token = ?1",
                    REFRESH_TOKEN_COLUMNS
                ),
                params![token.token],
                row_to_refresh_token,
            )
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let token = token.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM refresh_tokens WHERE token = ?1",
                    REFRESH_TOKEN_COLUMNS
                ),
                params![token],
                row_to_refresh_token,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_refresh_token_by_user(
        &self,
        token: &str,
        user_id: i64,
    ) -> Result<Option<RefreshToken>> {
        let token = token.to_string();
        self.run(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM refresh_tokens WHERE token = ?1 AND user_id = ?2",
                    REFRESH_TOKEN_COLUMNS
                ),
                params![token, user_id],
                row_to_refresh_token,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_refresh_tokens(&self, query: &RefreshTokenQuery) -> Result<Vec<RefreshToken>> {
        let query = query.clone();
        self.run(move |conn| {
            let dir = direction(query.order);
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM refresh_tokens
                 WHERE (?1 IS NULL OR user_id = ?1)
                   AND (?2 IS NULL OR revoked = ?2)
                 ORDER BY created_at {dir}, token {dir}
                 LIMIT ?3 OFFSET ?4",
                REFRESH_TOKEN_COLUMNS,
                dir = dir
            ))?;

            let tokens = stmt
                .query_map(
                    params![
                        query.user_id,
                        query.revoked,
                        query.page.limit,
                        query.page.offset
                    ],
                    row_to_refresh_token,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(tokens)
        })
        .await
    }

    async fn revoke_refresh_token(
        &self,
        token: &str,
        user_id: i64,
        revoked_by: Option<i64>,
    ) -> Result<RefreshToken> {
        let token = token.to_string();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "UPDATE refresh_tokens SET revoked = 1, updated_at = ?3, updated_by = ?4
                 WHERE token = ?1 AND user_id = ?2 AND revoked = 0",
                params![token, user_id, now_millis(), revoked_by],
            )?;

            let revoked = tx
                .query_row(
                    &format!(
                        "SELECT {} FROM refresh_tokens WHERE token = ?1 AND user_id = ?2",
                        REFRESH_TOKEN_COLUMNS
                    ),
                    params![token, user_id],
                    row_to_refresh_token,
                )
                .optional()?
                .ok_or_else(|| StoreError::not_found("refresh token", &token))?;

            tx.commit()?;
            Ok(revoked)
        })
        .await
    }

    async fn mark_refresh_token_used(&self, token: &str, at: i64) -> Result<()> {
        let token = token.to_string();
        self.run(move |conn| {
            let affected = conn.execute(
                "UPDATE refresh_tokens SET last_used_at = ?2 WHERE token = ?1",
                params![token, at],
            )?;
            if affected == 0 {
                return Err(StoreError::not_found("refresh token", &token));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, created_by: Option<i64>) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: b"secret".to_vec(),
            is_active: true,
            is_confirmed: true,
            created_by,
            ..Default::default()
        }
    }

    fn perm(s: &str) -> Permission {
        Permission::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let store = SqliteStore::open_memory().unwrap();
        let user = store.create_user(new_user("alice", None)).await.unwrap();

        let fetched = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
        assert_eq!(fetched.password, b"secret".to_vec());
        assert!(store.find_user_by_id(user.id + 1).await.unwrap().is_none());
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username() {
        let store = SqliteStore::open_memory().unwrap();
        store.create_user(new_user("alice", None)).await.unwrap();

        let err = store.create_user(new_user("alice", None)).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_update_user_partial() {
        let store = SqliteStore::open_memory().unwrap();
        let user = store.create_user(new_user("alice", None)).await.unwrap();

        let updated = store
            .update_user(
                user.id,
                UserPatch {
                    first_name: Some("Alice".into()),
                    is_staff: Some(true),
                    updated_by: Some(user.id),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.first_name, "Alice");
        assert!(updated.is_staff);
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.updated_by, Some(user.id));

        let err = store
            .update_user(999, UserPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_apply_permission_changes_is_scoped() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .apply_permission_changes("b", &[perm("b:x:y")], &[])
            .await
            .unwrap();

        let changes = store
            .apply_permission_changes("a", &[perm("a:b:c"), perm("a:bb:cc")], &[])
            .await
            .unwrap();
        assert_eq!(changes, PermissionChanges { created: 2, removed: 0 });

        let changes = store
            .apply_permission_changes("a", &[], &[perm("a:bb:cc")])
            .await
            .unwrap();
        assert_eq!(changes, PermissionChanges { created: 0, removed: 1 });

        assert_eq!(
            store.find_permissions_by_subsystem("a").await.unwrap().strings(),
            vec!["a:b:c"]
        );
        assert_eq!(
            store.find_permissions_by_subsystem("b").await.unwrap().strings(),
            vec!["b:x:y"]
        );
    }

    #[tokio::test]
    async fn test_removing_permission_drops_grants() {
        let store = SqliteStore::open_memory().unwrap();
        let user = store.create_user(new_user("alice", None)).await.unwrap();
        store
            .apply_permission_changes("a", &[perm("a:b:c")], &[])
            .await
            .unwrap();
        store
            .set_user_permissions(user.id, &Permissions::from(vec![perm("a:b:c")]))
            .await
            .unwrap();
        assert!(store.is_granted(user.id, &perm("a:b:c")).await.unwrap());

        store
            .apply_permission_changes("a", &[], &[perm("a:b:c")])
            .await
            .unwrap();
        assert!(!store.is_granted(user.id, &perm("a:b:c")).await.unwrap());
        store.delete_user(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_group_permissions_are_effective() {
        let store = SqliteStore::open_memory().unwrap();
        let user = store.create_user(new_user("alice", None)).await.unwrap();
        let group = store
            .create_group(NewGroup {
                name: "ops".into(),
                description: "operators".into(),
                created_by: Some(user.id),
            })
            .await
            .unwrap();
        store
            .apply_permission_changes("a", &[perm("a:b:c"), perm("a:b:d")], &[])
            .await
            .unwrap();
        store
            .set_group_permissions(group.id, &Permissions::from(vec![perm("a:b:d")]))
            .await
            .unwrap();

        let result = store.set_user_groups(user.id, &[group.id]).await.unwrap();
        assert_eq!(result.created, 1);
        assert!(store.belongs_to(user.id, group.id).await.unwrap());
        assert_eq!(
            store
                .find_permissions_by_user_id(user.id)
                .await
                .unwrap()
                .strings(),
            vec!["a:b:d"]
        );

        let err = store.delete_group(group.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Dependent { .. }));

        let err = store.set_user_groups(user.id, &[group.id, 42]).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.belongs_to(user.id, group.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_permissions_ordering() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .apply_permission_changes("a", &[perm("a:z:a"), perm("a:b:c"), perm("a:b:a")], &[])
            .await
            .unwrap();

        let asc: Vec<String> = store
            .find_permissions(&PermissionQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.permission.to_string())
            .collect();
        assert_eq!(asc, vec!["a:b:a", "a:b:c", "a:z:a"]);

        let desc: Vec<String> = store
            .find_permissions(&PermissionQuery {
                module: Some("b".into()),
                order: SortOrder::Descending,
                ..Default::default()
            })
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.permission.to_string())
            .collect();
        assert_eq!(desc, vec!["a:b:c", "a:b:a"]);
    }

    #[tokio::test]
    async fn test_refresh_token_lifecycle() {
        let store = SqliteStore::open_memory().unwrap();
        let user = store.create_user(new_user("alice", None)).await.unwrap();
        let token = store
            .create_refresh_token(NewRefreshToken {
                token: "abc".into(),
                user_id: user.id,
                notes: Some("laptop".into()),
                expire_at: None,
                created_by: Some(user.id),
            })
            .await
            .unwrap();
        assert!(!token.revoked);

        let err = store
            .create_refresh_token(NewRefreshToken {
                token: "abc".into(),
                user_id: user.id,
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let first = store
            .revoke_refresh_token("abc", user.id, Some(user.id))
            .await
            .unwrap();
        let second = store
            .revoke_refresh_token("abc", user.id, Some(user.id))
            .await
            .unwrap();
        assert!(first.revoked);
        assert_eq!(first, second);

        store.mark_refresh_token_used("abc", 1234).await.unwrap();
        let listed = store
            .find_refresh_tokens(&RefreshTokenQuery {
                user_id: Some(user.id),
                revoked: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].last_used_at, Some(1234));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charon.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.create_user(new_user("alice", None)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.find_user_by_username("alice").await.unwrap().is_some());
    }
}
