//! Permission registry: reconcile a declared catalogue with storage.
//!
//! For one subsystem, rows that are declared but not stored are created,
//! rows that are stored but no longer declared are removed, and the rest
//! are left alone. Other subsystems are never touched.

use std::collections::{BTreeSet, HashSet};
use std::sync::RwLock;

use charon_core::{Permission, Permissions};
use charon_store::Store;
use serde::Serialize;
use tracing::{debug, info};

use crate::status::{Result, Status};

/// Counts reported by one reconciliation.
///
/// `created + untouched` equals the number of distinct declared permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub created: i64,
    pub untouched: i64,
    pub removed: i64,
}

/// Reconciles permission catalogues and remembers what it has seen.
#[derive(Debug, Default)]
pub struct PermissionRegistry {
    seen: RwLock<HashSet<Permission>>,
}

impl PermissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile `declared` against the stored rows of its subsystem.
    ///
    /// Always goes to storage, so a shrunk catalogue still removes rows
    /// even when every declared permission was seen before.
    pub async fn register<S>(&self, store: &S, declared: &Permissions) -> Result<Registration>
    where
        S: Store + ?Sized,
    {
        let plan = Plan::snapshot(store, declared).await?;
        self.apply(store, plan).await
    }

    /// Apply a plan. Counts come from what the store actually changed, so
    /// rows another registration created after the snapshot count as
    /// untouched.
    async fn apply<S>(&self, store: &S, plan: Plan) -> Result<Registration>
    where
        S: Store + ?Sized,
    {
        let changes = store
            .apply_permission_changes(&plan.subsystem, &plan.create, &plan.remove)
            .await?;

        {
            let mut seen = self.seen.write().unwrap_or_else(|e| e.into_inner());
            for permission in &plan.remove {
                seen.remove(permission);
            }
            seen.extend(plan.declared.iter().cloned());
        }

        let registration = Registration {
            created: changes.created,
            untouched: plan.declared.len() as i64 - changes.created,
            removed: changes.removed,
        };
        info!(
            subsystem = %plan.subsystem,
            created = registration.created,
            untouched = registration.untouched,
            removed = registration.removed,
            "permissions registered"
        );
        Ok(registration)
    }

    /// True if `permission` was part of a successful registration.
    pub fn exists(&self, permission: &Permission) -> bool {
        let found = self
            .seen
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(permission);
        debug!(permission = %permission, found, "registry lookup");
        found
    }
}

/// Differences between a declared catalogue and one snapshot of storage.
struct Plan {
    subsystem: String,
    declared: BTreeSet<Permission>,
    create: Vec<Permission>,
    remove: Vec<Permission>,
}

impl Plan {
    async fn snapshot<S>(store: &S, declared: &Permissions) -> Result<Self>
    where
        S: Store + ?Sized,
    {
        let subsystem = declared
            .single_subsystem()
            .map_err(|err| Status::invalid_argument(err.to_string()))?
            .to_string();

        let stored: BTreeSet<Permission> = store
            .find_permissions_by_subsystem(&subsystem)
            .await?
            .into_iter()
            .collect();
        let declared: BTreeSet<Permission> = declared.iter().cloned().collect();

        Ok(Self {
            create: declared.difference(&stored).cloned().collect(),
            remove: stored.difference(&declared).cloned().collect(),
            subsystem,
            declared,
        })
    }
}
