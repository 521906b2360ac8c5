//! The authenticated principal of one call.

use charon_core::{Permission, Permissions, User};
use serde::Serialize;

/// Identity plus effective permissions, built fresh for every call.
///
/// Read-only: the policy engine inspects it and nothing mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct Actor {
    pub user: User,
    pub permissions: Permissions,
    /// Loopback caller presenting the operator user agent.
    pub is_local: bool,
}

impl Actor {
    pub fn new(user: User, permissions: Permissions) -> Self {
        Self {
            user,
            permissions,
            is_local: false,
        }
    }

    /// Synthetic actor for a local trusted caller without a session.
    ///
    /// It carries no user row (id 0) and no permissions.
    pub fn local() -> Self {
        Self {
            user: User::default(),
            permissions: Permissions::new(),
            is_local: true,
        }
    }

    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_superuser(&self) -> bool {
        self.user.is_superuser
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_staff
    }

    /// True for the synthetic local actor, which has no user row.
    pub fn is_anonymous_local(&self) -> bool {
        self.is_local && self.user.id == 0
    }

    pub fn has(&self, permission: &Permission) -> bool {
        self.permissions.has(permission)
    }

    /// True if any of `candidates` is held.
    pub fn has_any(&self, candidates: &[Permission]) -> bool {
        self.permissions.contains(candidates)
    }

    pub fn is_self(&self, user_id: i64) -> bool {
        !self.is_anonymous_local() && self.user.id == user_id
    }

    /// True if the actor created the row whose owner is `created_by`.
    pub fn owns(&self, created_by: Option<i64>) -> bool {
        !self.is_anonymous_local() && created_by == Some(self.user.id)
    }
}
