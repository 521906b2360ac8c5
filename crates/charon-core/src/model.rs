//! Entity records.
//!
//! These are the readable shapes of stored rows. The policy engine only
//! ever reads them; mutation goes through the storage collaborator using
//! the `New*` and `*Patch` records below.

use serde::{Deserialize, Serialize};

use crate::permission::Permission;

/// A user account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,

    /// Password digest produced by the configured hasher.
    #[serde(skip_serializing, default)]
    pub password: Vec<u8>,

    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_confirmed: bool,

    #[serde(skip_serializing, default)]
    pub confirmation_token: Vec<u8>,

    /// Unix milliseconds.
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    /// Set once at creation, never changes.
    pub created_by: Option<i64>,
    pub updated_at: Option<i64>,
    pub updated_by: Option<i64>,
}

impl User {
    /// True if `user_id` created this user.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.created_by == Some(user_id)
    }
}

/// Input for creating a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: Vec<u8>,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
    pub is_confirmed: bool,
    pub confirmation_token: Vec<u8>,
    pub created_by: Option<i64>,
}

/// Partial update of a user. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password: Option<Vec<u8>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_confirmed: Option<bool>,
    pub updated_by: Option<i64>,
}

/// A named set of permissions users can belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: i64,
    pub created_by: Option<i64>,
    pub updated_at: Option<i64>,
    pub updated_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub description: String,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub updated_by: Option<i64>,
}

/// A stored permission row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub id: i64,
    pub permission: Permission,
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

/// A long-lived credential exchangeable for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub token: String,
    /// The user the token logs in as.
    pub user_id: i64,
    pub notes: Option<String>,
    /// Unix milliseconds; `None` never expires.
    pub expire_at: Option<i64>,
    /// One-way: once set it is never cleared.
    pub revoked: bool,
    pub last_used_at: Option<i64>,
    pub created_at: i64,
    pub created_by: Option<i64>,
    pub updated_at: Option<i64>,
    pub updated_by: Option<i64>,
}

impl RefreshToken {
    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expire_at, Some(at) if now > at)
    }

    /// Usable for login: not revoked and not expired.
    pub fn is_usable(&self, now: i64) -> bool {
        !self.revoked && !self.is_expired(now)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRefreshToken {
    pub token: String,
    pub user_id: i64,
    pub notes: Option<String>,
    pub expire_at: Option<i64>,
    pub created_by: Option<i64>,
}

/// Counts reported by the set-style operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResult {
    pub created: i64,
    pub removed: i64,
    pub untouched: i64,
}
