//! Filters for list-style operations.
//!
//! The policy engine narrows these in place (for example forcing
//! `created_by` to the actor) before they reach storage.

use serde::{Deserialize, Serialize};

/// Default page size when a request does not set one.
pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    /// Clamp into `[0, max]`, substituting `default` for non-positive limits.
    pub fn clamped(self, default: i64, max: i64) -> Self {
        let limit = if self.limit <= 0 { default } else { self.limit };
        Self {
            offset: self.offset.max(0),
            limit: limit.min(max),
        }
    }

    /// Apply the window to an already ordered iterator.
    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuery {
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub created_by: Option<i64>,
    pub page: Page,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupQuery {
    pub created_by: Option<i64>,
    pub page: Page,
    pub order: SortOrder,
}

/// Permission listing, sorted by subsystem, module, then action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionQuery {
    pub subsystem: Option<String>,
    pub module: Option<String>,
    pub action: Option<String>,
    pub page: Page,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenQuery {
    pub user_id: Option<i64>,
    pub revoked: Option<bool>,
    pub page: Page,
    pub order: SortOrder,
}
