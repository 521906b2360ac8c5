//! Request records accepted by the service operations.
//!
//! Only the fields the policy engine or storage needs are modelled; the
//! wire mapping lives with the transport.

use serde::{Deserialize, Serialize};

use crate::query::{GroupQuery, Page, PermissionQuery, RefreshTokenQuery, UserQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub plain_password: String,
    /// Pre-hashed password. Only a superuser may supply one.
    #[serde(default)]
    pub secure_password: Option<Vec<u8>>,
    pub first_name: String,
    pub last_name: String,
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_confirmed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyUserRequest {
    pub id: i64,
    pub username: Option<String>,
    pub plain_password: Option<String>,
    #[serde(default)]
    pub secure_password: Option<Vec<u8>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_active: Option<bool>,
    pub is_confirmed: Option<bool>,
}

impl ModifyUserRequest {
    /// True if the request clears a flag the target currently holds.
    pub fn demotes(&self, is_superuser: bool, is_staff: bool) -> bool {
        (is_superuser && self.is_superuser == Some(false))
            || (is_staff && self.is_staff == Some(false))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersRequest {
    pub query: UserQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyGroupRequest {
    pub id: i64,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListGroupsRequest {
    pub query: GroupQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPermissionsRequest {
    pub query: PermissionQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsGrantedRequest {
    pub user_id: i64,
    pub permission: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BelongsToRequest {
    pub user_id: i64,
    pub group_id: i64,
}

/// Replace the permissions held directly by a user or a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPermissionsRequest {
    /// User id or group id, depending on the operation.
    pub id: i64,
    pub permissions: Vec<String>,
    /// Create permission rows that are not stored yet instead of failing.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetUserGroupsRequest {
    pub user_id: i64,
    pub groups: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMembershipRequest {
    pub id: i64,
    #[serde(default)]
    pub page: Page,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPermissionsRequest {
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRefreshTokenRequest {
    pub notes: Option<String>,
    /// Unix milliseconds.
    pub expire_at: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRefreshTokensRequest {
    pub query: RefreshTokenQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeRefreshTokenRequest {
    pub token: String,
    pub user_id: i64,
}

/// How a caller proves who they are on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginStrategy {
    UsernameAndPassword { username: String, password: String },
    RefreshToken { refresh_token: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub strategy: LoginStrategy,
    /// Free-form client identifier recorded on the session.
    #[serde(default)]
    pub client: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demotes() {
        let req = ModifyUserRequest {
            is_superuser: Some(false),
            ..Default::default()
        };
        assert!(req.demotes(true, false));
        assert!(!req.demotes(false, false));

        let req = ModifyUserRequest {
            is_staff: Some(false),
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(req.demotes(false, true));
        assert!(!req.demotes(true, false));
    }
}
