//! The compiled-in permission catalogue of the `charon` subsystem.
//!
//! Every administrative operation is gated by one or more of these. Most
//! user operations come in an `AS_OWNER`/`AS_STRANGER` pair, with a
//! separate `STAFF_` pair for staff targets.

use crate::permission::{Permission, Permissions};

/// Subsystem owning the catalogue.
pub const SUBSYSTEM: &str = "charon";

const fn charon(module: &'static str, action: &'static str) -> Permission {
    Permission::from_static(SUBSYSTEM, module, action)
}

pub const USER_CAN_CREATE: Permission = charon("user", "can create");
pub const USER_CAN_CREATE_STAFF: Permission = charon("user", "can create staff");

pub const USER_CAN_DELETE_AS_STRANGER: Permission = charon("user", "can delete as stranger");
pub const USER_CAN_DELETE_AS_OWNER: Permission = charon("user", "can delete as owner");
pub const USER_CAN_DELETE_STAFF_AS_STRANGER: Permission =
    charon("user", "can delete staff as stranger");
pub const USER_CAN_DELETE_STAFF_AS_OWNER: Permission = charon("user", "can delete staff as owner");

pub const USER_CAN_MODIFY_AS_STRANGER: Permission = charon("user", "can modify as stranger");
pub const USER_CAN_MODIFY_AS_OWNER: Permission = charon("user", "can modify as owner");
pub const USER_CAN_MODIFY_STAFF_AS_STRANGER: Permission =
    charon("user", "can modify staff as stranger");
pub const USER_CAN_MODIFY_STAFF_AS_OWNER: Permission = charon("user", "can modify staff as owner");

pub const USER_CAN_RETRIEVE_AS_OWNER: Permission = charon("user", "can retrieve as owner");
pub const USER_CAN_RETRIEVE_AS_STRANGER: Permission = charon("user", "can retrieve as stranger");
pub const USER_CAN_RETRIEVE_STAFF_AS_OWNER: Permission =
    charon("user", "can retrieve staff as owner");
pub const USER_CAN_RETRIEVE_STAFF_AS_STRANGER: Permission =
    charon("user", "can retrieve staff as stranger");

pub const USER_PERMISSION_CAN_CREATE: Permission = charon("user_permission", "can create");
pub const USER_PERMISSION_CAN_DELETE: Permission = charon("user_permission", "can delete");
pub const USER_PERMISSION_CAN_MODIFY: Permission = charon("user_permission", "can modify");
pub const USER_PERMISSION_CAN_RETRIEVE: Permission = charon("user_permission", "can retrieve");
pub const USER_PERMISSION_CAN_CHECK_GRANTING_AS_STRANGER: Permission =
    charon("user_permission", "can check granting as a stranger");

pub const USER_GROUP_CAN_CREATE: Permission = charon("user_group", "can create");
pub const USER_GROUP_CAN_DELETE: Permission = charon("user_group", "can delete");
pub const USER_GROUP_CAN_MODIFY: Permission = charon("user_group", "can modify");
pub const USER_GROUP_CAN_RETRIEVE: Permission = charon("user_group", "can retrieve");
pub const USER_GROUP_CAN_CHECK_BELONGING_AS_STRANGER: Permission =
    charon("user_group", "can check belonging as a stranger");

pub const PERMISSION_CAN_CREATE: Permission = charon("permission", "can create");
pub const PERMISSION_CAN_DELETE: Permission = charon("permission", "can delete");
pub const PERMISSION_CAN_MODIFY: Permission = charon("permission", "can modify");
pub const PERMISSION_CAN_RETRIEVE: Permission = charon("permission", "can retrieve");

pub const GROUP_CAN_CREATE: Permission = charon("group", "can create");
pub const GROUP_CAN_DELETE: Permission = charon("group", "can delete");
pub const GROUP_CAN_MODIFY: Permission = charon("group", "can modify");
pub const GROUP_CAN_RETRIEVE: Permission = charon("group", "can retrieve");

pub const GROUP_PERMISSION_CAN_CREATE: Permission = charon("group_permission", "can create");
pub const GROUP_PERMISSION_CAN_DELETE: Permission = charon("group_permission", "can delete");
pub const GROUP_PERMISSION_CAN_MODIFY: Permission = charon("group_permission", "can modify");
pub const GROUP_PERMISSION_CAN_RETRIEVE: Permission = charon("group_permission", "can retrieve");

pub const REFRESH_TOKEN_CAN_CREATE: Permission = charon("refresh_token", "can create");
pub const REFRESH_TOKEN_CAN_RETRIEVE_AS_OWNER: Permission =
    charon("refresh_token", "can retrieve as owner");
pub const REFRESH_TOKEN_CAN_RETRIEVE_AS_STRANGER: Permission =
    charon("refresh_token", "can retrieve as stranger");
pub const REFRESH_TOKEN_CAN_REVOKE_AS_OWNER: Permission =
    charon("refresh_token", "can revoke as owner");
pub const REFRESH_TOKEN_CAN_REVOKE_AS_STRANGER: Permission =
    charon("refresh_token", "can revoke as stranger");

/// Every permission of the `charon` subsystem.
pub const ALL_PERMISSIONS: &[Permission] = &[
    USER_CAN_CREATE,
    USER_CAN_CREATE_STAFF,
    USER_CAN_DELETE_AS_STRANGER,
    USER_CAN_DELETE_AS_OWNER,
    USER_CAN_DELETE_STAFF_AS_STRANGER,
    USER_CAN_DELETE_STAFF_AS_OWNER,
    USER_CAN_MODIFY_AS_STRANGER,
    USER_CAN_MODIFY_AS_OWNER,
    USER_CAN_MODIFY_STAFF_AS_STRANGER,
    USER_CAN_MODIFY_STAFF_AS_OWNER,
    USER_CAN_RETRIEVE_AS_OWNER,
    USER_CAN_RETRIEVE_AS_STRANGER,
    USER_CAN_RETRIEVE_STAFF_AS_OWNER,
    USER_CAN_RETRIEVE_STAFF_AS_STRANGER,
    USER_PERMISSION_CAN_CREATE,
    USER_PERMISSION_CAN_DELETE,
    USER_PERMISSION_CAN_MODIFY,
    USER_PERMISSION_CAN_RETRIEVE,
    USER_PERMISSION_CAN_CHECK_GRANTING_AS_STRANGER,
    USER_GROUP_CAN_CREATE,
    USER_GROUP_CAN_DELETE,
    USER_GROUP_CAN_MODIFY,
    USER_GROUP_CAN_RETRIEVE,
    USER_GROUP_CAN_CHECK_BELONGING_AS_STRANGER,
    PERMISSION_CAN_CREATE,
    PERMISSION_CAN_DELETE,
    PERMISSION_CAN_MODIFY,
    PERMISSION_CAN_RETRIEVE,
    GROUP_CAN_CREATE,
    GROUP_CAN_DELETE,
    GROUP_CAN_MODIFY,
    GROUP_CAN_RETRIEVE,
    GROUP_PERMISSION_CAN_CREATE,
    GROUP_PERMISSION_CAN_DELETE,
    GROUP_PERMISSION_CAN_MODIFY,
    GROUP_PERMISSION_CAN_RETRIEVE,
    REFRESH_TOKEN_CAN_CREATE,
    REFRESH_TOKEN_CAN_RETRIEVE_AS_OWNER,
    REFRESH_TOKEN_CAN_RETRIEVE_AS_STRANGER,
    REFRESH_TOKEN_CAN_REVOKE_AS_OWNER,
    REFRESH_TOKEN_CAN_REVOKE_AS_STRANGER,
];

/// The catalogue as an owned collection, ready for registration.
pub fn catalogue() -> Permissions {
    Permissions::from(ALL_PERMISSIONS)
}
