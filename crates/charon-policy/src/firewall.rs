//! Per-operation authorization rules.
//!
//! Each administrative operation has its own method. Rules run after the
//! actor is resolved and before any storage mutation; the first matching
//! branch decides. List rules may rewrite the query instead of denying.

use charon_core::catalogue::*;
use charon_core::request::{CreateUserRequest, ModifyUserRequest};
use charon_core::{Permission, RefreshToken, RefreshTokenQuery, User, UserQuery};
use tracing::{debug, warn};

use crate::actor::Actor;
use crate::error::{PolicyError, Result};

/// Policy evaluator bound to one actor.
#[derive(Debug, Clone, Copy)]
pub struct Firewall<'a> {
    actor: &'a Actor,
}

impl<'a> Firewall<'a> {
    pub fn new(actor: &'a Actor) -> Self {
        Self { actor }
    }

    pub fn actor(&self) -> &'a Actor {
        self.actor
    }

    fn allow(&self, op: &'static str) -> Result<()> {
        debug!(actor_id = self.actor.id(), op, "allowed");
        Ok(())
    }

    fn deny(&self, op: &'static str, msg: &str) -> Result<()> {
        warn!(actor_id = self.actor.id(), op, reason = msg, "denied");
        Err(PolicyError::denied(msg))
    }

    /// Superuser, or the single permission.
    fn single(&self, op: &'static str, permission: &Permission, msg: &str) -> Result<()> {
        if self.actor.is_superuser() || self.actor.has(permission) {
            return self.allow(op);
        }
        self.deny(op, msg)
    }

    /// Superuser, or BOTH permissions, each checked on its own.
    fn both(&self, op: &'static str, a: &Permission, b: &Permission, msg: &str) -> Result<()> {
        if self.actor.is_superuser() || (self.actor.has(a) && self.actor.has(b)) {
            return self.allow(op);
        }
        self.deny(op, msg)
    }

    /// Owner/stranger tiering against one target row.
    ///
    /// Owners pass with either variant; strangers need the stranger one.
    fn tiered(
        &self,
        op: &'static str,
        created_by: Option<i64>,
        as_owner: &Permission,
        as_stranger: &Permission,
        what: &str,
    ) -> Result<()> {
        if self.actor.owns(created_by) {
            if self
                .actor
                .has_any(&[as_owner.clone(), as_stranger.clone()])
            {
                return self.allow(op);
            }
            return self.deny(op, &format!("{what} as an owner, missing permission"));
        }
        if self.actor.has(as_stranger) {
            return self.allow(op);
        }
        self.deny(op, &format!("{what} as a stranger, missing permission"))
    }

    /// Narrow a list query by owner.
    ///
    /// Stranger permission leaves the filter alone. Owner permission forces
    /// the filter onto the actor, unless it names somebody else.
    fn narrow(
        &self,
        op: &'static str,
        created_by: &mut Option<i64>,
        as_owner: &Permission,
        as_stranger: &Permission,
        what: &str,
    ) -> Result<()> {
        if self.actor.has(as_stranger) {
            return self.allow(op);
        }
        if self.actor.has(as_owner) && !self.actor.is_anonymous_local() {
            match *created_by {
                Some(owner) if owner != self.actor.id() => {
                    return self.deny(op, &format!("{what} as a stranger, missing permission"));
                }
                _ => {
                    *created_by = Some(self.actor.id());
                    debug!(actor_id = self.actor.id(), op, "narrowed to own rows");
                    return Ok(());
                }
            }
        }
        self.deny(op, &format!("{what}, missing permission"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_user(&self, req: &CreateUserRequest) -> Result<()> {
        const OP: &str = "create_user";
        let act = self.actor;

        if req.secure_password.is_some() && !act.is_superuser() {
            return self.deny(
                OP,
                "only superuser can create an user with manually defined secure password",
            );
        }
        if act.is_anonymous_local() || act.is_superuser() {
            return self.allow(OP);
        }
        if req.is_superuser == Some(true) {
            return self.deny(OP, "user is not allowed to create superuser");
        }
        if req.is_staff == Some(true) && !act.has(&USER_CAN_CREATE_STAFF) {
            return self.deny(OP, "user is not allowed to create staff user");
        }
        if !act.has_any(&[USER_CAN_CREATE_STAFF, USER_CAN_CREATE]) {
            return self.deny(OP, "user is not allowed to create another user");
        }
        self.allow(OP)
    }

    /// Entity-level rule: runs once the target row is loaded.
    pub fn modify_user(&self, req: &ModifyUserRequest, target: &User) -> Result<()> {
        const OP: &str = "modify_user";
        let act = self.actor;

        if act.is_self(target.id) && req.demotes(target.is_superuser, target.is_staff) {
            return self.deny(OP, "user is not permitted to demote himself");
        }
        if req.secure_password.is_some() && !act.is_superuser() {
            return self.deny(OP, "only superuser can set a secure password directly");
        }
        if act.is_superuser() {
            return self.allow(OP);
        }
        if target.is_superuser {
            return self.deny(OP, "only superuser can modify another superuser");
        }
        if req.is_superuser == Some(true) {
            return self.deny(
                OP,
                "only superuser can promote another user to become superuser",
            );
        }
        if target.is_staff {
            return self.tiered(
                OP,
                target.created_by,
                &USER_CAN_MODIFY_STAFF_AS_OWNER,
                &USER_CAN_MODIFY_STAFF_AS_STRANGER,
                "staff user cannot be modified",
            );
        }
        if req.is_staff == Some(true) && !act.has(&USER_CAN_CREATE_STAFF) {
            return self.deny(OP, "regular user cannot be promoted to staff, missing permission");
        }
        self.tiered(
            OP,
            target.created_by,
            &USER_CAN_MODIFY_AS_OWNER,
            &USER_CAN_MODIFY_AS_STRANGER,
            "user cannot be modified",
        )
    }

    pub fn delete_user(&self, target: &User) -> Result<()> {
        const OP: &str = "delete_user";
        let act = self.actor;

        if act.is_self(target.id) {
            return self.deny(OP, "user is not permitted to remove himself");
        }
        if act.is_superuser() {
            return self.allow(OP);
        }
        if target.is_superuser {
            return self.deny(OP, "only superuser can remove other superuser");
        }
        if target.is_staff {
            return self.tiered(
                OP,
                target.created_by,
                &USER_CAN_DELETE_STAFF_AS_OWNER,
                &USER_CAN_DELETE_STAFF_AS_STRANGER,
                "staff user cannot be removed",
            );
        }
        self.tiered(
            OP,
            target.created_by,
            &USER_CAN_DELETE_AS_OWNER,
            &USER_CAN_DELETE_AS_STRANGER,
            "user cannot be removed",
        )
    }

    pub fn get_user(&self, target: &User) -> Result<()> {
        const OP: &str = "get_user";
        let act = self.actor;

        if act.is_superuser() || act.is_self(target.id) {
            return self.allow(OP);
        }
        if target.is_superuser {
            return self.deny(OP, "only superuser is permitted to retrieve other superuser");
        }
        if target.is_staff {
            return self.tiered(
                OP,
                target.created_by,
                &USER_CAN_RETRIEVE_STAFF_AS_OWNER,
                &USER_CAN_RETRIEVE_STAFF_AS_STRANGER,
                "staff user cannot be retrieved",
            );
        }
        self.tiered(
            OP,
            target.created_by,
            &USER_CAN_RETRIEVE_AS_OWNER,
            &USER_CAN_RETRIEVE_AS_STRANGER,
            "user cannot be retrieved",
        )
    }

    /// Validate and narrow a user listing.
    ///
    /// Non-superusers never see superusers, and only see staff with the
    /// staff stranger permission unless they explicitly ask for staff.
    pub fn list_users(&self, query: &mut UserQuery) -> Result<()> {
        const OP: &str = "list_users";
        let act = self.actor;

        if act.is_superuser() {
            return self.allow(OP);
        }
        if query.is_superuser == Some(true) {
            return self.deny(OP, "only superuser is permitted to retrieve other superusers");
        }
        query.is_superuser = Some(false);

        if query.is_staff == Some(true) {
            return self.narrow(
                OP,
                &mut query.created_by,
                &USER_CAN_RETRIEVE_STAFF_AS_OWNER,
                &USER_CAN_RETRIEVE_STAFF_AS_STRANGER,
                "list of staff users cannot be retrieved",
            );
        }
        if !act.has(&USER_CAN_RETRIEVE_STAFF_AS_STRANGER) {
            query.is_staff = Some(false);
        }
        self.narrow(
            OP,
            &mut query.created_by,
            &USER_CAN_RETRIEVE_AS_OWNER,
            &USER_CAN_RETRIEVE_AS_STRANGER,
            "list of users cannot be retrieved",
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memberships and grants
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_granted(&self, user_id: i64) -> Result<()> {
        const OP: &str = "is_granted";
        if self.actor.is_self(user_id)
            || self.actor.is_superuser()
            || self.actor.has(&USER_PERMISSION_CAN_CHECK_GRANTING_AS_STRANGER)
        {
            return self.allow(OP);
        }
        self.deny(OP, "granting cannot be checked, missing permission")
    }

    pub fn belongs_to(&self, user_id: i64) -> Result<()> {
        const OP: &str = "belongs_to";
        if self.actor.is_self(user_id)
            || self.actor.is_superuser()
            || self.actor.has(&USER_GROUP_CAN_CHECK_BELONGING_AS_STRANGER)
        {
            return self.allow(OP);
        }
        self.deny(OP, "belonging cannot be checked, missing permission")
    }

    pub fn list_user_permissions(&self, user_id: i64) -> Result<()> {
        const OP: &str = "list_user_permissions";
        if self.actor.is_self(user_id) {
            return self.allow(OP);
        }
        self.single(
            OP,
            &USER_PERMISSION_CAN_RETRIEVE,
            "list of user permissions cannot be retrieved, missing permission",
        )
    }

    pub fn list_user_groups(&self, user_id: i64) -> Result<()> {
        const OP: &str = "list_user_groups";
        if self.actor.is_self(user_id) {
            return self.allow(OP);
        }
        self.single(
            OP,
            &USER_GROUP_CAN_RETRIEVE,
            "list of user groups cannot be retrieved, missing permission",
        )
    }

    pub fn list_group_permissions(&self) -> Result<()> {
        self.single(
            "list_group_permissions",
            &GROUP_PERMISSION_CAN_RETRIEVE,
            "list of group permissions cannot be retrieved, missing permission",
        )
    }

    pub fn set_user_permissions(&self) -> Result<()> {
        self.both(
            "set_user_permissions",
            &USER_PERMISSION_CAN_CREATE,
            &USER_PERMISSION_CAN_DELETE,
            "user permissions cannot be set, missing permission",
        )
    }

    pub fn set_user_groups(&self) -> Result<()> {
        self.both(
            "set_user_groups",
            &USER_GROUP_CAN_CREATE,
            &USER_GROUP_CAN_DELETE,
            "user groups cannot be set, missing permission",
        )
    }

    pub fn set_group_permissions(&self) -> Result<()> {
        self.both(
            "set_group_permissions",
            &GROUP_PERMISSION_CAN_CREATE,
            &GROUP_PERMISSION_CAN_DELETE,
            "group permissions cannot be set, missing permission",
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_group(&self) -> Result<()> {
        self.single(
            "create_group",
            &GROUP_CAN_CREATE,
            "group cannot be created, missing permission",
        )
    }

    pub fn get_group(&self) -> Result<()> {
        self.single(
            "get_group",
            &GROUP_CAN_RETRIEVE,
            "group cannot be retrieved, missing permission",
        )
    }

    pub fn list_groups(&self) -> Result<()> {
        self.single(
            "list_groups",
            &GROUP_CAN_RETRIEVE,
            "list of groups cannot be retrieved, missing permission",
        )
    }

    pub fn modify_group(&self) -> Result<()> {
        self.single(
            "modify_group",
            &GROUP_CAN_MODIFY,
            "group cannot be modified, missing permission",
        )
    }

    pub fn delete_group(&self) -> Result<()> {
        self.single(
            "delete_group",
            &GROUP_CAN_DELETE,
            "group cannot be removed, missing permission",
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Permissions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_permission(&self) -> Result<()> {
        self.single(
            "get_permission",
            &PERMISSION_CAN_RETRIEVE,
            "permission cannot be retrieved, missing permission",
        )
    }

    pub fn list_permissions(&self) -> Result<()> {
        self.single(
            "list_permissions",
            &PERMISSION_CAN_RETRIEVE,
            "list of permissions cannot be retrieved, missing permission",
        )
    }

    /// Registering a catalogue creates and deletes permission rows.
    pub fn register_permissions(&self) -> Result<()> {
        const OP: &str = "register_permissions";
        if self.actor.is_anonymous_local() {
            return self.allow(OP);
        }
        self.both(
            OP,
            &PERMISSION_CAN_CREATE,
            &PERMISSION_CAN_DELETE,
            "permissions cannot be registered, missing permission",
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh tokens
    // ─────────────────────────────────────────────────────────────────────────

    pub fn create_refresh_token(&self) -> Result<()> {
        const OP: &str = "create_refresh_token";
        if self.actor.is_anonymous_local() {
            return self.deny(OP, "refresh token cannot be created without a user");
        }
        self.single(
            OP,
            &REFRESH_TOKEN_CAN_CREATE,
            "refresh token cannot be created, missing permission",
        )
    }

    /// Owners without the stranger permission only see their own tokens.
    pub fn list_refresh_tokens(&self, query: &mut RefreshTokenQuery) -> Result<()> {
        const OP: &str = "list_refresh_tokens";
        if self.actor.is_superuser() {
            return self.allow(OP);
        }
        self.narrow(
            OP,
            &mut query.user_id,
            &REFRESH_TOKEN_CAN_RETRIEVE_AS_OWNER,
            &REFRESH_TOKEN_CAN_RETRIEVE_AS_STRANGER,
            "list of refresh tokens cannot be retrieved",
        )
    }

    pub fn revoke_refresh_token(&self, token: &RefreshToken) -> Result<()> {
        const OP: &str = "revoke_refresh_token";
        let act = self.actor;

        if act.is_superuser() || act.has(&REFRESH_TOKEN_CAN_REVOKE_AS_STRANGER) {
            return self.allow(OP);
        }
        if act.has(&REFRESH_TOKEN_CAN_REVOKE_AS_OWNER) {
            if act.is_self(token.user_id) {
                return self.allow(OP);
            }
            return self.deny(OP, "refresh token cannot be revoked by stranger, missing permission");
        }
        self.deny(OP, "refresh token cannot be revoked, missing permission")
    }
}

impl Actor {
    /// Policy evaluator for this actor.
    pub fn firewall(&self) -> Firewall<'_> {
        Firewall::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charon_core::Permissions;

    fn actor(id: i64, superuser: bool, permissions: &[Permission]) -> Actor {
        Actor::new(
            User {
                id,
                is_superuser: superuser,
                ..Default::default()
            },
            Permissions::from(permissions),
        )
    }

    fn target(id: i64, created_by: Option<i64>, staff: bool, superuser: bool) -> User {
        User {
            id,
            created_by,
            is_staff: staff,
            is_superuser: superuser,
            ..Default::default()
        }
    }

    fn denied(r: Result<()>) -> bool {
        matches!(r, Err(PolicyError::PermissionDenied(_)))
    }

    // ─── create_user ────────────────────────────────────────────────────────

    #[test]
    fn test_create_user_staff_only_permission() {
        let act = actor(1, false, &[USER_CAN_CREATE_STAFF]);
        let fw = act.firewall();

        let staff = CreateUserRequest {
            is_staff: Some(true),
            ..Default::default()
        };
        assert!(fw.create_user(&staff).is_ok());

        let superuser = CreateUserRequest {
            is_staff: Some(true),
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(denied(fw.create_user(&superuser)));
    }

    #[test]
    fn test_create_user_matrix() {
        let plain = CreateUserRequest::default();
        let staff = CreateUserRequest {
            is_staff: Some(true),
            ..Default::default()
        };
        let secure = CreateUserRequest {
            secure_password: Some(b"hash".to_vec()),
            ..Default::default()
        };

        let cases: Vec<(Actor, &CreateUserRequest, bool)> = vec![
            (actor(1, true, &[]), &plain, true),
            (actor(1, true, &[]), &secure, true),
            (Actor::local(), &plain, true),
            (Actor::local(), &secure, false),
            (actor(1, false, &[USER_CAN_CREATE]), &plain, true),
            (actor(1, false, &[USER_CAN_CREATE]), &staff, false),
            (actor(1, false, &[USER_CAN_CREATE]), &secure, false),
            (actor(1, false, &[]), &plain, false),
            (actor(1, false, &[USER_CAN_MODIFY_AS_OWNER]), &plain, false),
        ];

        for (i, (act, req, ok)) in cases.iter().enumerate() {
            assert_eq!(act.firewall().create_user(req).is_ok(), *ok, "case {}", i);
        }
    }

    #[test]
    fn test_local_flag_does_not_lift_a_real_user() {
        let mut act = actor(4, false, &[]);
        act.is_local = true;
        let fw = act.firewall();

        let superuser = CreateUserRequest {
            is_superuser: Some(true),
            ..Default::default()
        };
        let staff = CreateUserRequest {
            is_staff: Some(true),
            ..Default::default()
        };
        assert!(denied(fw.create_user(&superuser)));
        assert!(denied(fw.create_user(&staff)));
        assert!(denied(fw.create_user(&CreateUserRequest::default())));
        assert!(denied(fw.register_permissions()));
    }

    // ─── delete_user ────────────────────────────────────────────────────────

    #[test]
    fn test_delete_user_owner_vs_stranger() {
        let act = actor(10, false, &[USER_CAN_DELETE_AS_OWNER]);
        assert!(act.firewall().delete_user(&target(11, Some(10), false, false)).is_ok());
        assert!(denied(
            act.firewall().delete_user(&target(12, Some(99), false, false))
        ));
    }

    #[test]
    fn test_delete_self_always_denied() {
        for act in [
            actor(5, true, &[]),
            actor(5, false, &[USER_CAN_DELETE_AS_OWNER, USER_CAN_DELETE_AS_STRANGER]),
        ] {
            assert!(denied(
                act.firewall().delete_user(&target(5, Some(5), false, act.is_superuser()))
            ));
        }
    }

    #[test]
    fn test_delete_staff_needs_staff_variant() {
        let plain = actor(
            10,
            false,
            &[USER_CAN_DELETE_AS_OWNER, USER_CAN_DELETE_AS_STRANGER],
        );
        assert!(denied(
            plain.firewall().delete_user(&target(11, Some(10), true, false))
        ));
        assert!(denied(
            plain.firewall().delete_user(&target(11, Some(99), true, false))
        ));

        let owner = actor(10, false, &[USER_CAN_DELETE_STAFF_AS_OWNER]);
        assert!(owner.firewall().delete_user(&target(11, Some(10), true, false)).is_ok());
        assert!(denied(
            owner.firewall().delete_user(&target(11, Some(99), true, false))
        ));

        let stranger = actor(10, false, &[USER_CAN_DELETE_STAFF_AS_STRANGER]);
        assert!(stranger.firewall().delete_user(&target(11, Some(99), true, false)).is_ok());
        assert!(stranger.firewall().delete_user(&target(11, Some(10), true, false)).is_ok());
    }

    #[test]
    fn test_delete_superuser_target_needs_superuser() {
        let act = actor(
            10,
            false,
            &[USER_CAN_DELETE_AS_STRANGER, USER_CAN_DELETE_STAFF_AS_STRANGER],
        );
        assert!(denied(
            act.firewall().delete_user(&target(11, Some(10), false, true))
        ));
        assert!(actor(10, true, &[])
            .firewall()
            .delete_user(&target(11, None, false, true))
            .is_ok());
    }

    // ─── modify_user ────────────────────────────────────────────────────────

    #[test]
    fn test_modify_self_demotion_denied_for_superuser() {
        let act = actor(1, true, &[]);
        let me = target(1, None, true, true);

        let demote = ModifyUserRequest {
            id: 1,
            is_superuser: Some(false),
            ..Default::default()
        };
        assert!(denied(act.firewall().modify_user(&demote, &me)));

        let unstaff = ModifyUserRequest {
            id: 1,
            is_staff: Some(false),
            ..Default::default()
        };
        assert!(denied(act.firewall().modify_user(&unstaff, &me)));

        let rename = ModifyUserRequest {
            id: 1,
            first_name: Some("Root".into()),
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(act.firewall().modify_user(&rename, &me).is_ok());
    }

    #[test]
    fn test_modify_promotion_bans() {
        let act = actor(
            10,
            false,
            &[USER_CAN_MODIFY_AS_STRANGER, USER_CAN_MODIFY_STAFF_AS_STRANGER],
        );
        let regular = target(11, None, false, false);

        let promote = ModifyUserRequest {
            id: 11,
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(denied(act.firewall().modify_user(&promote, &regular)));

        let staff = ModifyUserRequest {
            id: 11,
            is_staff: Some(true),
            ..Default::default()
        };
        assert!(denied(act.firewall().modify_user(&staff, &regular)));

        let with_staff = actor(10, false, &[USER_CAN_MODIFY_AS_STRANGER, USER_CAN_CREATE_STAFF]);
        assert!(with_staff.firewall().modify_user(&staff, &regular).is_ok());

        assert!(denied(act.firewall().modify_user(
            &ModifyUserRequest::default(),
            &target(11, Some(10), false, true)
        )));
    }

    #[test]
    fn test_modify_tiering() {
        let req = ModifyUserRequest::default();
        let owner = actor(10, false, &[USER_CAN_MODIFY_AS_OWNER]);
        assert!(owner.firewall().modify_user(&req, &target(11, Some(10), false, false)).is_ok());
        assert!(denied(
            owner.firewall().modify_user(&req, &target(11, Some(9), false, false))
        ));
        assert!(denied(
            owner.firewall().modify_user(&req, &target(11, Some(10), true, false))
        ));

        let staff_owner = actor(10, false, &[USER_CAN_MODIFY_STAFF_AS_OWNER]);
        assert!(staff_owner
            .firewall()
            .modify_user(&req, &target(11, Some(10), true, false))
            .is_ok());
    }

    #[test]
    fn test_modify_secure_password_superuser_only() {
        let req = ModifyUserRequest {
            id: 11,
            secure_password: Some(b"hash".to_vec()),
            ..Default::default()
        };
        let act = actor(10, false, &[USER_CAN_MODIFY_AS_STRANGER]);
        assert!(denied(
            act.firewall().modify_user(&req, &target(11, None, false, false))
        ));
        assert!(actor(1, true, &[])
            .firewall()
            .modify_user(&req, &target(11, None, false, false))
            .is_ok());
    }

    // ─── get_user ───────────────────────────────────────────────────────────

    #[test]
    fn test_get_user_self_shortcut() {
        let act = actor(7, false, &[]);
        assert!(act.firewall().get_user(&target(7, None, true, false)).is_ok());
        assert!(denied(act.firewall().get_user(&target(8, Some(7), false, false))));
    }

    #[test]
    fn test_get_user_tiering() {
        let act = actor(7, false, &[USER_CAN_RETRIEVE_AS_OWNER]);
        assert!(act.firewall().get_user(&target(8, Some(7), false, false)).is_ok());
        assert!(denied(act.firewall().get_user(&target(8, Some(1), false, false))));
        assert!(denied(act.firewall().get_user(&target(8, Some(7), true, false))));
        assert!(denied(act.firewall().get_user(&target(8, Some(7), false, true))));
    }

    // ─── list_users ─────────────────────────────────────────────────────────

    #[test]
    fn test_list_users_owner_narrowing() {
        let act = actor(7, false, &[USER_CAN_RETRIEVE_AS_OWNER]);
        let mut query = UserQuery::default();
        act.firewall().list_users(&mut query).unwrap();

        assert_eq!(query.created_by, Some(7));
        assert_eq!(query.is_superuser, Some(false));
        assert_eq!(query.is_staff, Some(false));
    }

    #[test]
    fn test_list_users_stranger_untouched() {
        let act = actor(
            7,
            false,
            &[USER_CAN_RETRIEVE_AS_STRANGER, USER_CAN_RETRIEVE_STAFF_AS_STRANGER],
        );
        let mut query = UserQuery {
            created_by: Some(3),
            ..Default::default()
        };
        act.firewall().list_users(&mut query).unwrap();

        assert_eq!(query.created_by, Some(3));
        assert_eq!(query.is_staff, None);
        assert_eq!(query.is_superuser, Some(false));
    }

    #[test]
    fn test_list_users_rejects() {
        let owner = actor(7, false, &[USER_CAN_RETRIEVE_AS_OWNER]);

        let mut superusers = UserQuery {
            is_superuser: Some(true),
            ..Default::default()
        };
        assert!(denied(owner.firewall().list_users(&mut superusers)));

        let mut foreign = UserQuery {
            created_by: Some(3),
            ..Default::default()
        };
        assert!(denied(owner.firewall().list_users(&mut foreign)));

        let mut staff = UserQuery {
            is_staff: Some(true),
            ..Default::default()
        };
        assert!(denied(owner.firewall().list_users(&mut staff)));

        let mut anything = UserQuery::default();
        assert!(denied(actor(7, false, &[]).firewall().list_users(&mut anything)));
    }

    #[test]
    fn test_list_users_superuser_unrestricted() {
        let mut query = UserQuery {
            is_superuser: Some(true),
            ..Default::default()
        };
        actor(1, true, &[]).firewall().list_users(&mut query).unwrap();
        assert_eq!(query, UserQuery {
            is_superuser: Some(true),
            ..Default::default()
        });
    }

    // ─── memberships and grants ─────────────────────────────────────────────

    #[test]
    fn test_self_reference_shortcuts() {
        let act = actor(4, false, &[]);
        let fw = act.firewall();
        assert!(fw.is_granted(4).is_ok());
        assert!(fw.belongs_to(4).is_ok());
        assert!(fw.list_user_permissions(4).is_ok());
        assert!(fw.list_user_groups(4).is_ok());

        assert!(denied(fw.is_granted(5)));
        assert!(denied(fw.belongs_to(5)));
        assert!(denied(fw.list_user_permissions(5)));
        assert!(denied(fw.list_user_groups(5)));
    }

    /// The set rules need both permissions; one of the two is not enough.
    #[test]
    fn test_set_rules_require_both_permissions() {
        let cases = [
            ("user_permissions", USER_PERMISSION_CAN_CREATE, USER_PERMISSION_CAN_DELETE),
            ("user_groups", USER_GROUP_CAN_CREATE, USER_GROUP_CAN_DELETE),
            ("group_permissions", GROUP_PERMISSION_CAN_CREATE, GROUP_PERMISSION_CAN_DELETE),
        ];
        let rule = |name: &str, act: &Actor| match name {
            "user_permissions" => act.firewall().set_user_permissions(),
            "user_groups" => act.firewall().set_user_groups(),
            _ => act.firewall().set_group_permissions(),
        };

        for (name, create, delete) in cases {
            let only_create = actor(2, false, &[create.clone()]);
            let only_delete = actor(2, false, &[delete.clone()]);
            let both = actor(2, false, &[delete, create]);

            assert!(denied(rule(name, &only_create)), "{}", name);
            assert!(denied(rule(name, &only_delete)), "{}", name);
            assert!(rule(name, &both).is_ok(), "{}", name);
            assert!(rule(name, &actor(1, true, &[])).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_group_rules_single_permission() {
        let act = actor(2, false, &[GROUP_CAN_RETRIEVE]);
        let fw = act.firewall();
        assert!(fw.get_group().is_ok());
        assert!(fw.list_groups().is_ok());
        assert!(denied(fw.create_group()));
        assert!(denied(fw.modify_group()));
        assert!(denied(fw.delete_group()));
    }

    #[test]
    fn test_register_permissions() {
        assert!(Actor::local().firewall().register_permissions().is_ok());
        assert!(denied(
            actor(2, false, &[PERMISSION_CAN_CREATE]).firewall().register_permissions()
        ));
        assert!(actor(2, false, &[PERMISSION_CAN_CREATE, PERMISSION_CAN_DELETE])
            .firewall()
            .register_permissions()
            .is_ok());
    }

    // ─── refresh tokens ─────────────────────────────────────────────────────

    fn token(user_id: i64) -> RefreshToken {
        RefreshToken {
            token: "t".into(),
            user_id,
            notes: None,
            expire_at: None,
            revoked: false,
            last_used_at: None,
            created_at: 0,
            created_by: Some(user_id),
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn test_list_refresh_tokens_narrowing() {
        let owner = actor(3, false, &[REFRESH_TOKEN_CAN_RETRIEVE_AS_OWNER]);
        let mut query = RefreshTokenQuery::default();
        owner.firewall().list_refresh_tokens(&mut query).unwrap();
        assert_eq!(query.user_id, Some(3));

        let mut foreign = RefreshTokenQuery {
            user_id: Some(9),
            ..Default::default()
        };
        assert!(denied(owner.firewall().list_refresh_tokens(&mut foreign)));
        assert_eq!(foreign.user_id, Some(9));

        let stranger = actor(3, false, &[REFRESH_TOKEN_CAN_RETRIEVE_AS_STRANGER]);
        let mut query = RefreshTokenQuery::default();
        stranger.firewall().list_refresh_tokens(&mut query).unwrap();
        assert_eq!(query.user_id, None);

        let mut query = RefreshTokenQuery::default();
        assert!(denied(actor(3, false, &[]).firewall().list_refresh_tokens(&mut query)));
    }

    #[test]
    fn test_revoke_refresh_token() {
        let owner = actor(3, false, &[REFRESH_TOKEN_CAN_REVOKE_AS_OWNER]);
        assert!(owner.firewall().revoke_refresh_token(&token(3)).is_ok());
        assert!(denied(owner.firewall().revoke_refresh_token(&token(4))));

        let stranger = actor(3, false, &[REFRESH_TOKEN_CAN_REVOKE_AS_STRANGER]);
        assert!(stranger.firewall().revoke_refresh_token(&token(4)).is_ok());

        assert!(denied(actor(3, false, &[]).firewall().revoke_refresh_token(&token(3))));
    }

    #[test]
    fn test_create_refresh_token() {
        assert!(actor(3, false, &[REFRESH_TOKEN_CAN_CREATE])
            .firewall()
            .create_refresh_token()
            .is_ok());
        assert!(denied(actor(3, false, &[]).firewall().create_refresh_token()));
        assert!(denied(Actor::local().firewall().create_refresh_token()));
    }
}
