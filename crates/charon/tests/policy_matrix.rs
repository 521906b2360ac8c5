//! Table-driven authorization checks through the service.
//!
//! Every row seeds a fresh fixture, so rows cannot leak state into each
//! other.

use charon::core::{catalogue, Permission};
use charon::{Code, CreateGroupRequest, ModifyUserRequest};
use charon_testkit::{TestFixture, UserSpec};

/// Who the target user is relative to the actor.
#[derive(Debug, Clone, Copy)]
enum Target {
    Mine,
    Theirs,
    MyStaff,
    TheirStaff,
    Root,
}

struct Row<'a> {
    perms: &'a [Permission],
    target: Target,
    allowed: bool,
}

async fn seed_target(fx: &TestFixture, actor_id: i64, stranger_id: i64, target: Target) -> i64 {
    let spec = match target {
        Target::Mine => UserSpec::new("target").created_by(actor_id),
        Target::Theirs => UserSpec::new("target").created_by(stranger_id),
        Target::MyStaff => UserSpec::new("target").staff().created_by(actor_id),
        Target::TheirStaff => UserSpec::new("target").staff().created_by(stranger_id),
        Target::Root => UserSpec::new("target").superuser(),
    };
    fx.seed(spec).await.id()
}

fn expect(result: Result<(), Code>, allowed: bool, what: String) {
    match (result, allowed) {
        (Ok(()), true) => {}
        (Err(Code::PermissionDenied), false) => {}
        (other, _) => panic!("{what}: expected allowed={allowed}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_user_matrix() {
    use catalogue::*;

    let rows = [
        Row { perms: &[], target: Target::Mine, allowed: false },
        Row { perms: &[USER_CAN_RETRIEVE_AS_OWNER], target: Target::Mine, allowed: true },
        Row { perms: &[USER_CAN_RETRIEVE_AS_OWNER], target: Target::Theirs, allowed: false },
        Row { perms: &[USER_CAN_RETRIEVE_AS_STRANGER], target: Target::Theirs, allowed: true },
        Row { perms: &[USER_CAN_RETRIEVE_AS_STRANGER], target: Target::Mine, allowed: true },
        Row { perms: &[USER_CAN_RETRIEVE_AS_OWNER], target: Target::MyStaff, allowed: false },
        Row { perms: &[USER_CAN_RETRIEVE_STAFF_AS_OWNER], target: Target::MyStaff, allowed: true },
        Row { perms: &[USER_CAN_RETRIEVE_STAFF_AS_OWNER], target: Target::TheirStaff, allowed: false },
        Row { perms: &[USER_CAN_RETRIEVE_STAFF_AS_STRANGER], target: Target::TheirStaff, allowed: true },
        Row { perms: &[USER_CAN_RETRIEVE_STAFF_AS_STRANGER], target: Target::Root, allowed: false },
    ];

    for (i, row) in rows.iter().enumerate() {
        let fx = TestFixture::new().await;
        let actor = fx.seed(UserSpec::new("actor").permissions(row.perms)).await;
        let stranger = fx.seed(UserSpec::new("stranger")).await;
        let target = seed_target(&fx, actor.id(), stranger.id(), row.target).await;

        let result = fx
            .service
            .get_user(&actor.ctx, target)
            .await
            .map(|_| ())
            .map_err(|e| e.code());
        expect(result, row.allowed, format!("row {i} {:?}", row.target));
    }
}

#[tokio::test]
async fn test_modify_user_matrix() {
    use catalogue::*;

    let rows = [
        Row { perms: &[], target: Target::Mine, allowed: false },
        Row { perms: &[USER_CAN_MODIFY_AS_OWNER], target: Target::Mine, allowed: true },
        Row { perms: &[USER_CAN_MODIFY_AS_OWNER], target: Target::Theirs, allowed: false },
        Row { perms: &[USER_CAN_MODIFY_AS_STRANGER], target: Target::Theirs, allowed: true },
        Row { perms: &[USER_CAN_MODIFY_AS_STRANGER], target: Target::TheirStaff, allowed: false },
        Row { perms: &[USER_CAN_MODIFY_STAFF_AS_OWNER], target: Target::MyStaff, allowed: true },
        Row { perms: &[USER_CAN_MODIFY_STAFF_AS_STRANGER], target: Target::TheirStaff, allowed: true },
        Row { perms: &[USER_CAN_MODIFY_STAFF_AS_STRANGER], target: Target::Root, allowed: false },
    ];

    for (i, row) in rows.iter().enumerate() {
        let fx = TestFixture::new().await;
        let actor = fx.seed(UserSpec::new("actor").permissions(row.perms)).await;
        let stranger = fx.seed(UserSpec::new("stranger")).await;
        let target = seed_target(&fx, actor.id(), stranger.id(), row.target).await;

        let req = ModifyUserRequest {
            id: target,
            first_name: Some("Renamed".into()),
            ..Default::default()
        };
        let result = fx
            .service
            .modify_user(&actor.ctx, req)
            .await
            .map(|_| ())
            .map_err(|e| e.code());
        expect(result, row.allowed, format!("row {i} {:?}", row.target));
    }
}

#[tokio::test]
async fn test_promotion_requires_create_staff() {
    let fx = TestFixture::new().await;
    let modifier = fx
        .seed(UserSpec::new("modifier").permissions(&[catalogue::USER_CAN_MODIFY_AS_STRANGER]))
        .await;
    let target = fx.seed(UserSpec::new("target")).await;

    let promote = ModifyUserRequest {
        id: target.id(),
        is_staff: Some(true),
        ..Default::default()
    };
    let err = fx
        .service
        .modify_user(&modifier.ctx, promote.clone())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);

    let promoter = fx
        .seed(UserSpec::new("promoter").permissions(&[
            catalogue::USER_CAN_MODIFY_AS_STRANGER,
            catalogue::USER_CAN_CREATE_STAFF,
        ]))
        .await;
    let user = fx.service.modify_user(&promoter.ctx, promote).await.unwrap();
    assert!(user.is_staff);
    assert_eq!(user.updated_by, Some(promoter.id()));

    let crown = ModifyUserRequest {
        id: target.id(),
        is_superuser: Some(true),
        ..Default::default()
    };
    let err = fx.service.modify_user(&promoter.ctx, crown).await.unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_group_operations_need_their_permission() {
    let fx = TestFixture::new().await;
    let nobody = fx.seed(UserSpec::new("nobody")).await;
    let creator = fx
        .seed(UserSpec::new("creator").permissions(&[catalogue::GROUP_CAN_CREATE]))
        .await;

    let req = CreateGroupRequest {
        name: "ops".into(),
        description: None,
    };
    let err = fx
        .service
        .create_group(&nobody.ctx, req.clone())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);

    let group = fx.service.create_group(&creator.ctx, req).await.unwrap();

    let err = fx.service.get_group(&creator.ctx, group.id).await.unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);

    let err = fx
        .service
        .delete_group(&creator.ctx, group.id)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_unknown_session_is_unauthenticated() {
    let fx = TestFixture::new().await;
    let ctx = charon::CallContext::new().with_token("no-such-session");

    let err = fx.service.get_user(&ctx, 1).await.unwrap_err();
    assert_eq!(err.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_session_of_deleted_user_is_denied() {
    let fx = TestFixture::new().await;
    let root = fx.seed(UserSpec::new("root").superuser()).await;
    let ghost = fx.seed(UserSpec::new("ghost")).await;

    fx.service.delete_user(&root.ctx, ghost.id()).await.unwrap();

    let err = fx.service.get_user(&ghost.ctx, root.id()).await.unwrap_err();
    assert_eq!(err.code(), Code::PermissionDenied);
}
