//! Collaborator failures surface through the service with the right code.

use charon::core::{NewUser, SubjectId};
use charon::session::{MemorySessionStore, SessionStore, StartSession};
use charon::store::{MemoryStore, Store};
use charon::{CallContext, Code, CreateUserRequest, ModifyUserRequest, Service, ServiceConfig};
use charon_testkit::{FailingHasher, FailingSessionStore, PlainHasher, PASSWORD};

async fn signed_in_superuser(store: &MemoryStore, sessions: &MemorySessionStore) -> (i64, CallContext) {
    let user = store
        .create_user(NewUser {
            username: "root".into(),
            is_superuser: true,
            is_active: true,
            is_confirmed: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let session = sessions
        .start_session(StartSession::new(SubjectId::from_user_id(user.id), "test"))
        .await
        .unwrap();
    (user.id, CallContext::new().with_token(session.token))
}

#[tokio::test]
async fn test_hasher_failure_is_internal_on_create() {
    let service = Service::new(
        MemoryStore::new(),
        MemorySessionStore::new(),
        FailingHasher,
        ServiceConfig::default(),
    );

    let req = CreateUserRequest {
        username: "root".into(),
        plain_password: PASSWORD.into(),
        is_superuser: Some(true),
        ..Default::default()
    };
    let err = service
        .create_user(&CallContext::new().local(), req)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::Internal);
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(service.store().count_users().await.unwrap(), 0);
}

#[tokio::test]
async fn test_hasher_failure_is_internal_on_modify() {
    let service = Service::new(
        MemoryStore::new(),
        MemorySessionStore::new(),
        FailingHasher,
        ServiceConfig::default(),
    );
    let (root_id, ctx) = signed_in_superuser(service.store(), service.sessions()).await;

    let req = ModifyUserRequest {
        id: root_id,
        plain_password: Some(PASSWORD.into()),
        ..Default::default()
    };
    let err = service.modify_user(&ctx, req).await.unwrap_err();
    assert_eq!(err.code(), Code::Internal);

    // Changes that need no hashing still go through.
    let rename = ModifyUserRequest {
        id: root_id,
        first_name: Some("Ada".into()),
        ..Default::default()
    };
    let user = service.modify_user(&ctx, rename).await.unwrap();
    assert_eq!(user.first_name, "Ada");
}

#[tokio::test]
async fn test_session_store_failures_through_service() {
    let cases = [
        (FailingSessionStore::Backend, Code::Internal),
        (FailingSessionStore::Canceled, Code::Canceled),
        (FailingSessionStore::DeadlineExceeded, Code::DeadlineExceeded),
    ];

    for (sessions, code) in cases {
        let service = Service::new(
            MemoryStore::new(),
            sessions,
            PlainHasher,
            ServiceConfig::default(),
        );
        service.init().await.unwrap();

        let ctx = CallContext::new().with_token("any").local();
        let err = service.get_user(&ctx, 1).await.unwrap_err();
        assert_eq!(err.code(), code, "{sessions:?} on get_user");

        let err = service.logout(&ctx).await.unwrap_err();
        assert_eq!(err.code(), code, "{sessions:?} on logout");
    }
}
