//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use charon::hasher::PasswordHasher;
use charon::{Service, ServiceConfig};
use charon_core::{NewUser, Permission, Permissions, SubjectId, User};
use charon_session::{CallContext, SessionStore, StartSession};
use charon_store::{MemoryStore, SqliteStore, Store};

use crate::doubles::RecordingSessionStore;
use crate::hasher::PlainHasher;

/// Password every seeded user logs in with.
pub const PASSWORD: &str = "correct horse battery";

/// Service wired with test collaborators.
pub type TestService<S = MemoryStore> = Service<S, RecordingSessionStore, PlainHasher>;

/// A started service plus helpers to seed users and sessions.
pub struct TestFixture<S: Store = MemoryStore> {
    pub service: TestService<S>,
}

impl TestFixture<MemoryStore> {
    /// Service over an in-memory store, catalogue registered.
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }
}

impl TestFixture<SqliteStore> {
    /// Service over an in-memory SQLite database, catalogue registered.
    pub async fn sqlite() -> Self {
        Self::with_store(SqliteStore::open_memory().expect("open sqlite")).await
    }
}

impl<S: Store> TestFixture<S> {
    pub async fn with_store(store: S) -> Self {
        Self::with_config(store, ServiceConfig::default()).await
    }

    pub async fn with_config(store: S, config: ServiceConfig) -> Self {
        Self::with_sessions(store, RecordingSessionStore::new(), config).await
    }

    pub async fn with_sessions(
        store: S,
        sessions: RecordingSessionStore,
        config: ServiceConfig,
    ) -> Self {
        let service = Service::new(store, sessions, PlainHasher, config);
        service.init().await.expect("register catalogue");
        Self { service }
    }

    pub fn store(&self) -> &S {
        self.service.store()
    }

    pub fn sessions(&self) -> &RecordingSessionStore {
        self.service.sessions()
    }

    /// Context of a local trusted caller without a session.
    pub fn local(&self) -> CallContext {
        CallContext::new().local()
    }

    /// Insert a user directly into storage, grant its permissions and log
    /// it in.
    pub async fn seed(&self, spec: UserSpec) -> Seeded {
        let user = self
            .store()
            .create_user(NewUser {
                username: spec.username,
                password: PlainHasher.hash(PASSWORD.as_bytes()).expect("hash"),
                is_superuser: spec.superuser,
                is_staff: spec.staff,
                is_active: true,
                is_confirmed: true,
                created_by: spec.created_by,
                ..Default::default()
            })
            .await
            .expect("seed user");

        if !spec.permissions.is_empty() {
            let permissions = Permissions::from(spec.permissions);
            self.store()
                .insert_missing_permissions(&permissions)
                .await
                .expect("insert permissions");
            self.store()
                .set_user_permissions(user.id, &permissions)
                .await
                .expect("grant permissions");
        }

        let ctx = self.login(user.id).await;
        Seeded { user, ctx }
    }

    /// Start a session for `user_id` directly in the session store.
    pub async fn login(&self, user_id: i64) -> CallContext {
        let session = self
            .sessions()
            .start_session(StartSession::new(SubjectId::from_user_id(user_id), "testkit"))
            .await
            .expect("start session");
        CallContext::new().with_token(session.token)
    }
}

/// What to seed.
#[derive(Debug, Clone)]
pub struct UserSpec {
    pub username: String,
    pub superuser: bool,
    pub staff: bool,
    pub created_by: Option<i64>,
    pub permissions: Vec<Permission>,
}

impl UserSpec {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            superuser: false,
            staff: false,
            created_by: None,
            permissions: Vec::new(),
        }
    }

    pub fn superuser(mut self) -> Self {
        self.superuser = true;
        self
    }

    pub fn staff(mut self) -> Self {
        self.staff = true;
        self
    }

    pub fn created_by(mut self, user_id: i64) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn permissions(mut self, permissions: &[Permission]) -> Self {
        self.permissions.extend_from_slice(permissions);
        self
    }
}

/// A seeded user and a context carrying its session.
#[derive(Debug, Clone)]
pub struct Seeded {
    pub user: User,
    pub ctx: CallContext,
}

impl Seeded {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}
