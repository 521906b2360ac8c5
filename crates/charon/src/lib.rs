//! # Charon
//!
//! Authorization and identity service: users, groups, permissions, sessions
//! and the policy that decides who may manage them.
//!
//! ## Overview
//!
//! Every operation of the [`Service`] walks the same path:
//!
//! 1. The transport edge builds a [`CallContext`] (session token, local
//!    trust flag, deadline, cancellation token)
//! 2. The [`ActorResolver`] turns the session into an [`Actor`]
//! 3. The actor's [`Firewall`](charon_policy::Firewall) allows, denies or
//!    narrows the request
//! 4. Storage does the work; failures come back as a classified [`Status`]
//!
//! The [`PermissionRegistry`] keeps each subsystem's stored permissions in
//! line with its declared catalogue. Charon registers its own catalogue on
//! [`Service::init`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use charon::{CreateUserRequest, Service, ServiceConfig};
//! use charon::hasher::{HashError, PasswordHasher};
//! use charon::session::{CallContext, MemorySessionStore};
//! use charon::store::SqliteStore;
//!
//! struct MyHasher;
//!
//! impl PasswordHasher for MyHasher {
//!     fn hash(&self, plain: &[u8]) -> Result<Vec<u8>, HashError> {
//!         // Plug a real algorithm in here.
//!         Ok(plain.to_vec())
//!     }
//!
//!     fn compare(&self, digest: &[u8], plain: &[u8]) -> bool {
//!         digest == plain
//!     }
//! }
//!
//! async fn example() -> charon::Result<()> {
//!     let store = SqliteStore::open("charon.db").unwrap();
//!     let service = Service::new(store, MemorySessionStore::new(), MyHasher, ServiceConfig::default());
//!     service.init().await?;
//!
//!     // Bootstrap the first superuser from a local operator tool.
//!     let ctx = CallContext::new().local();
//!     let root = service
//!         .create_user(&ctx, CreateUserRequest {
//!             username: "root".into(),
//!             plain_password: "correct horse".into(),
//!             is_superuser: Some(true),
//!             is_active: Some(true),
//!             is_confirmed: Some(true),
//!             ..Default::default()
//!         })
//!         .await?;
//!     assert!(root.is_superuser);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `charon::core` - Permission algebra, catalogue, entities, requests
//! - `charon::store` - Storage trait, SQLite and in-memory stores
//! - `charon::session` - Session store trait, call context
//! - `charon::policy` - Actor and firewall

pub mod config;
pub mod hasher;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod status;

// Re-export component crates
pub use charon_core as core;
pub use charon_policy as policy;
pub use charon_session as session;
pub use charon_store as store;

// Re-export main types for convenience
pub use config::{ConfigError, ServiceConfig};
pub use hasher::{HashError, PasswordHasher};
pub use registry::{PermissionRegistry, Registration};
pub use resolver::ActorResolver;
pub use service::Service;
pub use status::{Code, Result, Status};

// Re-export the request records and the types every caller touches
pub use charon_core::request::*;
pub use charon_policy::Actor;
pub use charon_session::CallContext;
