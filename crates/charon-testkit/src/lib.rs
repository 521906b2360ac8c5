//! # Charon Testkit
//!
//! Testing utilities for Charon.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a started [`TestFixture`] that seeds users with
//!   permissions and live sessions
//! - **Generators**: Proptest strategies for permissions and catalogues
//! - **Doubles**: a reversible password hasher and session stores that
//!   record, delay or fail
//!
//! ## Test Fixtures
//!
//! ```rust
//! use charon::core::catalogue;
//! use charon_testkit::{TestFixture, UserSpec};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let fx = TestFixture::new().await;
//! let alice = fx
//!     .seed(UserSpec::new("alice").permissions(&[catalogue::GROUP_CAN_CREATE]))
//!     .await;
//!
//! let actor = fx.service.actor(&alice.ctx, None).await.unwrap();
//! assert!(actor.has(&catalogue::GROUP_CAN_CREATE));
//! # });
//! # }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use charon_testkit::generators::permission;
//!
//! proptest! {
//!     #[test]
//!     fn permission_round_trips(p in permission()) {
//!         prop_assert_eq!(Permission::parse(&p.to_string()).unwrap(), p);
//!     }
//! }
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;
pub mod hasher;

pub use doubles::{FailingSessionStore, RecordingSessionStore};
pub use fixtures::{Seeded, TestFixture, TestService, UserSpec, PASSWORD};
pub use hasher::{FailingHasher, PlainHasher};
