//! # Charon Store
//!
//! Storage abstraction for Charon. Provides a trait-based interface for
//! users, groups, permissions and refresh tokens with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The store module abstracts persistence behind the [`Store`] trait,
//! allowing the service to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`StoreExt`] - Lookups that turn absence into `NotFound`
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`PermissionChanges`] - Counts from a registry reconciliation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use charon_core::{NewUser, Permission};
//! use charon_store::{SqliteStore, Store};
//!
//! async fn example() -> charon_store::Result<()> {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("charon.db")?;
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory()?;
//!
//!     let user = store
//!         .create_user(NewUser {
//!             username: "root".into(),
//!             is_superuser: true,
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     let perm = Permission::new("svc", "report", "can read").unwrap();
//!     store.apply_permission_changes("svc", &[perm.clone()], &[]).await?;
//!     assert!(!store.is_granted(user.id, &perm).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic reconciliation**: `apply_permission_changes` inserts and
//!   deletes in one transaction, scoped to a single subsystem
//! - **Effective permissions**: direct grants plus group grants
//! - **Dependents**: users and groups with grants or memberships cannot be
//!   deleted

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{PermissionChanges, Store, StoreExt};
