//! # Charon Core
//!
//! Pure primitives for Charon: the permission algebra, the compiled-in
//! permission catalogue, session subject identifiers, entity records and
//! the request/query shapes the policy engine reads.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Permission`] - A `subsystem:module:action` triple
//! - [`Permissions`] - Ordered collection with any-of membership checks
//! - [`SubjectId`] - The `charon:user:<id>` identifier bound to sessions
//! - [`User`], [`Group`], [`RefreshToken`] - Readable entity shapes
//!
//! ## Permission checks
//!
//! [`Permissions::contains`] is true when ANY of the given permissions is
//! held:
//!
//! ```rust
//! use charon_core::{catalogue, Permissions};
//!
//! let held = Permissions::from(vec![catalogue::USER_CAN_CREATE]);
//! assert!(held.contains(&[catalogue::USER_CAN_CREATE_STAFF, catalogue::USER_CAN_CREATE]));
//! assert!(!held.contains(&[catalogue::USER_CAN_CREATE_STAFF]));
//! ```

pub mod catalogue;
pub mod error;
pub mod model;
pub mod permission;
pub mod query;
pub mod request;
pub mod subject;
pub mod token;

pub use error::{CoreError, Result};
pub use model::{
    Group, GroupPatch, NewGroup, NewRefreshToken, NewUser, PermissionRecord, RefreshToken,
    SetResult, User, UserPatch,
};
pub use permission::{Permission, Permissions};
pub use query::{GroupQuery, Page, PermissionQuery, RefreshTokenQuery, SortOrder, UserQuery};
pub use subject::SubjectId;
pub use token::generate_refresh_token;

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
