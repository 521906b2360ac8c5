//! # Charon Policy
//!
//! Who may do what. Given an [`Actor`] and a request, the [`Firewall`]
//! decides whether the operation proceeds, is denied, or proceeds with a
//! narrowed query.
//!
//! ## Overview
//!
//! Rules are plain functions of the actor, the request and (for
//! entity-level rules) the target row. They never touch storage, so every
//! rule is unit-testable in isolation.
//!
//! Three ideas recur across the rules:
//!
//! - **Superuser** passes almost everything
//! - **Owner vs stranger**: rows remember `created_by`; acting on your own
//!   rows needs the `as owner` permission, anything else the `as stranger`
//!   one
//! - **Self protection**: nobody deletes or demotes themselves
//!
//! ## Key Types
//!
//! - [`Actor`] - The resolved principal of a call
//! - [`Firewall`] - One method per administrative operation
//! - [`PolicyError`] - Denials
//!
//! ## Usage
//!
//! ```rust
//! use charon_core::{catalogue, Permissions, User, UserQuery};
//! use charon_policy::Actor;
//!
//! let actor = Actor::new(
//!     User { id: 7, ..Default::default() },
//!     Permissions::from(vec![catalogue::USER_CAN_RETRIEVE_AS_OWNER]),
//! );
//!
//! let mut query = UserQuery::default();
//! actor.firewall().list_users(&mut query).unwrap();
//!
//! // Only users created by the actor, never superusers or staff.
//! assert_eq!(query.created_by, Some(7));
//! assert_eq!(query.is_superuser, Some(false));
//! ```

pub mod actor;
pub mod error;
pub mod firewall;

pub use actor::Actor;
pub use error::{PolicyError, Result};
pub use firewall::Firewall;
