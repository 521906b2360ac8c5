//! # Charon Session
//!
//! The session side of Charon: the [`SessionStore`] collaborator contract,
//! the [`Session`] record, and the per-call [`CallContext`] carrying the
//! session token, the local-trust flag, a deadline and a cancellation
//! token.
//!
//! ## Key Types
//!
//! - [`SessionStore`] - Start, look up, delete and abandon sessions
//! - [`MemorySessionStore`] - In-memory sessions for tests and single-node use
//! - [`CallContext`] - What the transport edge knows about one call
//! - [`Interrupt`] - Cancellation or deadline, surfaced by [`CallContext::run`]

pub mod context;
pub mod error;
pub mod memory;
pub mod traits;

pub use context::CallContext;
pub use error::{Interrupt, Result, SessionError};
pub use memory::MemorySessionStore;
pub use traits::{Session, SessionStore, StartSession};

pub use tokio_util::sync::CancellationToken;
