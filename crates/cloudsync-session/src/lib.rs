//! CloudSync Session - Event-driven sync engine
//!
//! Provides:
//! - A single-writer actor owning the sync state
//! - An ordered middleware chain with bounded nested dispatch
//! - Retry with quadratic backoff, batch splitting and conflict resolution
//! - Broadcast channels for outcomes and a watch channel for state
//!
//! ## Modules
//!
//! - [`dispatcher`] - [`Middleware`] trait, dispatch context and continuation
//! - [`middleware`] - The stages of the chain
//! - [`session`] - [`CloudSyncSession`] and its builder

mod actor;
pub mod dispatcher;
pub mod middleware;
pub mod session;

use thiserror::Error;

pub use dispatcher::{Context, Middleware, Next};
pub use middleware::HaltReport;
pub use session::{CloudSyncSession, SessionBuilder};

/// Errors returned by the session handle
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The session has been shut down
    #[error("session is closed")]
    Closed,
}
