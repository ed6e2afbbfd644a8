//! CloudSync Conflict - Conflict resolution
//!
//! Provides:
//! - Resolution strategies for records rejected as stale
//! - A rule-based policy engine choosing a strategy per record type
//!
//! [`PolicyEngine`] implements the session's
//! [`ConflictResolver`](cloudsync_core::ports::ConflictResolver) port, so it can
//! be handed to a session directly.

pub mod error;
pub mod policy;
pub mod strategy;

pub use error::ConflictError;
pub use policy::{validate_rule, PolicyEngine};
pub use strategy::{resolve_record, resolve_records, Resolution};
