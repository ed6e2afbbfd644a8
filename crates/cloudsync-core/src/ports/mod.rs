//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the session depends on,
//! but whose implementations live in adapter crates or in the application.
//!
//! ## Ports Overview
//!
//! - [`RemoteConnector`] - Remote record store operations
//! - [`ConflictResolver`] - Application callback for stale-record rejections
//! - [`ChangeTokenResolver`] - Application callback for expired change tokens

pub mod connector;
pub mod resolver;

pub use connector::RemoteConnector;
pub use resolver::{ChangeTokenResolver, ConflictResolver};
