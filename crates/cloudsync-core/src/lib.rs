//! CloudSync Core - Domain model and sync state machine
//!
//! This crate contains the pure heart of the sync engine:
//! - **Domain values** - identifiers, `Record`, the five operation kinds,
//!   `SyncWork`, `SyncEvent` and `SyncState`
//! - **Reducer** - `SyncState::reduce`, the only way state changes
//! - **Port definitions** - `RemoteConnector`, `ConflictResolver`,
//!   `ChangeTokenResolver`
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//!
//! # Architecture
//!
//! The domain module has no async code and no I/O. Everything that talks to
//! the network sits behind the port traits; the session crate drives the
//! reducer and the ports from a single actor.

pub mod config;
pub mod domain;
pub mod ports;
