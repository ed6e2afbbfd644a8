//! Domain entities and business logic
//!
//! This module contains the core domain types for CloudSync:
//! - Newtypes for type-safe identifiers
//! - Records, queries and per-record conflicts
//! - Operations, work items and their results
//! - Session events and the state reducer
//! - Domain-specific error types

pub mod errors;
pub mod event;
pub mod newtypes;
pub mod operation;
pub mod record;
pub mod state;
pub mod work;

// Re-export commonly used types
pub use errors::{DomainError, ErrorClass, SyncError};
pub use event::SyncEvent;
pub use newtypes::*;
pub use operation::{
    CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesOperation,
    FetchLatestChangesResponse, FetchRecordsOperation, FetchRecordsResponse, Metadata,
    ModifyOperation, ModifyResponse, MAX_RECOMMENDED_RECORDS_PER_OPERATION,
};
pub use record::{Record, RecordConflict, RecordQuery};
pub use state::SyncState;
pub use work::{AccountStatus, OperationMode, SyncWork, WorkKind, WorkResult};
