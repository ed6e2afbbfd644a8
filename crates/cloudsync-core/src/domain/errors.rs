//! Domain error types
//!
//! This module defines the two error families of the engine:
//! - [`DomainError`] for invalid identifiers and values
//! - [`SyncError`] for failures reported by the remote connector or raised by
//!   the engine itself while driving work

use std::time::Duration;

use thiserror::Error;

use super::record::RecordConflict;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid record identifier
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),

    /// Invalid change token
    #[error("Invalid change token: {0}")]
    InvalidChangeToken(String),

    /// Invalid zone identifier
    #[error("Invalid zone ID: {0}")]
    InvalidZoneId(String),

    /// Invalid subscription identifier
    #[error("Invalid subscription ID: {0}")]
    InvalidSubscriptionId(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// How the engine reacts to a [`SyncError`] reported for a work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Try the same work again after a backoff
    Transient,
    /// The batch was too large for the backend; split it in half
    LimitExceeded,
    /// Some records were rejected because the server holds newer versions
    Conflict,
    /// The change token used for fetching is no longer accepted
    ChangeTokenExpired,
    /// The zone disappeared and must be created again
    ZoneMissing,
    /// The work was cancelled; drop it without halting
    Cancelled,
    /// Nothing automatic will fix this; halt
    Permanent,
}

/// Errors reported for sync work
///
/// Errors travel inside [`SyncEvent`](super::event::SyncEvent)s and are
/// broadcast to subscribers, so they are `Clone`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// The network was unreachable or the connection dropped
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The request did not complete in time
    #[error("request timed out")]
    Timeout,

    /// The backend is temporarily unavailable
    #[error("service unavailable")]
    ServiceUnavailable {
        /// Backend-suggested delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// The backend is rate limiting this client
    #[error("request rate limited")]
    RateLimited {
        /// Backend-suggested delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// The zone is busy with other requests
    #[error("zone busy")]
    ZoneBusy {
        /// Backend-suggested delay before the next attempt
        retry_after: Option<Duration>,
    },

    /// The request carried more items than the backend accepts in one call
    #[error("request exceeds the backend item limit")]
    LimitExceeded,

    /// Some records of a batch were rejected
    #[error("partial failure: {} conflicting record(s)", conflicts.len())]
    PartialFailure {
        /// Per-record rejections with the server's current versions
        conflicts: Vec<RecordConflict>,
    },

    /// A single record was rejected because the server copy changed
    #[error("server record changed: {}", conflict.client.id())]
    ServerRecordChanged {
        /// The rejected record and the server's current version
        conflict: RecordConflict,
    },

    /// The change token is too old to resume from
    #[error("change token expired")]
    ChangeTokenExpired,

    /// The zone does not exist on the backend
    #[error("zone not found")]
    ZoneNotFound,

    /// The user deleted the zone
    #[error("zone deleted by user")]
    UserDeletedZone,

    /// No authenticated account
    #[error("not authenticated")]
    NotAuthenticated,

    /// The account is restricted by its administrator
    #[error("account restricted")]
    AccountRestricted,

    /// The account has no storage quota left
    #[error("quota exceeded")]
    QuotaExceeded,

    /// The account lacks permission for the request
    #[error("permission failure: {0}")]
    PermissionFailure(String),

    /// The backend rejected the request as malformed
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// Unexpected backend or connector failure
    #[error("internal error: {0}")]
    Internal(String),

    /// The request was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,

    /// A conflict could not be resolved by the configured resolver
    #[error("unresolved conflict for {count} record(s)")]
    UnresolvedConflict {
        /// Number of records left in conflict
        count: usize,
    },

    /// A work item failed more often than allowed
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        /// Attempts made, including the first one
        attempts: u32,
        /// The error of the last attempt
        last: Box<SyncError>,
    },

    /// A split was requested for work that cannot be split
    #[error("cannot split {kind} work")]
    Unsplittable {
        /// Kind of the offending work item
        kind: String,
    },

    /// Middleware kept re-dispatching events past the nesting bound
    #[error("nested dispatch depth {depth} exceeded")]
    DispatchDepthExceeded {
        /// Depth at which dispatch was refused
        depth: usize,
    },
}

impl SyncError {
    /// Classifies the error into the reaction the engine applies
    pub fn class(&self) -> ErrorClass {
        match self {
            SyncError::NetworkFailure(_)
            | SyncError::Timeout
            | SyncError::ServiceUnavailable { .. }
            | SyncError::RateLimited { .. }
            | SyncError::ZoneBusy { .. } => ErrorClass::Transient,
            SyncError::LimitExceeded => ErrorClass::LimitExceeded,
            SyncError::PartialFailure { .. } | SyncError::ServerRecordChanged { .. } => {
                ErrorClass::Conflict
            }
            SyncError::ChangeTokenExpired => ErrorClass::ChangeTokenExpired,
            SyncError::ZoneNotFound | SyncError::UserDeletedZone => ErrorClass::ZoneMissing,
            SyncError::Cancelled => ErrorClass::Cancelled,
            SyncError::NotAuthenticated
            | SyncError::AccountRestricted
            | SyncError::QuotaExceeded
            | SyncError::PermissionFailure(_)
            | SyncError::ServerRejected(_)
            | SyncError::Internal(_)
            | SyncError::UnresolvedConflict { .. }
            | SyncError::RetriesExhausted { .. }
            | SyncError::Unsplittable { .. }
            | SyncError::DispatchDepthExceeded { .. } => ErrorClass::Permanent,
        }
    }

    /// Returns true if the same request may succeed when repeated later
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns the delay the backend asked for, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SyncError::ServiceUnavailable { retry_after }
            | SyncError::RateLimited { retry_after }
            | SyncError::ZoneBusy { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Returns the per-record conflicts carried by a partial failure
    pub fn conflicts(&self) -> &[RecordConflict] {
        match self {
            SyncError::PartialFailure { conflicts } => conflicts,
            SyncError::ServerRecordChanged { conflict } => std::slice::from_ref(conflict),
            _ => &[],
        }
    }
}
