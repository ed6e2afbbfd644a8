//! Error types for the conflict engine

use thiserror::Error;

use cloudsync_core::domain::RecordId;

/// Errors that can occur during conflict resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Invalid glob pattern in conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unknown strategy name in configuration
    #[error("invalid strategy '{0}'; valid: keep_local, keep_remote, manual")]
    InvalidStrategy(String),

    /// The local and server lists do not line up
    #[error("conflict batch mismatch: {local} local record(s), {server} server record(s)")]
    BatchMismatch { local: usize, server: usize },

    /// A record's strategy requires a person to decide
    #[error("manual resolution required for record {0}")]
    ManualResolutionRequired(RecordId),
}
