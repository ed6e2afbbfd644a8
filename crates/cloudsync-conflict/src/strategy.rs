//! Resolution strategies
//!
//! A conflict arises when a modify carries a record whose change tag no
//! longer matches the server copy. Each strategy turns the rejected local
//! record and the server's current version into the record to save next.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cloudsync_core::domain::Record;

use crate::error::ConflictError;

/// How a conflict should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the local fields, written on top of the server version
    KeepLocal,
    /// Keep the server version unchanged
    KeepRemote,
    /// Requires manual user intervention
    Manual,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Resolution::KeepLocal => "keep_local",
            Resolution::KeepRemote => "keep_remote",
            Resolution::Manual => "manual",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Resolution {
    type Err = ConflictError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_local" => Ok(Resolution::KeepLocal),
            "keep_remote" => Ok(Resolution::KeepRemote),
            "manual" => Ok(Resolution::Manual),
            other => Err(ConflictError::InvalidStrategy(other.to_string())),
        }
    }
}

/// Resolves one conflict
///
/// `KeepLocal` copies the local fields onto the server version so the retry
/// carries the server's change tag and is accepted.
pub fn resolve_record(
    resolution: Resolution,
    local: &Record,
    server: &Record,
) -> Result<Record, ConflictError> {
    match resolution {
        Resolution::KeepLocal => {
            let mut resolved = server.clone();
            resolved.copy_fields(local);
            Ok(resolved)
        }
        Resolution::KeepRemote => Ok(server.clone()),
        Resolution::Manual => Err(ConflictError::ManualResolutionRequired(local.id().clone())),
    }
}

/// Resolves an index-aligned batch of conflicts with a single strategy
pub fn resolve_records(
    resolution: Resolution,
    local: &[Record],
    server: &[Record],
) -> Result<Vec<Record>, ConflictError> {
    if local.len() != server.len() {
        return Err(ConflictError::BatchMismatch {
            local: local.len(),
            server: server.len(),
        });
    }

    local
        .iter()
        .zip(server)
        .map(|(local, server)| resolve_record(resolution, local, server))
        .collect()
}
