//! Work items and their results
//!
//! [`SyncWork`] wraps the five operation types so that queues, events and the
//! connector can handle them uniformly.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::newtypes::{CheckpointId, WorkId};
use super::operation::{
    CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesOperation,
    FetchLatestChangesResponse, FetchRecordsOperation, FetchRecordsResponse, ModifyOperation,
    ModifyResponse, Retriable,
};

/// Which backend call the session is currently serving
///
/// `Option<OperationMode>::None` means idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    CreateZone,
    CreateSubscription,
    Modify,
    FetchChanges,
    FetchRecords,
}

impl OperationMode {
    /// Every mode from highest to lowest priority
    pub const PRIORITY: [OperationMode; 5] = [
        OperationMode::CreateZone,
        OperationMode::CreateSubscription,
        OperationMode::Modify,
        OperationMode::FetchChanges,
        OperationMode::FetchRecords,
    ];

    /// Returns true for the modes that move user data
    pub fn is_data_mode(self) -> bool {
        matches!(
            self,
            OperationMode::Modify | OperationMode::FetchChanges | OperationMode::FetchRecords
        )
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationMode::CreateZone => "create_zone",
            OperationMode::CreateSubscription => "create_subscription",
            OperationMode::Modify => "modify",
            OperationMode::FetchChanges => "fetch_changes",
            OperationMode::FetchRecords => "fetch_records",
        };
        write!(f, "{}", s)
    }
}

/// Kind of a work item; one queue exists per kind
pub type WorkKind = OperationMode;

/// Account state reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Available,
    NoAccount,
    Restricted,
    TemporarilyUnavailable,
    CouldNotDetermine,
}

impl AccountStatus {
    /// Returns true if sync may proceed with this status
    pub fn is_good(self) -> bool {
        self == AccountStatus::Available
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Available => "available",
            AccountStatus::NoAccount => "no_account",
            AccountStatus::Restricted => "restricted",
            AccountStatus::TemporarilyUnavailable => "temporarily_unavailable",
            AccountStatus::CouldNotDetermine => "could_not_determine",
        };
        write!(f, "{}", s)
    }
}

/// A unit of work queued for the connector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWork {
    Modify(ModifyOperation),
    FetchLatestChanges(FetchLatestChangesOperation),
    FetchRecords(FetchRecordsOperation),
    CreateZone(CreateZoneOperation),
    CreateSubscription(CreateSubscriptionOperation),
}

impl SyncWork {
    pub fn id(&self) -> WorkId {
        match self {
            SyncWork::Modify(op) => op.id(),
            SyncWork::FetchLatestChanges(op) => op.id(),
            SyncWork::FetchRecords(op) => op.id(),
            SyncWork::CreateZone(op) => op.id(),
            SyncWork::CreateSubscription(op) => op.id(),
        }
    }

    /// Returns how many times this item has been retried
    pub fn retry_count(&self) -> u32 {
        match self {
            SyncWork::Modify(op) => op.retry_count(),
            SyncWork::FetchLatestChanges(op) => op.retry_count(),
            SyncWork::FetchRecords(op) => op.retry_count(),
            SyncWork::CreateZone(op) => op.retry_count(),
            SyncWork::CreateSubscription(op) => op.retry_count(),
        }
    }

    /// Returns a copy with the retry count incremented and the same id
    #[must_use]
    pub fn retried(&self) -> SyncWork {
        match self.clone() {
            SyncWork::Modify(op) => SyncWork::Modify(op.bump_retry_count()),
            SyncWork::FetchLatestChanges(op) => {
                SyncWork::FetchLatestChanges(op.bump_retry_count())
            }
            SyncWork::FetchRecords(op) => SyncWork::FetchRecords(op.bump_retry_count()),
            SyncWork::CreateZone(op) => SyncWork::CreateZone(op.bump_retry_count()),
            SyncWork::CreateSubscription(op) => {
                SyncWork::CreateSubscription(op.bump_retry_count())
            }
        }
    }

    /// Returns the checkpoint of a modify, `None` for every other kind
    pub fn checkpoint_id(&self) -> Option<CheckpointId> {
        match self {
            SyncWork::Modify(op) => op.checkpoint_id(),
            _ => None,
        }
    }

    pub fn kind(&self) -> WorkKind {
        self.mode()
    }

    /// Returns the operation mode that serves this item
    pub fn mode(&self) -> OperationMode {
        match self {
            SyncWork::Modify(_) => OperationMode::Modify,
            SyncWork::FetchLatestChanges(_) => OperationMode::FetchChanges,
            SyncWork::FetchRecords(_) => OperationMode::FetchRecords,
            SyncWork::CreateZone(_) => OperationMode::CreateZone,
            SyncWork::CreateSubscription(_) => OperationMode::CreateSubscription,
        }
    }
}

impl fmt::Display for SyncWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWork::Modify(op) => write!(
                f,
                "Modify with {} records to save and {} to delete",
                op.records().len(),
                op.record_ids_to_delete().len()
            ),
            SyncWork::FetchLatestChanges(_) => write!(f, "Fetch latest changes"),
            SyncWork::FetchRecords(op) => write!(f, "Fetch {} records", op.query().record_type),
            SyncWork::CreateZone(_) => write!(f, "Create zone"),
            SyncWork::CreateSubscription(_) => write!(f, "Create subscription"),
        }
    }
}

impl From<ModifyOperation> for SyncWork {
    fn from(op: ModifyOperation) -> Self {
        SyncWork::Modify(op)
    }
}

impl From<FetchLatestChangesOperation> for SyncWork {
    fn from(op: FetchLatestChangesOperation) -> Self {
        SyncWork::FetchLatestChanges(op)
    }
}

impl From<FetchRecordsOperation> for SyncWork {
    fn from(op: FetchRecordsOperation) -> Self {
        SyncWork::FetchRecords(op)
    }
}

impl From<CreateZoneOperation> for SyncWork {
    fn from(op: CreateZoneOperation) -> Self {
        SyncWork::CreateZone(op)
    }
}

impl From<CreateSubscriptionOperation> for SyncWork {
    fn from(op: CreateSubscriptionOperation) -> Self {
        SyncWork::CreateSubscription(op)
    }
}

/// Successful outcome of a work item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "response", rename_all = "snake_case")]
pub enum WorkResult {
    Modify(ModifyResponse),
    FetchLatestChanges(FetchLatestChangesResponse),
    FetchRecords(FetchRecordsResponse),
    CreateZone(bool),
    CreateSubscription(bool),
}

impl WorkResult {
    pub fn kind(&self) -> WorkKind {
        match self {
            WorkResult::Modify(_) => OperationMode::Modify,
            WorkResult::FetchLatestChanges(_) => OperationMode::FetchChanges,
            WorkResult::FetchRecords(_) => OperationMode::FetchRecords,
            WorkResult::CreateZone(_) => OperationMode::CreateZone,
            WorkResult::CreateSubscription(_) => OperationMode::CreateSubscription,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retried_keeps_id_and_increments_count() {
        let work = SyncWork::from(FetchLatestChangesOperation::new(None));
        let retried = work.retried().retried();
        assert_eq!(retried.id(), work.id());
        assert_eq!(retried.retry_count(), 2);
        assert_eq!(work.retry_count(), 0);
    }

    #[test]
    fn test_checkpoint_only_on_modify() {
        let checkpoint = CheckpointId::new();
        let modify = SyncWork::from(ModifyOperation::new(vec![], vec![]).with_checkpoint(checkpoint));
        assert_eq!(modify.checkpoint_id(), Some(checkpoint));

        let fetch = SyncWork::from(FetchLatestChangesOperation::new(None));
        assert_eq!(fetch.checkpoint_id(), None);
    }

    #[test]
    fn test_mode_matches_kind() {
        let work = SyncWork::from(ModifyOperation::new(vec![], vec![]));
        assert_eq!(work.mode(), OperationMode::Modify);
        assert_eq!(work.kind(), work.mode());
        assert_eq!(
            WorkResult::FetchRecords(FetchRecordsResponse::default()).kind(),
            OperationMode::FetchRecords
        );
    }

    #[test]
    fn test_priority_order() {
        assert_eq!(OperationMode::PRIORITY[0], OperationMode::CreateZone);
        assert_eq!(OperationMode::PRIORITY[4], OperationMode::FetchRecords);
        assert!(OperationMode::Modify.is_data_mode());
        assert!(!OperationMode::CreateSubscription.is_data_mode());
    }

    #[test]
    fn test_display() {
        let work = SyncWork::from(ModifyOperation::new(vec![], vec!["a".parse().unwrap()]));
        assert_eq!(
            work.to_string(),
            "Modify with 0 records to save and 1 to delete"
        );
        assert_eq!(AccountStatus::NoAccount.to_string(), "no_account");
        assert!(AccountStatus::Available.is_good());
    }
}
