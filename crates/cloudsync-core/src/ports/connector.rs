//! Remote connector port (driven/secondary port)
//!
//! This module defines the interface between the session and the remote
//! record store. The session hands exactly one operation at a time to the
//! connector and feeds the outcome back into its state machine.
//!
//! ## Design Notes
//!
//! - Uses [`SyncError`] instead of `anyhow::Result` because the session reacts
//!   differently to each error class (retry, split, conflict, halt).
//! - Uses `#[async_trait]` for async trait methods.

use crate::domain::errors::SyncError;
use crate::domain::operation::{
    CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesOperation,
    FetchLatestChangesResponse, FetchRecordsOperation, FetchRecordsResponse, ModifyOperation,
    ModifyResponse,
};

/// Port trait for the remote record store
///
/// ## Implementation Notes
///
/// - Implementations must not retry internally; classify the failure and let
///   the session decide.
/// - Transient errors may carry a backend-suggested delay
///   (see [`SyncError::retry_after`]).
/// - Modify rejections for stale records are reported as
///   [`SyncError::PartialFailure`] carrying the server's current versions.
#[async_trait::async_trait]
pub trait RemoteConnector: Send + Sync {
    /// Saves and deletes records
    ///
    /// # Returns
    /// The records as saved by the server and the ids that were deleted
    async fn modify(&self, operation: &ModifyOperation) -> Result<ModifyResponse, SyncError>;

    /// Fetches one page of changes made since the operation's change token
    async fn fetch_latest_changes(
        &self,
        operation: &FetchLatestChangesOperation,
    ) -> Result<FetchLatestChangesResponse, SyncError>;

    /// Fetches records matching the operation's query
    async fn fetch_records(
        &self,
        operation: &FetchRecordsOperation,
    ) -> Result<FetchRecordsResponse, SyncError>;

    /// Creates the zone
    ///
    /// # Returns
    /// `true` if the zone exists afterwards
    async fn create_zone(&self, operation: &CreateZoneOperation) -> Result<bool, SyncError>;

    /// Registers the change subscription
    ///
    /// # Returns
    /// `true` if the subscription exists afterwards
    async fn create_subscription(
        &self,
        operation: &CreateSubscriptionOperation,
    ) -> Result<bool, SyncError>;
}

#[async_trait::async_trait]
impl<T: RemoteConnector + ?Sized> RemoteConnector for std::sync::Arc<T> {
    async fn modify(&self, operation: &ModifyOperation) -> Result<ModifyResponse, SyncError> {
        (**self).modify(operation).await
    }

    async fn fetch_latest_changes(
        &self,
        operation: &FetchLatestChangesOperation,
    ) -> Result<FetchLatestChangesResponse, SyncError> {
        (**self).fetch_latest_changes(operation).await
    }

    async fn fetch_records(
        &self,
        operation: &FetchRecordsOperation,
    ) -> Result<FetchRecordsResponse, SyncError> {
        (**self).fetch_records(operation).await
    }

    async fn create_zone(&self, operation: &CreateZoneOperation) -> Result<bool, SyncError> {
        (**self).create_zone(operation).await
    }

    async fn create_subscription(
        &self,
        operation: &CreateSubscriptionOperation,
    ) -> Result<bool, SyncError> {
        (**self).create_subscription(operation).await
    }
}
