//! Sync operations and their responses
//!
//! Each operation is an immutable value with its own [`WorkId`] and retry
//! counter. Retrying keeps the id; splitting and conflict replacement create
//! new operations with fresh ids.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::newtypes::{ChangeToken, CheckpointId, RecordId, SubscriptionId, WorkId, ZoneId};
use super::record::{Record, RecordQuery};

/// Default number of records plus deletions accepted in a single modify
pub const MAX_RECOMMENDED_RECORDS_PER_OPERATION: usize = 400;

/// Opaque caller data threaded through splits, retries and conflict replacements
pub type Metadata = Map<String, Value>;

// ============================================================================
// Modify
// ============================================================================

/// Saves and deletes records in one backend call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifyOperation {
    id: WorkId,
    retry_count: u32,
    records: Vec<Record>,
    record_ids_to_delete: Vec<RecordId>,
    checkpoint_id: Option<CheckpointId>,
    metadata: Option<Metadata>,
}

impl ModifyOperation {
    /// Creates a new modify operation with a fresh id
    pub fn new(records: Vec<Record>, record_ids_to_delete: Vec<RecordId>) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            records,
            record_ids_to_delete,
            checkpoint_id: None,
            metadata: None,
        }
    }

    /// Sets the checkpoint reported when this operation lands
    pub fn with_checkpoint(mut self, checkpoint_id: CheckpointId) -> Self {
        self.checkpoint_id = Some(checkpoint_id);
        self
    }

    /// Attaches caller metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn derived(
        &self,
        records: Vec<Record>,
        record_ids_to_delete: Vec<RecordId>,
        checkpoint_id: Option<CheckpointId>,
    ) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            records,
            record_ids_to_delete,
            checkpoint_id,
            metadata: self.metadata.clone(),
        }
    }

    /// Builds the operation that replaces this one after conflict resolution
    ///
    /// The replacement has a new id and a zero retry count but keeps the
    /// checkpoint and metadata.
    pub fn replacement(&self, records: Vec<Record>, record_ids_to_delete: Vec<RecordId>) -> Self {
        self.derived(records, record_ids_to_delete, self.checkpoint_id)
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record_ids_to_delete(&self) -> &[RecordId] {
        &self.record_ids_to_delete
    }

    pub fn checkpoint_id(&self) -> Option<CheckpointId> {
        self.checkpoint_id
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Returns the number of records to save plus the number to delete
    pub fn item_count(&self) -> usize {
        self.records.len() + self.record_ids_to_delete.len()
    }

    /// Returns true if the operation carries more than `limit` items
    pub fn should_split(&self, limit: usize) -> bool {
        self.item_count() > limit
    }

    /// Splits the operation into chunks of at most `limit` items
    ///
    /// Record chunks come first, then deletion chunks. Only the last chunk
    /// keeps the checkpoint; every chunk keeps the metadata.
    pub fn split(&self, limit: usize) -> Vec<ModifyOperation> {
        let limit = limit.max(1);
        let mut chunks: Vec<ModifyOperation> = self
            .records
            .chunks(limit)
            .map(|records| self.derived(records.to_vec(), Vec::new(), None))
            .chain(
                self.record_ids_to_delete
                    .chunks(limit)
                    .map(|ids| self.derived(Vec::new(), ids.to_vec(), None)),
            )
            .collect();

        if let Some(last) = chunks.last_mut() {
            last.checkpoint_id = self.checkpoint_id;
        }

        chunks
    }

    /// Splits the operation into two halves
    ///
    /// Both records and deletions are halved. The first half executes first
    /// and has no checkpoint; the second half keeps it.
    pub fn split_in_half(&self) -> (ModifyOperation, ModifyOperation) {
        let (first_records, second_records) = self.records.split_at(self.records.len() / 2);
        let (first_deletes, second_deletes) = self
            .record_ids_to_delete
            .split_at(self.record_ids_to_delete.len() / 2);

        (
            self.derived(first_records.to_vec(), first_deletes.to_vec(), None),
            self.derived(
                second_records.to_vec(),
                second_deletes.to_vec(),
                self.checkpoint_id,
            ),
        )
    }
}

/// Result of a successful modify
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModifyResponse {
    pub saved_records: Vec<Record>,
    pub deleted_record_ids: Vec<RecordId>,
}

// ============================================================================
// Fetch latest changes
// ============================================================================

/// Fetches every change made in the zone since a change token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchLatestChangesOperation {
    id: WorkId,
    retry_count: u32,
    change_token: Option<ChangeToken>,
}

impl FetchLatestChangesOperation {
    /// Creates a fetch starting at `change_token`, or from scratch when `None`
    pub fn new(change_token: Option<ChangeToken>) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            change_token,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn change_token(&self) -> Option<&ChangeToken> {
        self.change_token.as_ref()
    }
}

/// One page of changes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchLatestChangesResponse {
    /// Token to resume from after this page
    pub change_token: Option<ChangeToken>,
    pub changed_records: Vec<Record>,
    pub deleted_record_ids: Vec<RecordId>,
    /// More changes are available after `change_token`
    pub has_more: bool,
}

// ============================================================================
// Fetch records
// ============================================================================

/// Fetches records matching a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRecordsOperation {
    id: WorkId,
    retry_count: u32,
    query: RecordQuery,
    result_limit: Option<usize>,
}

impl FetchRecordsOperation {
    pub fn new(query: RecordQuery, result_limit: Option<usize>) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            query,
            result_limit,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn query(&self) -> &RecordQuery {
        &self.query
    }

    pub fn result_limit(&self) -> Option<usize> {
        self.result_limit
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FetchRecordsResponse {
    pub records: Vec<Record>,
}

// ============================================================================
// Zone and subscription bootstrap
// ============================================================================

/// Creates the record zone if it does not exist yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateZoneOperation {
    id: WorkId,
    retry_count: u32,
    zone_id: ZoneId,
}

impl CreateZoneOperation {
    pub fn new(zone_id: ZoneId) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            zone_id,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }
}

/// Registers the change subscription for a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubscriptionOperation {
    id: WorkId,
    retry_count: u32,
    zone_id: ZoneId,
    subscription_id: SubscriptionId,
}

impl CreateSubscriptionOperation {
    pub fn new(zone_id: ZoneId, subscription_id: SubscriptionId) -> Self {
        Self {
            id: WorkId::new(),
            retry_count: 0,
            zone_id,
            subscription_id,
        }
    }

    pub fn id(&self) -> WorkId {
        self.id
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }

    pub fn subscription_id(&self) -> &SubscriptionId {
        &self.subscription_id
    }
}

// ============================================================================
// Retry bookkeeping
// ============================================================================

/// Operations that carry a retry counter
pub(crate) trait Retriable: Sized {
    fn bump_retry_count(self) -> Self;
}

macro_rules! impl_retriable {
    ($($op:ty),* $(,)?) => {
        $(
            impl Retriable for $op {
                fn bump_retry_count(mut self) -> Self {
                    self.retry_count = self.retry_count.saturating_add(1);
                    self
                }
            }
        )*
    };
}

impl_retriable!(
    ModifyOperation,
    FetchLatestChangesOperation,
    FetchRecordsOperation,
    CreateZoneOperation,
    CreateSubscriptionOperation,
);
