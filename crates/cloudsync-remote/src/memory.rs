//! In-memory remote store
//!
//! [`MemoryConnector`] implements [`RemoteConnector`] against an in-process
//! zone. It follows the backend's rules closely enough to drive a session
//! end to end without a network:
//!
//! - Saves are rejected with [`SyncError::PartialFailure`] when the record's
//!   change tag does not match the server copy. Modifies are atomic.
//! - Every save and delete is appended to a change log that
//!   `fetch_latest_changes` pages through with opaque change tokens.
//! - Modifies carrying more items than the record limit fail with
//!   [`SyncError::LimitExceeded`].
//! - Failures can be scripted with [`MemoryConnector::fail_next`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use cloudsync_core::domain::{
    ChangeToken, CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesOperation,
    FetchLatestChangesResponse, FetchRecordsOperation, FetchRecordsResponse, ModifyOperation,
    ModifyResponse, OperationMode, Record, RecordConflict, RecordId, RecordQuery, SubscriptionId,
    SyncError, ZoneId, MAX_RECOMMENDED_RECORDS_PER_OPERATION,
};
use cloudsync_core::ports::RemoteConnector;

/// Default number of changes returned per fetch page
pub const DEFAULT_PAGE_SIZE: usize = 100;

const TOKEN_PREFIX: &str = "memtok-";

#[derive(Debug, Clone)]
enum Change {
    Saved(Record),
    Deleted(RecordId),
}

#[derive(Debug)]
struct ScriptedFailure {
    kind: Option<OperationMode>,
    error: SyncError,
}

#[derive(Debug, Default)]
struct MemoryStore {
    zone: Option<ZoneId>,
    zone_deleted_by_user: bool,
    subscriptions: HashSet<SubscriptionId>,
    records: BTreeMap<RecordId, Record>,
    /// Entry `i` has sequence number `i + 1`
    change_log: Vec<Change>,
    /// Tokens older than this sequence number are expired
    oldest_valid_seq: u64,
    next_tag: u64,
    failures: VecDeque<ScriptedFailure>,
    calls: HashMap<OperationMode, usize>,
}

impl MemoryStore {
    fn latest_seq(&self) -> u64 {
        self.change_log.len() as u64
    }

    fn next_change_tag(&mut self) -> String {
        self.next_tag += 1;
        format!("tag-{}", self.next_tag)
    }

    fn save(&mut self, record: &Record) -> Record {
        let mut saved = record.clone();
        saved.set_change_tag(Some(self.next_change_tag()));
        self.records.insert(saved.id().clone(), saved.clone());
        self.change_log.push(Change::Saved(saved.clone()));
        saved
    }

    fn delete(&mut self, id: &RecordId) {
        self.records.remove(id);
        self.change_log.push(Change::Deleted(id.clone()));
    }

    fn ensure_zone(&self) -> Result<(), SyncError> {
        match (&self.zone, self.zone_deleted_by_user) {
            (Some(_), _) => Ok(()),
            (None, true) => Err(SyncError::UserDeletedZone),
            (None, false) => Err(SyncError::ZoneNotFound),
        }
    }

    /// Counts the call and pops a scripted failure for it, if any
    fn begin_call(&mut self, kind: OperationMode) -> Result<(), SyncError> {
        *self.calls.entry(kind).or_default() += 1;

        let scripted = self
            .failures
            .iter()
            .position(|f| f.kind.map_or(true, |k| k == kind));

        match scripted.and_then(|index| self.failures.remove(index)) {
            Some(failure) => {
                debug!(call = %kind, error = %failure.error, "Returning scripted failure");
                Err(failure.error)
            }
            None => Ok(()),
        }
    }

    fn token_seq(&self, token: Option<&ChangeToken>) -> Result<u64, SyncError> {
        let Some(token) = token else {
            return Ok(0);
        };

        let seq = token
            .as_str()
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(SyncError::ChangeTokenExpired)?;

        if seq < self.oldest_valid_seq || seq > self.latest_seq() {
            return Err(SyncError::ChangeTokenExpired);
        }
        Ok(seq)
    }
}

fn token_for(seq: u64) -> Option<ChangeToken> {
    ChangeToken::new(format!("{TOKEN_PREFIX}{seq}")).ok()
}

/// Matches `field == literal` predicates against a record
///
/// Anything else is treated as "match all".
fn matches_predicate(record: &Record, predicate: Option<&str>) -> bool {
    let Some((field, literal)) = predicate.and_then(|p| p.split_once("==")) else {
        return true;
    };

    let literal = literal.trim().trim_matches('"');
    match record.field(field.trim()) {
        Some(Value::String(s)) => s == literal,
        Some(other) => other.to_string() == literal,
        None => false,
    }
}

fn matches_query(record: &Record, query: &RecordQuery) -> bool {
    record.record_type() == query.record_type
        && matches_predicate(record, query.predicate.as_deref())
}

/// In-process remote store for tests and local runs
#[derive(Debug)]
pub struct MemoryConnector {
    store: Mutex<MemoryStore>,
    record_limit: usize,
    page_size: usize,
}

impl MemoryConnector {
    /// Creates an empty backend without a zone
    pub fn new() -> Self {
        Self {
            store: Mutex::new(MemoryStore::default()),
            record_limit: MAX_RECOMMENDED_RECORDS_PER_OPERATION,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates a backend whose zone already exists
    pub fn with_zone(zone_id: ZoneId) -> Self {
        let connector = Self::new();
        connector.lock().zone = Some(zone_id);
        connector
    }

    /// Sets the maximum items accepted by one modify
    pub fn with_record_limit(mut self, limit: usize) -> Self {
        self.record_limit = limit;
        self
    }

    /// Sets the number of changes returned per fetch page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // ========================================================================
    // Failure injection
    // ========================================================================

    /// Makes the next call of any kind fail with `error`
    ///
    /// Scripted failures queue up and are consumed in order.
    pub fn fail_next(&self, error: SyncError) {
        self.lock().failures.push_back(ScriptedFailure { kind: None, error });
    }

    /// Makes the next call of `kind` fail with `error`
    pub fn fail_next_for(&self, kind: OperationMode, error: SyncError) {
        self.lock().failures.push_back(ScriptedFailure {
            kind: Some(kind),
            error,
        });
    }

    /// Returns the number of scripted failures not yet consumed
    pub fn pending_failures(&self) -> usize {
        self.lock().failures.len()
    }

    // ========================================================================
    // Server-side changes
    // ========================================================================

    /// Saves a record as if another device had written it
    ///
    /// Returns the stored version with its new change tag.
    pub fn put_server_record(&self, record: Record) -> Record {
        self.lock().save(&record)
    }

    /// Deletes a record as if another device had deleted it
    pub fn delete_server_record(&self, id: &RecordId) {
        self.lock().delete(id);
    }

    /// Removes the zone and everything in it, as a user would from settings
    pub fn delete_zone(&self) {
        let mut store = self.lock();
        store.zone = None;
        store.zone_deleted_by_user = true;
        store.records.clear();
        store.subscriptions.clear();
    }

    /// Expires every change token handed out so far
    pub fn expire_change_tokens(&self) {
        let mut store = self.lock();
        store.oldest_valid_seq = store.latest_seq() + 1;
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Returns the server copy of a record
    pub fn record(&self, id: &RecordId) -> Option<Record> {
        self.lock().records.get(id).cloned()
    }

    /// Returns every stored record ordered by id
    pub fn records(&self) -> Vec<Record> {
        self.lock().records.values().cloned().collect()
    }

    pub fn has_zone(&self) -> bool {
        self.lock().zone.is_some()
    }

    pub fn has_subscription(&self, id: &SubscriptionId) -> bool {
        self.lock().subscriptions.contains(id)
    }

    /// Returns how many calls of `kind` were made, failed ones included
    pub fn call_count(&self, kind: OperationMode) -> usize {
        self.lock().calls.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteConnector for MemoryConnector {
    async fn modify(&self, operation: &ModifyOperation) -> Result<ModifyResponse, SyncError> {
        let mut store = self.lock();
        store.begin_call(OperationMode::Modify)?;
        store.ensure_zone()?;

        if operation.item_count() > self.record_limit {
            return Err(SyncError::LimitExceeded);
        }

        let conflicts: Vec<RecordConflict> = operation
            .records()
            .iter()
            .filter_map(|record| {
                let server = store.records.get(record.id());
                let stale = match server {
                    Some(server) => server.change_tag() != record.change_tag(),
                    None => record.change_tag().is_some(),
                };
                stale.then(|| RecordConflict::new(record.clone(), server.cloned()))
            })
            .collect();

        if !conflicts.is_empty() {
            debug!(conflicts = conflicts.len(), "Rejecting modify with stale records");
            return Err(SyncError::PartialFailure { conflicts });
        }

        let saved_records = operation
            .records()
            .iter()
            .map(|record| store.save(record))
            .collect();
        for id in operation.record_ids_to_delete() {
            store.delete(id);
        }

        trace!(
            saved = operation.records().len(),
            deleted = operation.record_ids_to_delete().len(),
            "Modify applied"
        );

        Ok(ModifyResponse {
            saved_records,
            deleted_record_ids: operation.record_ids_to_delete().to_vec(),
        })
    }

    async fn fetch_latest_changes(
        &self,
        operation: &FetchLatestChangesOperation,
    ) -> Result<FetchLatestChangesResponse, SyncError> {
        let mut store = self.lock();
        store.begin_call(OperationMode::FetchChanges)?;
        store.ensure_zone()?;

        let from = store.token_seq(operation.change_token())?;
        let latest = store.latest_seq();
        let to = (from + self.page_size as u64).min(latest);

        let mut changed: BTreeMap<RecordId, Record> = BTreeMap::new();
        let mut deleted: Vec<RecordId> = Vec::new();
        for change in &store.change_log[from as usize..to as usize] {
            match change {
                Change::Saved(record) => {
                    deleted.retain(|id| id != record.id());
                    changed.insert(record.id().clone(), record.clone());
                }
                Change::Deleted(id) => {
                    changed.remove(id);
                    if !deleted.contains(id) {
                        deleted.push(id.clone());
                    }
                }
            }
        }

        Ok(FetchLatestChangesResponse {
            change_token: token_for(to),
            changed_records: changed.into_values().collect(),
            deleted_record_ids: deleted,
            has_more: to < latest,
        })
    }

    async fn fetch_records(
        &self,
        operation: &FetchRecordsOperation,
    ) -> Result<FetchRecordsResponse, SyncError> {
        let mut store = self.lock();
        store.begin_call(OperationMode::FetchRecords)?;
        store.ensure_zone()?;

        let limit = operation.result_limit().unwrap_or(usize::MAX);
        let records = store
            .records
            .values()
            .filter(|record| matches_query(record, operation.query()))
            .take(limit)
            .cloned()
            .collect();

        Ok(FetchRecordsResponse { records })
    }

    async fn create_zone(&self, operation: &CreateZoneOperation) -> Result<bool, SyncError> {
        let mut store = self.lock();
        store.begin_call(OperationMode::CreateZone)?;

        if store.zone.is_none() {
            debug!(zone = %operation.zone_id(), "Creating zone");
            store.zone = Some(operation.zone_id().clone());
            store.zone_deleted_by_user = false;
        }
        Ok(true)
    }

    async fn create_subscription(
        &self,
        operation: &CreateSubscriptionOperation,
    ) -> Result<bool, SyncError> {
        let mut store = self.lock();
        store.begin_call(OperationMode::CreateSubscription)?;
        store.ensure_zone()?;

        store
            .subscriptions
            .insert(operation.subscription_id().clone());
        Ok(true)
    }
}
