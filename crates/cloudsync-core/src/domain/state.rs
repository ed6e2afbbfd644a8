//! Session state and its reducer
//!
//! [`SyncState`] is a plain value. The session actor owns the live copy and
//! replaces it with [`SyncState::reduce`] for every event that makes it
//! through the middleware chain.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::errors::{ErrorClass, SyncError};
use super::event::SyncEvent;
use super::operation::{FetchLatestChangesOperation, ModifyOperation};
use super::work::{OperationMode, SyncWork, WorkKind, WorkResult};

/// Work queues, one FIFO per kind
#[derive(Debug, Clone, Default, PartialEq)]
struct WorkQueues {
    modify: VecDeque<SyncWork>,
    fetch_changes: VecDeque<SyncWork>,
    fetch_records: VecDeque<SyncWork>,
    create_zone: VecDeque<SyncWork>,
    create_subscription: VecDeque<SyncWork>,
}

impl WorkQueues {
    fn get(&self, kind: WorkKind) -> &VecDeque<SyncWork> {
        match kind {
            OperationMode::Modify => &self.modify,
            OperationMode::FetchChanges => &self.fetch_changes,
            OperationMode::FetchRecords => &self.fetch_records,
            OperationMode::CreateZone => &self.create_zone,
            OperationMode::CreateSubscription => &self.create_subscription,
        }
    }

    fn get_mut(&mut self, kind: WorkKind) -> &mut VecDeque<SyncWork> {
        match kind {
            OperationMode::Modify => &mut self.modify,
            OperationMode::FetchChanges => &mut self.fetch_changes,
            OperationMode::FetchRecords => &mut self.fetch_records,
            OperationMode::CreateZone => &mut self.create_zone,
            OperationMode::CreateSubscription => &mut self.create_subscription,
        }
    }

    fn is_empty(&self) -> bool {
        OperationMode::PRIORITY
            .iter()
            .all(|kind| self.get(*kind).is_empty())
    }
}

/// The state of a sync session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncState {
    queues: WorkQueues,
    /// Whether the account may sync; `None` until the status is known
    pub has_good_account_status: Option<bool>,
    /// Whether the zone exists; `None` until creation was attempted
    pub has_created_zone: Option<bool>,
    /// Whether the subscription exists; `None` until creation was attempted
    pub has_created_subscription: Option<bool>,
    is_halted: bool,
    last_halted_at: Option<DateTime<Utc>>,
    /// Consecutive retries since the last success
    pub retry_count: u32,
    /// Error that caused the last retry
    pub last_retry_error: Option<SyncError>,
    operation_mode: Option<OperationMode>,
}

impl SyncState {
    /// Creates the initial state: unknown prerequisites and empty queues
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_halted(&self) -> bool {
        self.is_halted
    }

    /// Returns when the session was halted, while it stays halted
    pub fn last_halted_at(&self) -> Option<DateTime<Utc>> {
        self.last_halted_at
    }

    /// Returns the mode being served; `None` means idle
    pub fn operation_mode(&self) -> Option<OperationMode> {
        self.operation_mode
    }

    /// Returns the number of items queued for a kind
    pub fn queue_len(&self, kind: WorkKind) -> usize {
        self.queues.get(kind).len()
    }

    /// Returns the items queued for a kind in execution order
    pub fn queued_work(&self, kind: WorkKind) -> impl Iterator<Item = &SyncWork> {
        self.queues.get(kind).iter()
    }

    pub fn has_work_queued(&self) -> bool {
        !self.queues.is_empty()
    }

    pub fn is_fetching(&self) -> bool {
        matches!(
            self.operation_mode,
            Some(OperationMode::FetchChanges | OperationMode::FetchRecords)
        )
    }

    pub fn is_modifying(&self) -> bool {
        self.operation_mode == Some(OperationMode::Modify)
    }

    /// Returns true when prerequisites are met and the session is not halted
    pub fn is_running(&self) -> bool {
        let allowed = self.allowed_operation_modes();
        [
            OperationMode::FetchChanges,
            OperationMode::FetchRecords,
            OperationMode::Modify,
        ]
        .iter()
        .all(|mode| allowed.contains(&Some(*mode)))
            && !self.is_halted
    }

    /// Returns true once account status, zone and subscription are all known
    pub fn has_started(&self) -> bool {
        self.has_good_account_status.is_some()
            && self.has_created_zone.is_some()
            && self.has_created_subscription.is_some()
    }

    pub fn is_starting(&self) -> bool {
        !self.has_started() && !self.is_halted
    }

    /// Returns the modes work may run in right now; `None` (idle) is always allowed
    pub fn allowed_operation_modes(&self) -> Vec<Option<OperationMode>> {
        let mut modes = vec![None];

        if self.is_halted || !self.has_good_account_status.unwrap_or(false) {
            return modes;
        }

        modes.push(Some(OperationMode::CreateZone));
        modes.push(Some(OperationMode::CreateSubscription));

        if self.has_created_zone.unwrap_or(false) && self.has_created_subscription.unwrap_or(false)
        {
            modes.push(Some(OperationMode::FetchChanges));
            modes.push(Some(OperationMode::FetchRecords));
            modes.push(Some(OperationMode::Modify));
        }

        modes
    }

    /// Returns allowed modes that have queued work, highest priority first
    ///
    /// Idle is always the last entry.
    pub fn preferred_operation_modes(&self) -> Vec<Option<OperationMode>> {
        let allowed = self.allowed_operation_modes();

        OperationMode::PRIORITY
            .iter()
            .copied()
            .filter(|mode| allowed.contains(&Some(*mode)) && !self.queues.get(*mode).is_empty())
            .map(Some)
            .chain(std::iter::once(None))
            .collect()
    }

    /// Returns the work item that is, or is about to be, handed to the connector
    pub fn current_work(&self) -> Option<&SyncWork> {
        if !self.allowed_operation_modes().contains(&self.operation_mode) {
            return None;
        }

        self.operation_mode
            .and_then(|mode| self.queues.get(mode).front())
    }

    // ========================================================================
    // Reducer
    // ========================================================================

    /// Returns the state after applying `event`
    #[must_use]
    pub fn reduce(&self, event: &SyncEvent) -> SyncState {
        let mut state = self.clone();

        match event {
            SyncEvent::AccountStatusChanged(status) => {
                state.has_good_account_status = Some(status.is_good());
                state.update_operation_mode();
            }
            SyncEvent::DoWork(work) => {
                state.push_work(work.clone());
                state.update_operation_mode();
            }
            SyncEvent::RetryWork(work) => {
                if state.pop_work(work) {
                    state.push_work(work.retried());
                }
                state.update_operation_mode();
            }
            SyncEvent::Split(work, _) => {
                state.pop_work(work);

                match work {
                    SyncWork::Modify(op) => {
                        let (first, second) = op.split_in_half();
                        for half in [second, first] {
                            if half.item_count() > 0 {
                                state.prioritize_work(SyncWork::Modify(half));
                            }
                        }
                    }
                    _ => state.set_halted(true),
                }

                state.update_operation_mode();
            }
            SyncEvent::WorkFailure(work, _) => {
                state.pop_work(work);
                state.update_operation_mode();
            }
            SyncEvent::WorkSuccess(work, result) => {
                state.retry_count = 0;
                state.last_retry_error = None;

                state.pop_work(work);

                match result {
                    WorkResult::FetchLatestChanges(response) if response.has_more => {
                        state.prioritize_work(SyncWork::FetchLatestChanges(
                            FetchLatestChangesOperation::new(response.change_token.clone()),
                        ));
                    }
                    WorkResult::CreateZone(created) => state.has_created_zone = Some(*created),
                    WorkResult::CreateSubscription(created) => {
                        state.has_created_subscription = Some(*created)
                    }
                    _ => {}
                }

                state.update_operation_mode();
            }
            SyncEvent::ResolveConflict(work, records, record_ids_to_delete) => {
                if let SyncWork::Modify(failed) = work {
                    let replacement: ModifyOperation =
                        failed.replacement(records.clone(), record_ids_to_delete.clone());

                    state.pop_work(work);
                    state.push_work(SyncWork::Modify(replacement));
                    state.update_operation_mode();
                }
            }
            SyncEvent::Halt(_, _) => state.set_halted(true),
            SyncEvent::Start => state.set_halted(false),
            SyncEvent::Retry(_, error, _) => {
                state.retry_count = state.retry_count.saturating_add(1);
                state.last_retry_error = Some(error.clone());

                // The subscription lives in the zone; both must be bootstrapped again
                if error.class() == ErrorClass::ZoneMissing {
                    state.has_created_zone = None;
                    state.has_created_subscription = None;
                    state.operation_mode = None;
                    state.update_operation_mode();
                }
            }
            SyncEvent::Noop => {}
        }

        state
    }

    fn set_halted(&mut self, halted: bool) {
        if halted && !self.is_halted {
            self.last_halted_at = Some(Utc::now());
        } else if !halted {
            self.last_halted_at = None;
        }
        self.is_halted = halted;
        self.update_operation_mode();
    }

    /// Keeps the current mode while it is still preferred, otherwise picks the
    /// highest-priority preferred mode
    fn update_operation_mode(&mut self) {
        if self.is_halted {
            self.operation_mode = None;
        }

        let preferred = self.preferred_operation_modes();
        if self.operation_mode.is_none() || !preferred.contains(&self.operation_mode) {
            self.operation_mode = preferred.first().copied().flatten();
        }
    }

    fn push_work(&mut self, work: SyncWork) {
        self.queues.get_mut(work.kind()).push_back(work);
    }

    fn prioritize_work(&mut self, work: SyncWork) {
        self.queues.get_mut(work.kind()).push_front(work);
    }

    /// Removes the item with the same id; returns false when it was not queued
    fn pop_work(&mut self, work: &SyncWork) -> bool {
        let queue = self.queues.get_mut(work.kind());
        let before = queue.len();
        let id = work.id();
        queue.retain(|queued| queued.id() != id);
        queue.len() != before
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::newtypes::{CheckpointId, SubscriptionId, ZoneId};
    use crate::domain::operation::{
        CreateSubscriptionOperation, CreateZoneOperation, FetchLatestChangesResponse,
        FetchRecordsOperation, ModifyResponse,
    };
    use crate::domain::record::{Record, RecordQuery};
    use crate::domain::work::AccountStatus;

    fn zone() -> ZoneId {
        ZoneId::for_current_user("Notes").unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new(format!("r{i}").parse().unwrap(), "Note"))
            .collect()
    }

    fn modify(n: usize) -> SyncWork {
        SyncWork::Modify(ModifyOperation::new(records(n), vec![]))
    }

    fn fetch_changes() -> SyncWork {
        SyncWork::FetchLatestChanges(FetchLatestChangesOperation::new(None))
    }

    fn fetch_records() -> SyncWork {
        SyncWork::FetchRecords(FetchRecordsOperation::new(RecordQuery::all("Note"), None))
    }

    fn apply(state: SyncState, events: &[SyncEvent]) -> SyncState {
        events.iter().fold(state, |state, event| state.reduce(event))
    }

    /// A state with good account status, zone and subscription
    fn running() -> SyncState {
        apply(
            SyncState::new(),
            &[
                SyncEvent::AccountStatusChanged(AccountStatus::Available),
                SyncEvent::WorkSuccess(
                    SyncWork::CreateZone(CreateZoneOperation::new(zone())),
                    WorkResult::CreateZone(true),
                ),
                SyncEvent::WorkSuccess(
                    SyncWork::CreateSubscription(CreateSubscriptionOperation::new(
                        zone(),
                        SubscriptionId::new("changes".into()).unwrap(),
                    )),
                    WorkResult::CreateSubscription(true),
                ),
            ],
        )
    }

    fn assert_mode_allowed(state: &SyncState) {
        assert!(
            state
                .allowed_operation_modes()
                .contains(&state.operation_mode()),
            "mode {:?} not allowed in {:?}",
            state.operation_mode(),
            state
        );
    }

    #[test]
    fn test_initial_state() {
        let state = SyncState::new();
        assert!(state.is_starting());
        assert!(!state.has_started());
        assert!(!state.is_running());
        assert!(!state.has_work_queued());
        assert_eq!(state.operation_mode(), None);
        assert_eq!(state.allowed_operation_modes(), vec![None]);
        assert!(state.current_work().is_none());
    }

    #[test]
    fn test_unknown_account_blocks_all_work() {
        let state = SyncState::new().reduce(&SyncEvent::DoWork(SyncWork::CreateZone(
            CreateZoneOperation::new(zone()),
        )));
        assert_eq!(state.queue_len(OperationMode::CreateZone), 1);
        assert_eq!(state.operation_mode(), None);
        assert!(state.current_work().is_none());
    }

    #[test]
    fn test_bootstrap_modes_allowed_before_data_modes() {
        let state = apply(
            SyncState::new(),
            &[
                SyncEvent::AccountStatusChanged(AccountStatus::Available),
                SyncEvent::DoWork(modify(1)),
            ],
        );
        assert_eq!(state.operation_mode(), None);

        let state = state.reduce(&SyncEvent::DoWork(SyncWork::CreateZone(
            CreateZoneOperation::new(zone()),
        )));
        assert_eq!(state.operation_mode(), Some(OperationMode::CreateZone));
        assert_mode_allowed(&state);
    }

    #[test]
    fn test_running_dispatches_queued_work() {
        let state = running();
        assert!(state.is_running());
        assert!(state.has_started());
        assert!(!state.is_starting());

        let work = modify(2);
        let state = state.reduce(&SyncEvent::DoWork(work.clone()));
        assert_eq!(state.operation_mode(), Some(OperationMode::Modify));
        assert_eq!(state.current_work(), Some(&work));
        assert!(state.is_modifying());
    }

    #[test]
    fn test_preferred_modes_follow_priority() {
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(fetch_records()),
                SyncEvent::DoWork(fetch_changes()),
                SyncEvent::DoWork(modify(1)),
            ],
        );
        assert_eq!(
            state.preferred_operation_modes(),
            vec![
                Some(OperationMode::Modify),
                Some(OperationMode::FetchChanges),
                Some(OperationMode::FetchRecords),
                None
            ]
        );
    }

    #[test]
    fn test_running_mode_is_not_preempted() {
        let state = running().reduce(&SyncEvent::DoWork(fetch_changes()));
        assert_eq!(state.operation_mode(), Some(OperationMode::FetchChanges));

        let state = state.reduce(&SyncEvent::DoWork(modify(1)));
        assert_eq!(state.operation_mode(), Some(OperationMode::FetchChanges));
        assert!(state.is_fetching());
    }

    #[test]
    fn test_mode_moves_on_when_queue_drains() {
        let fetch = fetch_changes();
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(fetch.clone()),
                SyncEvent::DoWork(modify(1)),
                SyncEvent::WorkSuccess(
                    fetch,
                    WorkResult::FetchLatestChanges(FetchLatestChangesResponse::default()),
                ),
            ],
        );
        assert_eq!(state.operation_mode(), Some(OperationMode::Modify));
    }

    #[test]
    fn test_fifo_within_queue() {
        let first = modify(1);
        let second = modify(2);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(first.clone()),
                SyncEvent::DoWork(second.clone()),
            ],
        );
        let queued: Vec<_> = state.queued_work(OperationMode::Modify).cloned().collect();
        assert_eq!(queued, vec![first, second]);
    }

    #[test]
    fn test_work_failure_for_absent_item_leaves_queues_unchanged() {
        let state = apply(running(), &[SyncEvent::DoWork(modify(1))]);
        let after = state.reduce(&SyncEvent::WorkFailure(modify(1), SyncError::Timeout));
        assert_eq!(after, state);
    }

    #[test]
    fn test_work_failure_pops_and_keeps_retry_bookkeeping() {
        let work = modify(1);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(work.clone()),
                SyncEvent::Retry(work.clone(), SyncError::Timeout, None),
                SyncEvent::WorkFailure(work, SyncError::Cancelled),
            ],
        );
        assert_eq!(state.queue_len(OperationMode::Modify), 0);
        assert_eq!(state.retry_count, 1);
        assert_eq!(state.last_retry_error, Some(SyncError::Timeout));
        assert_eq!(state.operation_mode(), None);
    }

    #[test]
    fn test_retry_work_requeues_at_tail_with_incremented_count() {
        let first = modify(1);
        let second = modify(2);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(first.clone()),
                SyncEvent::DoWork(second.clone()),
                SyncEvent::RetryWork(first.clone()),
            ],
        );
        let queued: Vec<_> = state.queued_work(OperationMode::Modify).cloned().collect();
        assert_eq!(queued, vec![second, first.retried()]);
    }

    #[test]
    fn test_retry_work_of_absent_item_is_noop() {
        let state = apply(running(), &[SyncEvent::DoWork(modify(1))]);
        let after = state.reduce(&SyncEvent::RetryWork(modify(3)));
        assert_eq!(after, state);
    }

    #[test]
    fn test_split_modify_inserts_halves_at_head() {
        let checkpoint = CheckpointId::new();
        let big = SyncWork::Modify(ModifyOperation::new(records(10), vec![]).with_checkpoint(checkpoint));
        let other = modify(1);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(big.clone()),
                SyncEvent::DoWork(other.clone()),
                SyncEvent::Split(big, SyncError::LimitExceeded),
            ],
        );

        let queued: Vec<_> = state.queued_work(OperationMode::Modify).cloned().collect();
        assert_eq!(queued.len(), 3);
        let SyncWork::Modify(first) = &queued[0] else { panic!("expected modify") };
        let SyncWork::Modify(second) = &queued[1] else { panic!("expected modify") };
        assert_eq!(first.records().len(), 5);
        assert_eq!(first.checkpoint_id(), None);
        assert_eq!(second.checkpoint_id(), Some(checkpoint));
        assert_eq!(queued[2], other);
        assert_eq!(state.current_work(), Some(&queued[0]));
    }

    #[test]
    fn test_split_never_queues_empty_half() {
        let single = modify(1);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(single.clone()),
                SyncEvent::Split(single.clone(), SyncError::LimitExceeded),
            ],
        );

        let queued: Vec<_> = state.queued_work(OperationMode::Modify).cloned().collect();
        assert_eq!(queued.len(), 1);
        let (SyncWork::Modify(before), SyncWork::Modify(after)) = (&single, &queued[0]) else {
            panic!("expected modify")
        };
        assert_eq!(after.records(), before.records());
        assert_ne!(after.id(), before.id());
    }

    #[test]
    fn test_split_non_modify_halts() {
        let fetch = fetch_changes();
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(fetch.clone()),
                SyncEvent::Split(fetch, SyncError::LimitExceeded),
            ],
        );
        assert!(state.is_halted());
        assert!(state.last_halted_at().is_some());
        assert_eq!(state.operation_mode(), None);
        assert!(!state.has_work_queued());
    }

    #[test]
    fn test_has_more_inserts_follow_up_fetch_at_head() {
        let fetch = fetch_changes();
        let queued_after = fetch_changes();
        let token = "page-2".parse().unwrap();
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(fetch.clone()),
                SyncEvent::DoWork(queued_after.clone()),
                SyncEvent::WorkSuccess(
                    fetch,
                    WorkResult::FetchLatestChanges(FetchLatestChangesResponse {
                        change_token: Some(token),
                        has_more: true,
                        ..Default::default()
                    }),
                ),
            ],
        );

        let queued: Vec<_> = state
            .queued_work(OperationMode::FetchChanges)
            .cloned()
            .collect();
        assert_eq!(queued.len(), 2);
        let SyncWork::FetchLatestChanges(follow_up) = &queued[0] else {
            panic!("expected fetch")
        };
        assert_eq!(follow_up.change_token().map(|t| t.as_str()), Some("page-2"));
        assert_eq!(queued[1], queued_after);
    }

    #[test]
    fn test_success_resets_retry_bookkeeping() {
        let work = modify(1);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(work.clone()),
                SyncEvent::Retry(work.clone(), SyncError::Timeout, Some(Duration::from_secs(1))),
                SyncEvent::Retry(work.clone(), SyncError::Timeout, None),
            ],
        );
        assert_eq!(state.retry_count, 2);

        let state = state.reduce(&SyncEvent::WorkSuccess(
            work,
            WorkResult::Modify(ModifyResponse::default()),
        ));
        assert_eq!(state.retry_count, 0);
        assert!(state.last_retry_error.is_none());
    }

    #[test]
    fn test_zone_missing_retry_resets_bootstrap() {
        let work = modify(1);
        let create_zone = SyncWork::CreateZone(CreateZoneOperation::new(zone()));
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(work.clone()),
                SyncEvent::DoWork(create_zone.clone()),
            ],
        );
        // A running modify is not preempted
        assert_eq!(state.operation_mode(), Some(OperationMode::Modify));

        let state = state.reduce(&SyncEvent::Retry(work, SyncError::UserDeletedZone, None));
        assert_eq!(state.has_created_zone, None);
        assert_eq!(state.has_created_subscription, None);
        assert_eq!(state.operation_mode(), Some(OperationMode::CreateZone));
        assert_eq!(state.current_work(), Some(&create_zone));
        assert_eq!(state.queue_len(OperationMode::Modify), 1);
    }

    #[test]
    fn test_resolve_conflict_replaces_modify() {
        let checkpoint = CheckpointId::new();
        let failed = SyncWork::Modify(ModifyOperation::new(records(3), vec![]).with_checkpoint(checkpoint));
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(failed.clone()),
                SyncEvent::ResolveConflict(failed.clone(), records(2), vec![]),
            ],
        );

        let queued: Vec<_> = state.queued_work(OperationMode::Modify).cloned().collect();
        assert_eq!(queued.len(), 1);
        assert_ne!(queued[0].id(), failed.id());
        assert_eq!(queued[0].retry_count(), 0);
        assert_eq!(queued[0].checkpoint_id(), Some(checkpoint));
    }

    #[test]
    fn test_resolve_conflict_ignores_non_modify() {
        let fetch = fetch_changes();
        let state = apply(running(), &[SyncEvent::DoWork(fetch.clone())]);
        let after = state.reduce(&SyncEvent::ResolveConflict(fetch, records(1), vec![]));
        assert_eq!(after, state);
    }

    #[test]
    fn test_halt_is_sticky_until_start() {
        let work = modify(1);
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(work.clone()),
                SyncEvent::Halt(Some(work), SyncError::NotAuthenticated),
                SyncEvent::AccountStatusChanged(AccountStatus::Available),
            ],
        );
        assert!(state.is_halted());
        assert!(!state.is_running());
        assert!(state.current_work().is_none());
        assert_mode_allowed(&state);

        let state = state.reduce(&SyncEvent::Start);
        assert!(!state.is_halted());
        assert!(state.last_halted_at().is_none());
        assert_eq!(state.operation_mode(), Some(OperationMode::Modify));
    }

    #[test]
    fn test_bad_account_status_idles() {
        let state = apply(
            running(),
            &[
                SyncEvent::DoWork(modify(1)),
                SyncEvent::AccountStatusChanged(AccountStatus::NoAccount),
            ],
        );
        assert_eq!(state.has_good_account_status, Some(false));
        assert_eq!(state.operation_mode(), None);
        assert!(state.has_started());
        assert!(!state.is_running());
    }

    #[test]
    fn test_failed_zone_creation_blocks_data_modes() {
        let state = apply(
            SyncState::new(),
            &[
                SyncEvent::AccountStatusChanged(AccountStatus::Available),
                SyncEvent::WorkSuccess(
                    SyncWork::CreateZone(CreateZoneOperation::new(zone())),
                    WorkResult::CreateZone(false),
                ),
                SyncEvent::DoWork(modify(1)),
            ],
        );
        assert_eq!(state.has_created_zone, Some(false));
        assert_eq!(state.operation_mode(), None);
    }

    #[test]
    fn test_mode_always_allowed_over_event_sequence() {
        let work = modify(1);
        let fetch = fetch_changes();
        let events = vec![
            SyncEvent::DoWork(work.clone()),
            SyncEvent::DoWork(fetch.clone()),
            SyncEvent::AccountStatusChanged(AccountStatus::Available),
            SyncEvent::DoWork(SyncWork::CreateZone(CreateZoneOperation::new(zone()))),
            SyncEvent::Halt(None, SyncError::Timeout),
            SyncEvent::Start,
            SyncEvent::RetryWork(work.clone()),
            SyncEvent::Split(work.retried(), SyncError::LimitExceeded),
            SyncEvent::WorkFailure(fetch, SyncError::Cancelled),
            SyncEvent::AccountStatusChanged(AccountStatus::Restricted),
            SyncEvent::Noop,
        ];

        let mut state = running();
        for event in &events {
            state = state.reduce(event);
            assert_mode_allowed(&state);
            if state.is_halted() {
                assert_eq!(state.operation_mode(), None);
            }
        }
    }
}
