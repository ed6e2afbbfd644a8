//! Result fan-out
//!
//! Publishes terminal outcomes to subscribers once the reducer has run, and
//! counts every event in the session metrics.

use tokio::sync::broadcast;
use tracing::trace;

use cloudsync_core::domain::{
    AccountStatus, FetchLatestChangesOperation, FetchLatestChangesResponse, FetchRecordsOperation,
    FetchRecordsResponse, ModifyOperation, ModifyResponse, SyncError, SyncEvent, SyncWork,
    WorkResult,
};
use cloudsync_telemetry::SessionMetrics;

use crate::dispatcher::{Context, Middleware, Next};

/// Why the session halted
#[derive(Debug, Clone, PartialEq)]
pub struct HaltReport {
    /// The work item that caused the halt, if any
    pub work: Option<SyncWork>,
    pub error: SyncError,
}

/// Broadcast channels for session outcomes
#[derive(Debug, Clone)]
pub struct Subjects {
    pub(crate) modify_completed: broadcast::Sender<(ModifyOperation, ModifyResponse)>,
    pub(crate) fetch_changes_completed:
        broadcast::Sender<(FetchLatestChangesOperation, FetchLatestChangesResponse)>,
    pub(crate) fetch_records_completed:
        broadcast::Sender<(FetchRecordsOperation, FetchRecordsResponse)>,
    /// `Some` on halt, `None` when the session starts again
    pub(crate) halted: broadcast::Sender<Option<HaltReport>>,
    pub(crate) account_status: broadcast::Sender<AccountStatus>,
}

impl Subjects {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            modify_completed: broadcast::channel(capacity).0,
            fetch_changes_completed: broadcast::channel(capacity).0,
            fetch_records_completed: broadcast::channel(capacity).0,
            halted: broadcast::channel(capacity).0,
            account_status: broadcast::channel(capacity).0,
        }
    }
}

pub struct SubjectMiddleware {
    subjects: Subjects,
    metrics: SessionMetrics,
}

impl SubjectMiddleware {
    pub(crate) fn new(subjects: Subjects, metrics: SessionMetrics) -> Self {
        Self { subjects, metrics }
    }

    fn publish(&self, event: &SyncEvent) {
        // Sends fail only when nobody is subscribed
        match event {
            SyncEvent::WorkSuccess(SyncWork::Modify(op), WorkResult::Modify(response)) => {
                let _ = self
                    .subjects
                    .modify_completed
                    .send((op.clone(), response.clone()));
            }
            SyncEvent::WorkSuccess(
                SyncWork::FetchLatestChanges(op),
                WorkResult::FetchLatestChanges(response),
            ) => {
                let _ = self
                    .subjects
                    .fetch_changes_completed
                    .send((op.clone(), response.clone()));
            }
            SyncEvent::WorkSuccess(SyncWork::FetchRecords(op), WorkResult::FetchRecords(response)) => {
                let _ = self
                    .subjects
                    .fetch_records_completed
                    .send((op.clone(), response.clone()));
            }
            SyncEvent::Halt(work, error) => {
                self.metrics.record_halt();
                let _ = self.subjects.halted.send(Some(HaltReport {
                    work: work.clone(),
                    error: error.clone(),
                }));
            }
            SyncEvent::Start => {
                let _ = self.subjects.halted.send(None);
            }
            SyncEvent::AccountStatusChanged(status) => {
                let _ = self.subjects.account_status.send(*status);
            }
            SyncEvent::Retry(work, _, _) => {
                self.metrics.record_retry(&work.kind().to_string());
            }
            _ => {}
        }
    }
}

impl Middleware for SubjectMiddleware {
    fn name(&self) -> &'static str {
        "subject"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        let event = next.run(ctx, event);

        trace!(event = event.name(), "Publishing");
        self.metrics.record_event(event.name());
        self.publish(&event);

        event
    }
}
