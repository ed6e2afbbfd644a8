//! Events driving the session state machine

use std::fmt;
use std::time::Duration;

use super::errors::SyncError;
use super::newtypes::RecordId;
use super::record::Record;
use super::work::{AccountStatus, SyncWork, WorkResult};

/// Everything that can happen to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Begin (or resume after a halt)
    Start,
    /// The platform reported a new account status
    AccountStatusChanged(AccountStatus),
    /// Queue a work item
    DoWork(SyncWork),
    /// The item was too large; replace it with smaller items
    Split(SyncWork, SyncError),
    /// Re-queue an item after its backoff elapsed
    RetryWork(SyncWork),
    /// Schedule a retry of a failed item
    Retry(SyncWork, SyncError, Option<Duration>),
    WorkSuccess(SyncWork, WorkResult),
    WorkFailure(SyncWork, SyncError),
    /// Replace a conflicted modify with resolved records
    ResolveConflict(SyncWork, Vec<Record>, Vec<RecordId>),
    /// Stop all work until the next `Start`
    Halt(Option<SyncWork>, SyncError),
    Noop,
}

impl SyncEvent {
    /// Returns a short, stable name used for logs and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Start => "start",
            SyncEvent::AccountStatusChanged(_) => "account_status_changed",
            SyncEvent::DoWork(_) => "do_work",
            SyncEvent::Split(_, _) => "split",
            SyncEvent::RetryWork(_) => "retry_work",
            SyncEvent::Retry(_, _, _) => "retry",
            SyncEvent::WorkSuccess(_, _) => "work_success",
            SyncEvent::WorkFailure(_, _) => "work_failure",
            SyncEvent::ResolveConflict(_, _, _) => "resolve_conflict",
            SyncEvent::Halt(_, _) => "halt",
            SyncEvent::Noop => "noop",
        }
    }

    /// Returns the work item the event refers to, if any
    pub fn work(&self) -> Option<&SyncWork> {
        match self {
            SyncEvent::DoWork(work)
            | SyncEvent::Split(work, _)
            | SyncEvent::RetryWork(work)
            | SyncEvent::Retry(work, _, _)
            | SyncEvent::WorkSuccess(work, _)
            | SyncEvent::WorkFailure(work, _)
            | SyncEvent::ResolveConflict(work, _, _) => Some(work),
            SyncEvent::Halt(work, _) => work.as_ref(),
            SyncEvent::Start | SyncEvent::AccountStatusChanged(_) | SyncEvent::Noop => None,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Start => write!(f, "Start"),
            SyncEvent::AccountStatusChanged(status) => {
                write!(f, "Account status changed: {status}")
            }
            SyncEvent::DoWork(work) => write!(f, "Do work: {work}"),
            SyncEvent::Split(work, error) => write!(f, "Split work: {work} ({error})"),
            SyncEvent::RetryWork(work) => write!(f, "Retry work: {work}"),
            SyncEvent::Retry(work, error, Some(delay)) => write!(
                f,
                "Retry {work} after {:.1}s: {error}",
                delay.as_secs_f64()
            ),
            SyncEvent::Retry(work, error, None) => write!(f, "Retry {work}: {error}"),
            SyncEvent::WorkSuccess(work, _) => write!(f, "Work success: {work}"),
            SyncEvent::WorkFailure(work, error) => write!(f, "Work failure: {work} ({error})"),
            SyncEvent::ResolveConflict(work, records, deleted) => write!(
                f,
                "Resolve conflict: {work} with {} records to save and {} to delete",
                records.len(),
                deleted.len()
            ),
            SyncEvent::Halt(_, error) => write!(f, "Halt: {error}"),
            SyncEvent::Noop => write!(f, "Noop"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::operation::FetchLatestChangesOperation;

    #[test]
    fn test_names_are_snake_case() {
        assert_eq!(SyncEvent::Start.name(), "start");
        assert_eq!(
            SyncEvent::Halt(None, SyncError::Timeout).name(),
            "halt"
        );
    }

    #[test]
    fn test_work_accessor() {
        let work = SyncWork::from(FetchLatestChangesOperation::new(None));
        let event = SyncEvent::WorkFailure(work.clone(), SyncError::Timeout);
        assert_eq!(event.work(), Some(&work));
        assert!(SyncEvent::Noop.work().is_none());
        assert!(SyncEvent::Halt(None, SyncError::Timeout).work().is_none());
    }

    #[test]
    fn test_retry_description_includes_delay() {
        let work = SyncWork::from(FetchLatestChangesOperation::new(None));
        let event = SyncEvent::Retry(work, SyncError::Timeout, Some(Duration::from_millis(1500)));
        assert_eq!(
            event.to_string(),
            "Retry Fetch latest changes after 1.5s: request timed out"
        );
    }
}
