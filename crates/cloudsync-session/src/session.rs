//! Caller-facing session handle
//!
//! [`CloudSyncSession`] is a cheap front for the actor: every call enqueues
//! an event and returns immediately. State and outcomes are observed through
//! channels.
//!
//! ## Example
//!
//! ```rust,ignore
//! let session = CloudSyncSession::builder(config)
//!     .throttled_connector(connector)
//!     .conflict_policy_from_config()
//!     .build()?;
//!
//! let mut halted = session.subscribe_halted();
//! session.account_status_changed(AccountStatus::Available)?;
//! session.start()?;
//! session.modify(ModifyOperation::new(records, vec![]))?;
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cloudsync_conflict::{validate_rule, PolicyEngine};
use cloudsync_core::config::Config;
use cloudsync_core::domain::{
    AccountStatus, ChangeToken, FetchLatestChangesOperation, FetchLatestChangesResponse,
    FetchRecordsOperation, FetchRecordsResponse, ModifyOperation, ModifyResponse, RecordQuery,
    SyncEvent, SyncState, SyncWork, WorkId, ZoneId,
};
use cloudsync_core::ports::{ChangeTokenResolver, ConflictResolver, RemoteConnector};
use cloudsync_remote::{AdaptiveThrottle, ThrottledConnector};
use cloudsync_telemetry::SessionMetrics;

use crate::actor::{Command, EventSink, SessionActor};
use crate::dispatcher::Middleware;
use crate::middleware::{
    ErrorMiddleware, HaltReport, LoggerMiddleware, RetryMiddleware, SplittingMiddleware,
    SubjectMiddleware, Subjects, WorkMiddleware, ZoneMiddleware,
};
use crate::SessionError;

/// Capacity of each outcome channel; slow subscribers see `Lagged`
const SUBJECT_CAPACITY: usize = 256;

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`CloudSyncSession`]
pub struct SessionBuilder {
    config: Config,
    connector: Option<Arc<dyn RemoteConnector>>,
    throttle: Option<Arc<AdaptiveThrottle>>,
    conflict_resolver: Option<Arc<dyn ConflictResolver>>,
    change_token_resolver: Option<Arc<dyn ChangeTokenResolver>>,
    metrics: Option<SessionMetrics>,
    /// Rules the configured policy had to skip, reported by `build`
    rejected_rules: Vec<String>,
}

impl SessionBuilder {
    /// Uses `connector` as is
    #[must_use]
    pub fn connector<C: RemoteConnector + 'static>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self.throttle = None;
        self
    }

    /// Wraps `connector` in an adaptive throttle built from the config
    #[must_use]
    pub fn throttled_connector<C: RemoteConnector + 'static>(mut self, connector: C) -> Self {
        let throttle = Arc::new(AdaptiveThrottle::from_config(&self.config.throttle));
        self.connector = Some(Arc::new(ThrottledConnector::with_shared_throttle(
            connector,
            Arc::clone(&throttle),
        )));
        self.throttle = Some(throttle);
        self
    }

    #[must_use]
    pub fn conflict_resolver<R: ConflictResolver + 'static>(mut self, resolver: R) -> Self {
        self.conflict_resolver = Some(Arc::new(resolver));
        self.rejected_rules.clear();
        self
    }

    /// Resolves conflicts with the rules from the `conflicts` config section
    ///
    /// A rule with a bad pattern or strategy makes `build` fail.
    #[must_use]
    pub fn conflict_policy_from_config(mut self) -> Self {
        self.rejected_rules = self
            .config
            .conflicts
            .rules
            .iter()
            .enumerate()
            .filter_map(|(i, rule)| {
                validate_rule(rule)
                    .err()
                    .map(|e| format!("conflicts.rules[{i}]: {e}"))
            })
            .collect();

        let engine = PolicyEngine::from_config(&self.config.conflicts);
        debug!(
            default = %engine.default_strategy(),
            rules = engine.rules_count(),
            "Using configured conflict policy"
        );
        self.conflict_resolver = Some(Arc::new(engine));
        self
    }

    #[must_use]
    pub fn change_token_resolver<R: ChangeTokenResolver + 'static>(mut self, resolver: R) -> Self {
        self.change_token_resolver = Some(Arc::new(resolver));
        self
    }

    /// Records into an existing registry instead of a fresh one
    #[must_use]
    pub fn metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validates the configuration and spawns the session actor
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> anyhow::Result<CloudSyncSession> {
        let problems: Vec<String> = self
            .config
            .validate()
            .iter()
            .map(ToString::to_string)
            .chain(self.rejected_rules.iter().cloned())
            .collect();
        if !problems.is_empty() {
            anyhow::bail!("invalid session configuration: {}", problems.join("; "));
        }

        let connector = self
            .connector
            .ok_or_else(|| anyhow::anyhow!("a remote connector is required"))?;
        let zone_id = self.config.session.zone_id()?;
        let subscription_id = self.config.session.subscription_id()?;
        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => SessionMetrics::new()?,
        };
        if let Some(throttle) = &self.throttle {
            metrics.set_throttle(throttle.duration());
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SyncState::new());
        let sink = EventSink::new(tx.clone(), cancel.clone());
        let subjects = Subjects::new(SUBJECT_CAPACITY);

        let chain: Vec<Box<dyn Middleware>> = vec![
            Box::new(LoggerMiddleware),
            Box::new(ErrorMiddleware::new(
                zone_id.clone(),
                subscription_id.clone(),
                self.conflict_resolver,
                self.change_token_resolver,
                metrics.clone(),
            )),
            Box::new(RetryMiddleware::new(
                sink.clone(),
                self.config.retry.max_retry_count,
            )),
            Box::new(SplittingMiddleware::new(
                self.config.batching.max_records_per_operation,
                metrics.clone(),
            )),
            Box::new(ZoneMiddleware::new(zone_id.clone(), subscription_id)),
            Box::new(WorkMiddleware::new(
                connector,
                sink,
                state_rx.clone(),
                self.config.dispatch.work_debounce(),
                self.throttle,
                metrics.clone(),
            )),
            Box::new(SubjectMiddleware::new(subjects.clone(), metrics.clone())),
        ];

        let actor = SessionActor::new(
            chain,
            state_tx,
            self.config.dispatch.max_dispatch_depth,
            rx,
            cancel.clone(),
        );
        tokio::spawn(actor.run());

        info!(zone = %zone_id, "Sync session created");

        Ok(CloudSyncSession {
            tx,
            state: state_rx,
            subjects,
            cancel,
            metrics,
            zone_id,
        })
    }
}

// ============================================================================
// Session
// ============================================================================

/// Handle to a running sync session
///
/// Dropping the handle shuts the session down.
pub struct CloudSyncSession {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SyncState>,
    subjects: Subjects,
    cancel: CancellationToken,
    metrics: SessionMetrics,
    zone_id: ZoneId,
}

impl CloudSyncSession {
    #[must_use]
    pub fn builder(config: Config) -> SessionBuilder {
        SessionBuilder {
            config,
            connector: None,
            throttle: None,
            conflict_resolver: None,
            change_token_resolver: None,
            metrics: None,
            rejected_rules: Vec::new(),
        }
    }

    /// Enqueues `event` for the actor
    pub fn dispatch(&self, event: SyncEvent) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        self.tx
            .send(Command::Event(event))
            .map_err(|_| SessionError::Closed)
    }

    /// Starts the session, or resumes it after a halt
    pub fn start(&self) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::Start)
    }

    pub fn account_status_changed(&self, status: AccountStatus) -> Result<(), SessionError> {
        self.dispatch(SyncEvent::AccountStatusChanged(status))
    }

    /// Queues a modify; returns the id of the queued work
    ///
    /// Oversized operations are split, so the id may not be seen again.
    pub fn modify(&self, operation: ModifyOperation) -> Result<WorkId, SessionError> {
        self.queue(SyncWork::Modify(operation))
    }

    /// Queues a fetch of the changes made since `change_token`
    pub fn fetch_latest_changes(
        &self,
        change_token: Option<ChangeToken>,
    ) -> Result<WorkId, SessionError> {
        self.queue(SyncWork::FetchLatestChanges(
            FetchLatestChangesOperation::new(change_token),
        ))
    }

    pub fn fetch_records(
        &self,
        query: RecordQuery,
        result_limit: Option<usize>,
    ) -> Result<WorkId, SessionError> {
        self.queue(SyncWork::FetchRecords(FetchRecordsOperation::new(
            query,
            result_limit,
        )))
    }

    fn queue(&self, work: SyncWork) -> Result<WorkId, SessionError> {
        let id = work.id();
        self.dispatch(SyncEvent::DoWork(work))?;
        Ok(id)
    }

    /// Returns a snapshot of the latest published state
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn subscribe_modify_completed(
        &self,
    ) -> broadcast::Receiver<(ModifyOperation, ModifyResponse)> {
        self.subjects.modify_completed.subscribe()
    }

    pub fn subscribe_fetch_changes_completed(
        &self,
    ) -> broadcast::Receiver<(FetchLatestChangesOperation, FetchLatestChangesResponse)> {
        self.subjects.fetch_changes_completed.subscribe()
    }

    pub fn subscribe_fetch_records_completed(
        &self,
    ) -> broadcast::Receiver<(FetchRecordsOperation, FetchRecordsResponse)> {
        self.subjects.fetch_records_completed.subscribe()
    }

    /// Receives a report on every halt and `None` on every start
    pub fn subscribe_halted(&self) -> broadcast::Receiver<Option<HaltReport>> {
        self.subjects.halted.subscribe()
    }

    pub fn subscribe_account_status(&self) -> broadcast::Receiver<AccountStatus> {
        self.subjects.account_status.subscribe()
    }

    /// Waits until the actor has processed everything dispatched so far
    ///
    /// Work already handed to the connector may still complete later.
    pub async fn settled(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        if self.cancel.is_cancelled() || self.tx.send(Command::Barrier(reply)).is_err() {
            return Err(SessionError::Closed);
        }
        done.await.map_err(|_| SessionError::Closed)
    }

    /// Stops the actor, pending timers and in-flight work
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(zone = %self.zone_id, "Shutting down sync session");
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn zone_id(&self) -> &ZoneId {
        &self.zone_id
    }
}

impl Drop for CloudSyncSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
