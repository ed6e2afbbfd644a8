//! Work dispatch
//!
//! After every reduction, compares the current work item with the one before
//! the event. When it changed (different id or retry count) the new item is
//! handed to the connector on a spawned task:
//!
//! ```text
//! debounce ──→ still current? ──→ permit ──→ still current? ──→ connector
//!                    │                              │               │
//!                  drop                           drop     WorkSuccess / WorkFailure
//! ```
//!
//! The one-permit semaphore keeps at most one connector call in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, trace};

use cloudsync_core::domain::{SyncError, SyncEvent, SyncState, SyncWork, WorkResult};
use cloudsync_core::ports::RemoteConnector;
use cloudsync_remote::AdaptiveThrottle;
use cloudsync_telemetry::SessionMetrics;

use crate::actor::EventSink;
use crate::dispatcher::{Context, Middleware, Next};

pub struct WorkMiddleware {
    connector: Arc<dyn RemoteConnector>,
    sink: EventSink,
    published: watch::Receiver<SyncState>,
    in_flight: Arc<Semaphore>,
    debounce: Duration,
    throttle: Option<Arc<AdaptiveThrottle>>,
    metrics: SessionMetrics,
}

impl WorkMiddleware {
    pub(crate) fn new(
        connector: Arc<dyn RemoteConnector>,
        sink: EventSink,
        published: watch::Receiver<SyncState>,
        debounce: Duration,
        throttle: Option<Arc<AdaptiveThrottle>>,
        metrics: SessionMetrics,
    ) -> Self {
        Self {
            connector,
            sink,
            published,
            in_flight: Arc::new(Semaphore::new(1)),
            debounce,
            throttle,
            metrics,
        }
    }

    fn schedule(&self, work: SyncWork) {
        let connector = Arc::clone(&self.connector);
        let sink = self.sink.clone();
        let published = self.published.clone();
        let in_flight = Arc::clone(&self.in_flight);
        let debounce = self.debounce;
        let throttle = self.throttle.clone();
        let metrics = self.metrics.clone();

        trace!(work = %work, "Scheduling work");

        self.sink.spawn(async move {
            tokio::time::sleep(debounce).await;
            if !is_current(&published, &work) {
                debug!(work = %work, "Work no longer current, skipping");
                return;
            }

            let Ok(_permit) = in_flight.acquire().await else {
                return;
            };
            if !is_current(&published, &work) {
                debug!(work = %work, "Work no longer current after wait, skipping");
                return;
            }

            debug!(work = %work, retry_count = work.retry_count(), "Performing work");
            let result = perform(connector.as_ref(), &work).await;

            let kind = work.kind().to_string();
            metrics.record_connector_call(&kind, if result.is_ok() { "success" } else { "failure" });
            if let Some(throttle) = &throttle {
                metrics.set_throttle(throttle.duration());
            }

            let event = match result {
                Ok(result) => SyncEvent::WorkSuccess(work, result),
                Err(error) => SyncEvent::WorkFailure(work, error),
            };
            sink.send(event);
        });
    }
}

/// Returns true while `work` is the published current work item
fn is_current(published: &watch::Receiver<SyncState>, work: &SyncWork) -> bool {
    published
        .borrow()
        .current_work()
        .is_some_and(|current| {
            current.id() == work.id() && current.retry_count() == work.retry_count()
        })
}

/// Hands `work` to the matching connector call
async fn perform(
    connector: &dyn RemoteConnector,
    work: &SyncWork,
) -> Result<WorkResult, SyncError> {
    match work {
        SyncWork::Modify(op) => connector.modify(op).await.map(WorkResult::Modify),
        SyncWork::FetchLatestChanges(op) => connector
            .fetch_latest_changes(op)
            .await
            .map(WorkResult::FetchLatestChanges),
        SyncWork::FetchRecords(op) => connector
            .fetch_records(op)
            .await
            .map(WorkResult::FetchRecords),
        SyncWork::CreateZone(op) => connector.create_zone(op).await.map(WorkResult::CreateZone),
        SyncWork::CreateSubscription(op) => connector
            .create_subscription(op)
            .await
            .map(WorkResult::CreateSubscription),
    }
}

impl Middleware for WorkMiddleware {
    fn name(&self) -> &'static str {
        "work"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        let previous = ctx
            .state()
            .current_work()
            .map(|work| (work.id(), work.retry_count()));

        let event = next.run(ctx, event);

        if let Some(work) = ctx.state().current_work() {
            if previous != Some((work.id(), work.retry_count())) {
                self.schedule(work.clone());
            }
        }

        event
    }
}
