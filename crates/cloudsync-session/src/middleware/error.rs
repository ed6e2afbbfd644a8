//! Error classification
//!
//! Turns a `WorkFailure` into the reaction its [`ErrorClass`] calls for:
//!
//! | class              | substituted event                                   |
//! |--------------------|-----------------------------------------------------|
//! | transient          | `Retry` with the backend's suggested delay          |
//! | limit exceeded     | `Split` (modify of two or more items), else `Halt`  |
//! | conflict           | `ResolveConflict`, or `Halt` when unresolved        |
//! | change token expired | new fetch queued, stale fetch dropped             |
//! | zone missing       | zone and subscription queued, `Retry`               |
//! | permanent          | `Halt`                                              |
//! | cancelled          | `WorkFailure` unchanged                             |

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use cloudsync_core::domain::{
    CreateSubscriptionOperation, CreateZoneOperation, ErrorClass, FetchLatestChangesOperation,
    ModifyOperation, Record, RecordId, SubscriptionId, SyncError, SyncEvent, SyncWork, ZoneId,
};
use cloudsync_core::ports::{ChangeTokenResolver, ConflictResolver};
use cloudsync_telemetry::SessionMetrics;

use crate::dispatcher::{Context, Middleware, Next};

pub struct ErrorMiddleware {
    zone_id: ZoneId,
    subscription_id: SubscriptionId,
    conflict_resolver: Option<Arc<dyn ConflictResolver>>,
    change_token_resolver: Option<Arc<dyn ChangeTokenResolver>>,
    metrics: SessionMetrics,
}

impl ErrorMiddleware {
    pub(crate) fn new(
        zone_id: ZoneId,
        subscription_id: SubscriptionId,
        conflict_resolver: Option<Arc<dyn ConflictResolver>>,
        change_token_resolver: Option<Arc<dyn ChangeTokenResolver>>,
        metrics: SessionMetrics,
    ) -> Self {
        Self {
            zone_id,
            subscription_id,
            conflict_resolver,
            change_token_resolver,
            metrics,
        }
    }

    fn classify(&self, ctx: &mut Context<'_>, work: SyncWork, error: SyncError) -> SyncEvent {
        match error.class() {
            ErrorClass::Transient => {
                let delay = error.retry_after();
                SyncEvent::Retry(work, error, delay)
            }
            ErrorClass::LimitExceeded => match work {
                SyncWork::Modify(ref op) if op.item_count() > 1 => SyncEvent::Split(work, error),
                other => {
                    warn!(work = %other, "Backend limit exceeded by work that cannot be split");
                    let kind = other.kind().to_string();
                    SyncEvent::Halt(Some(other), SyncError::Unsplittable { kind })
                }
            },
            ErrorClass::Conflict => match work {
                SyncWork::Modify(op) => self.resolve_conflict(op, error),
                other => SyncEvent::Halt(Some(other), error),
            },
            ErrorClass::ChangeTokenExpired => match work {
                SyncWork::FetchLatestChanges(_) => {
                    let token = self
                        .change_token_resolver
                        .as_ref()
                        .and_then(|resolver| resolver.resolve_expired_change_token());
                    info!(
                        resumes = token.is_some(),
                        "Change token expired, fetching again"
                    );
                    ctx.dispatch(SyncEvent::DoWork(SyncWork::FetchLatestChanges(
                        FetchLatestChangesOperation::new(token),
                    )));
                    SyncEvent::WorkFailure(work, error)
                }
                other => SyncEvent::Halt(Some(other), error),
            },
            ErrorClass::ZoneMissing => {
                warn!(zone = %self.zone_id, error = %error, "Zone missing, recreating");
                if !matches!(work, SyncWork::CreateZone(_)) {
                    ctx.dispatch(SyncEvent::DoWork(SyncWork::CreateZone(
                        CreateZoneOperation::new(self.zone_id.clone()),
                    )));
                }
                if !matches!(
                    work,
                    SyncWork::CreateZone(_) | SyncWork::CreateSubscription(_)
                ) {
                    ctx.dispatch(SyncEvent::DoWork(SyncWork::CreateSubscription(
                        CreateSubscriptionOperation::new(
                            self.zone_id.clone(),
                            self.subscription_id.clone(),
                        ),
                    )));
                }
                SyncEvent::Retry(work, error, None)
            }
            ErrorClass::Permanent => SyncEvent::Halt(Some(work), error),
            ErrorClass::Cancelled => SyncEvent::WorkFailure(work, error),
        }
    }

    /// Asks the resolver for replacements of the rejected records
    ///
    /// Records of the batch that were not rejected are carried over into the
    /// replacement unchanged.
    fn resolve_conflict(&self, op: ModifyOperation, error: SyncError) -> SyncEvent {
        let conflicts = error.conflicts();
        let count = conflicts.len();
        if count == 0 {
            return SyncEvent::Halt(Some(SyncWork::Modify(op)), error);
        }

        let Some(resolver) = &self.conflict_resolver else {
            debug!(count, "No conflict resolver configured");
            return self.unresolved(op, count);
        };

        let local: Vec<Record> = conflicts.iter().map(|c| c.client.clone()).collect();
        let Some(server) = conflicts
            .iter()
            .map(|c| c.server.clone())
            .collect::<Option<Vec<Record>>>()
        else {
            debug!(count, "Server version missing for a conflicting record");
            return self.unresolved(op, count);
        };

        let Some(resolved) = resolver.resolve_conflict(&local, &server) else {
            return self.unresolved(op, count);
        };

        let conflicted: HashSet<&RecordId> = local.iter().map(Record::id).collect();
        let mut records = resolved;
        records.extend(
            op.records()
                .iter()
                .filter(|record| !conflicted.contains(record.id()))
                .cloned(),
        );
        let record_ids_to_delete = op.record_ids_to_delete().to_vec();

        info!(
            conflicts = count,
            records = records.len(),
            "Conflicts resolved, replacing modify"
        );
        self.metrics.record_conflict("resolved");
        SyncEvent::ResolveConflict(SyncWork::Modify(op), records, record_ids_to_delete)
    }

    fn unresolved(&self, op: ModifyOperation, count: usize) -> SyncEvent {
        warn!(count, "Conflicts left unresolved, halting");
        self.metrics.record_conflict("unresolved");
        SyncEvent::Halt(
            Some(SyncWork::Modify(op)),
            SyncError::UnresolvedConflict { count },
        )
    }
}

impl Middleware for ErrorMiddleware {
    fn name(&self) -> &'static str {
        "error"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        match event {
            SyncEvent::WorkFailure(work, error) => {
                debug!(work = %work, error = %error, class = ?error.class(), "Classifying failure");
                let event = self.classify(ctx, work, error);
                next.run(ctx, event)
            }
            other => next.run(ctx, other),
        }
    }
}
