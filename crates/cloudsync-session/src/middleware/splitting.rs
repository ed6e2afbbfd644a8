//! Batch splitting
//!
//! Modifies larger than the per-operation limit are never queued as they
//! are: they are replaced by chunks that each fit the limit, record chunks
//! first, then deletion chunks.

use tracing::info;

use cloudsync_core::domain::{SyncEvent, SyncWork};
use cloudsync_telemetry::SessionMetrics;

use crate::dispatcher::{Context, Middleware, Next};

pub struct SplittingMiddleware {
    limit: usize,
    metrics: SessionMetrics,
}

impl SplittingMiddleware {
    pub(crate) fn new(limit: usize, metrics: SessionMetrics) -> Self {
        Self { limit, metrics }
    }
}

impl Middleware for SplittingMiddleware {
    fn name(&self) -> &'static str {
        "splitting"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        match &event {
            SyncEvent::DoWork(SyncWork::Modify(op)) if op.should_split(self.limit) => {
                let chunks = op.split(self.limit);
                info!(
                    items = op.item_count(),
                    chunks = chunks.len(),
                    limit = self.limit,
                    "Splitting oversized modify"
                );
                self.metrics.record_split();

                for chunk in chunks {
                    ctx.dispatch(SyncEvent::DoWork(SyncWork::Modify(chunk)));
                }
                next.run(ctx, SyncEvent::Noop)
            }
            SyncEvent::Split(SyncWork::Modify(_), _) => {
                self.metrics.record_split();
                next.run(ctx, event)
            }
            _ => next.run(ctx, event),
        }
    }
}
