//! Event logging

use tracing::debug;

use cloudsync_core::domain::SyncEvent;

use crate::dispatcher::{Context, Middleware, Next};

/// Logs every event with its nesting depth, then forwards it
#[derive(Debug, Default)]
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn name(&self) -> &'static str {
        "logger"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        debug!(depth = ctx.depth(), event = event.name(), "{event}");
        next.run(ctx, event)
    }
}
