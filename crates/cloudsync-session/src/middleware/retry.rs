//! Retry scheduling with quadratic backoff
//!
//! A `Retry` event schedules a `RetryWork` for the same item. The delay is
//! the backend's suggestion when there is one, otherwise `retry_count²`
//! seconds: 0s, 1s, 4s, 9s, 16s. The item that would exceed the retry bound
//! halts the session instead.

use std::time::Duration;

use tracing::{info, warn};

use cloudsync_core::domain::{SyncError, SyncEvent, SyncWork};

use crate::actor::EventSink;
use crate::dispatcher::{Context, Middleware, Next};

/// Backoff for an item that has been retried `retry_count` times
pub fn backoff_delay(retry_count: u32) -> Duration {
    Duration::from_secs(u64::from(retry_count).pow(2))
}

pub struct RetryMiddleware {
    sink: EventSink,
    max_retry_count: u32,
}

impl RetryMiddleware {
    pub(crate) fn new(sink: EventSink, max_retry_count: u32) -> Self {
        Self {
            sink,
            max_retry_count,
        }
    }

    fn exhausted(&self, work: &SyncWork) -> bool {
        work.retry_count() + 1 > self.max_retry_count
    }
}

impl Middleware for RetryMiddleware {
    fn name(&self) -> &'static str {
        "retry"
    }

    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent {
        if let SyncEvent::Retry(work, error, suggested) = &event {
            if self.exhausted(work) {
                warn!(
                    work = %work,
                    attempts = work.retry_count() + 1,
                    error = %error,
                    "Retries exhausted, halting"
                );
                ctx.dispatch(SyncEvent::Halt(
                    Some(work.clone()),
                    SyncError::RetriesExhausted {
                        attempts: work.retry_count() + 1,
                        last: Box::new(error.clone()),
                    },
                ));
            } else {
                let delay = suggested.unwrap_or_else(|| backoff_delay(work.retry_count()));
                info!(
                    work = %work,
                    retry_count = work.retry_count(),
                    delay_secs = delay.as_secs_f64(),
                    "Scheduling retry"
                );
                self.sink
                    .send_after(delay, SyncEvent::RetryWork(work.clone()));
            }
        }

        next.run(ctx, event)
    }
}
