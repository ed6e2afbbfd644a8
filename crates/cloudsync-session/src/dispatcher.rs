//! Middleware chain and nested dispatch
//!
//! Every event runs through the chain in order. A stage receives the event
//! and a [`Next`] continuation; calling [`Next::run`] hands the (possibly
//! substituted) event to the following stage, and past the last stage the
//! reducer is applied to the live state.
//!
//! ```text
//! dispatch(e) ──→ logger ──→ error ──→ retry ──→ ... ──→ subject ──→ reduce
//!                              │
//!                              └─ ctx.dispatch(e2)   (nested, depth + 1)
//! ```
//!
//! Nested dispatches run the full chain depth-first and complete before the
//! caller continues. Nesting is bounded; past the bound the session halts
//! with [`SyncError::DispatchDepthExceeded`].

use tokio::sync::watch;
use tracing::{error, warn};

use cloudsync_core::domain::{SyncError, SyncEvent, SyncState};

/// A stage of the chain
pub trait Middleware: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Handles `event`, usually by forwarding it with `next.run(ctx, event)`
    ///
    /// Returns the event that was finally reduced, or [`SyncEvent::Noop`]
    /// when propagation was suppressed.
    fn run(&self, ctx: &mut Context<'_>, event: SyncEvent, next: Next<'_>) -> SyncEvent;
}

/// The rest of the chain after the current stage
pub struct Next<'a> {
    rest: &'a [Box<dyn Middleware>],
}

impl Next<'_> {
    /// Runs the remaining stages, then the reducer
    pub fn run(self, ctx: &mut Context<'_>, event: SyncEvent) -> SyncEvent {
        match self.rest.split_first() {
            Some((stage, rest)) => stage.run(ctx, event, Next { rest }),
            None => {
                *ctx.state = ctx.state.reduce(&event);
                ctx.published.send_replace(ctx.state.clone());
                event
            }
        }
    }
}

/// Per-dispatch view of the session handed to every stage
pub struct Context<'a> {
    state: &'a mut SyncState,
    published: &'a watch::Sender<SyncState>,
    chain: &'a [Box<dyn Middleware>],
    depth: usize,
    max_depth: usize,
    overflowed: bool,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        state: &'a mut SyncState,
        published: &'a watch::Sender<SyncState>,
        chain: &'a [Box<dyn Middleware>],
        max_depth: usize,
    ) -> Self {
        Self {
            state,
            published,
            chain,
            depth: 0,
            max_depth,
            overflowed: false,
        }
    }

    /// Returns the live state
    pub fn state(&self) -> &SyncState {
        self.state
    }

    /// Returns the nesting depth of the event being handled; 1 for top level
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Runs `event` through the full chain before returning
    pub fn dispatch(&mut self, event: SyncEvent) -> SyncEvent {
        if self.depth >= self.max_depth {
            return self.overflow(event);
        }

        self.depth += 1;
        let chain = self.chain;
        let result = Next { rest: chain }.run(self, event);
        self.depth -= 1;
        result
    }

    /// Replaces the first event past the bound with a halt; drops the rest
    fn overflow(&mut self, event: SyncEvent) -> SyncEvent {
        if self.overflowed {
            warn!(event = event.name(), "Dropping event dispatched while halting");
            return SyncEvent::Noop;
        }
        self.overflowed = true;

        error!(
            depth = self.depth,
            event = event.name(),
            "Nested dispatch depth exceeded, halting"
        );
        let halt = SyncEvent::Halt(
            event.work().cloned(),
            SyncError::DispatchDepthExceeded { depth: self.depth },
        );
        let chain = self.chain;
        Next { rest: chain }.run(self, halt)
    }
}
