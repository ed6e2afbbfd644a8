//! Session actor
//!
//! A single task owns the [`SyncState`] and the middleware chain. Callers,
//! timers and connector tasks talk to it through an unbounded channel and
//! every event is processed to completion before the next one is taken.

use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use cloudsync_core::domain::{SyncEvent, SyncState};

use crate::dispatcher::{Context, Middleware};

/// Messages accepted by the actor
#[derive(Debug)]
pub(crate) enum Command {
    Event(SyncEvent),
    /// Answered once every earlier command has been processed
    Barrier(oneshot::Sender<()>),
}

/// Sending half used by middleware to feed events back to the actor
///
/// Cloned into timers and connector tasks. Everything spawned through it
/// stops when the session's token is cancelled.
#[derive(Debug, Clone)]
pub(crate) struct EventSink {
    tx: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl EventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Command>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Enqueues `event`; returns false once the actor is gone
    pub(crate) fn send(&self, event: SyncEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.tx.send(Command::Event(event)).is_ok()
    }

    /// Enqueues `event` after `delay` unless the session shuts down first
    pub(crate) fn send_after(&self, delay: Duration, event: SyncEvent) {
        let sink = self.clone();
        self.spawn(async move {
            tokio::time::sleep(delay).await;
            sink.send(event);
        });
    }

    /// Spawns `task`, dropping it when the session shuts down
    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => trace!("Session task cancelled"),
                _ = task => {}
            }
        });
    }
}

/// Owner of the live state and the chain
pub(crate) struct SessionActor {
    state: SyncState,
    chain: Vec<Box<dyn Middleware>>,
    published: watch::Sender<SyncState>,
    max_dispatch_depth: usize,
    rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl SessionActor {
    pub(crate) fn new(
        chain: Vec<Box<dyn Middleware>>,
        published: watch::Sender<SyncState>,
        max_dispatch_depth: usize,
        rx: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let state = published.borrow().clone();
        Self {
            state,
            chain,
            published,
            max_dispatch_depth,
            rx,
            cancel,
        }
    }

    /// Processes commands until shutdown or until every sender is dropped
    pub(crate) async fn run(mut self) {
        info!(stages = self.chain.len(), "Sync session started");

        loop {
            let command = tokio::select! {
                _ = self.cancel.cancelled() => break,
                command = self.rx.recv() => command,
            };

            match command {
                Some(Command::Event(event)) => self.handle(event),
                Some(Command::Barrier(reply)) => {
                    let _ = reply.send(());
                }
                None => break,
            }
        }

        self.rx.close();
        info!("Sync session stopped");
    }

    fn handle(&mut self, event: SyncEvent) {
        let mut ctx = Context::new(
            &mut self.state,
            &self.published,
            &self.chain,
            self.max_dispatch_depth,
        );
        let result = ctx.dispatch(event);
        debug!(
            event = result.name(),
            mode = ?self.state.operation_mode(),
            halted = self.state.is_halted(),
            "Event processed"
        );
    }
}
