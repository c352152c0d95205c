//! Single-writer serialization kernel.
//!
//! Each registry owns one worker task consuming an unbounded FIFO of
//! events. All interactions happen via events sent to the worker; events
//! that need an answer carry a `oneshot` reply sender. This gives every
//! registry a single logical writer, strict arrival-order processing, and
//! atomic read-modify-write duplicate checks without registry-wide locks.
//!
//! Queues are unbounded and there is no backpressure: the only producer
//! that can realistically overflow is the load harness.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// Failures of a kernel call, distinct from domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("call timed out")]
    Timeout,

    #[error("worker is gone")]
    Closed,
}

/// A single-writer state owner.
///
/// `init` runs once before the first event is served (registries load
/// their snapshot here) and must not fail: bootstrap problems are logged
/// and degrade to empty state.
#[async_trait]
pub trait Worker: Send + 'static {
    type Event: Send + 'static;

    /// Short name used in lifecycle logs.
    fn name(&self) -> &'static str;

    /// Populate state before serving requests.
    async fn init(&mut self) {}

    /// Apply one event to the owned state.
    async fn handle(&mut self, event: Self::Event);
}

/// Cloneable sending half of a worker's queue.
pub struct Mailbox<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for Mailbox<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E: Send + 'static> Mailbox<E> {
    /// Enqueue an event without waiting for a reply. Returns `false` when
    /// the worker is gone.
    pub fn cast(&self, event: E) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Enqueue `make(reply_tx)` and await the reply.
    ///
    /// A `Timeout` result does not guarantee the operation was not
    /// applied: the worker still processes the request in arrival order
    /// and the reply is dropped. Callers must not depend on the converse.
    pub async fn call<R, F>(&self, make: F, timeout: Duration) -> Result<R, CallError>
    where
        F: FnOnce(oneshot::Sender<R>) -> E,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx.send(make(reply_tx)).map_err(|_| CallError::Closed)?;
        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CallError::Closed),
            Err(_) => Err(CallError::Timeout),
        }
    }
}

/// Spawn a worker on its own task and return its mailbox.
pub fn spawn<W: Worker>(mut worker: W) -> Mailbox<W::Event> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let name = worker.name();
        worker.init().await;
        while let Some(event) = rx.recv().await {
            worker.handle(event).await;
        }
        info!(worker = name, "worker stopped");
    });
    Mailbox { tx }
}

/// Spawn a worker with one-for-one restart.
///
/// When an event handler panics, the in-flight event is lost, the worker
/// value is rebuilt via `make` and `init` runs again (state comes back
/// from the snapshot). The queue itself survives the restart, so queued
/// requests are served by the fresh worker in the original order.
pub fn spawn_supervised<W, F>(mut make: F) -> Mailbox<W::Event>
where
    W: Worker,
    F: FnMut() -> W + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let mut worker = make();
            let name = worker.name();
            worker.init().await;
            let drained = AssertUnwindSafe(async {
                while let Some(event) = rx.recv().await {
                    worker.handle(event).await;
                }
            })
            .catch_unwind()
            .await;
            match drained {
                Ok(()) => {
                    info!(worker = name, "worker stopped");
                    break;
                }
                Err(_) => {
                    error!(worker = name, "worker panicked, restarting");
                }
            }
        }
    });
    Mailbox { tx }
}
