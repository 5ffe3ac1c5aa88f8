//! Dispatch plane: decoded messages and lifecycle events flow through one
//! bounded queue consumed by a single task.
//!
//! # Architecture
//!
//! ```text
//! Read loop ─► mpsc::Sender<DispatchItem> ─► Dispatch Task ─► consumers
//!                                                         └─► observers
//! ```
//!
//! Queueing decouples callback execution from the read loop (a slow consumer
//! delays later dispatches, never frame extraction), while the single
//! consuming task preserves strict arrival/transition order across messages
//! and events.

mod notifier;
mod router;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::DecodedMessage;

pub use notifier::{EventFilter, EventNotifier, ObserverResult, SessionEvent};
pub use router::{CallbackError, ConsumerResult, MessageRouter, TypeFilter};

/// Default capacity of the dispatch queue.
pub const DISPATCH_QUEUE_CAPACITY: usize = 256;

/// One unit of work for the dispatch task.
#[derive(Debug)]
pub enum DispatchItem {
    /// A decoded protocol message for the router.
    Message(DecodedMessage),
    /// A lifecycle event for the notifier.
    Event(SessionEvent),
}

/// Spawn the dispatch task and return a sender for posting work.
///
/// The task drains the queue in order and exits once every sender is
/// dropped, after processing what remains.
pub fn spawn_dispatch_task(
    router: MessageRouter,
    notifier: EventNotifier,
) -> (mpsc::Sender<DispatchItem>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);

    let task = tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match item {
                DispatchItem::Message(msg) => router.dispatch(Arc::new(msg)).await,
                DispatchItem::Event(event) => notifier.emit(event),
            }
        }
        tracing::debug!("dispatch task drained, exiting");
    });

    (tx, task)
}
