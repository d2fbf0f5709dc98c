//! Bounded FIFO buffer decoupling webhook receipt from delivery.
//!
//! The producer half is cloned into every webhook handler; the single
//! consumer half is owned by the dispatch loop. Enqueueing into a full queue
//! waits for space instead of dropping the payload.

use crate::core::RawPayload;
use thiserror::Error;

/// Reference capacity of the ingestion queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("ingestion queue is closed")]
    Closed,
}

/// Constructor for the two halves of the ingestion queue.
pub struct IngestionQueue;

impl IngestionQueue {
    /// Creates a queue holding at most `capacity` payloads.
    ///
    /// A capacity of zero is raised to one; `async_channel` treats zero as
    /// invalid.
    pub fn bounded(capacity: usize) -> (QueueProducer, QueueConsumer) {
        let (tx, rx) = async_channel::bounded(capacity.max(1));
        (QueueProducer { tx }, QueueConsumer { rx })
    }
}

/// Producer half, held by the webhook listener.
#[derive(Clone, Debug)]
pub struct QueueProducer {
    tx: async_channel::Sender<RawPayload>,
}

impl QueueProducer {
    /// Appends a payload, waiting while the queue is full.
    pub async fn enqueue(&self, payload: RawPayload) -> Result<(), QueueError> {
        self.tx.send(payload).await.map_err(|_| QueueError::Closed)
    }

    /// Closes the queue. Payloads already buffered remain available to the
    /// consumer.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or_default()
    }
}

/// Consumer half, owned by the dispatch loop.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: async_channel::Receiver<RawPayload>,
}

impl QueueConsumer {
    /// Waits for the next payload in arrival order.
    ///
    /// Returns `None` once the queue is closed and drained.
    pub async fn dequeue(&self) -> Option<RawPayload> {
        self.rx.recv().await.ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
