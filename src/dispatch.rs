//! Dispatch queue matching idle workers with incoming jobs.
//!
//! Each idle worker creates a single-use hand-off slot and publishes the
//! sending half here. Producers take the oldest slot and push their job
//! through it. The queue is bounded by the worker count, so it never holds
//! more than one entry per worker and jobs are never buffered.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::job::BoxedJob;

/// Sending half of a worker's hand-off slot.
pub(crate) type Slot = oneshot::Sender<BoxedJob>;

/// Receiving half of a worker's hand-off slot.
pub(crate) type Intake = oneshot::Receiver<BoxedJob>;

/// Create a fresh hand-off slot for one job.
pub(crate) fn slot() -> (Slot, Intake) {
    oneshot::channel()
}

/// Bounded registry of idle workers.
///
/// Workers publish through [`DispatchQueue::advertiser`]; producers receive
/// through [`IdleWorkers`]. Dropping the queue drops its sender, so once
/// every worker has finished advertising, receivers drain the remaining slots
/// and then observe the queue as closed.
pub(crate) struct DispatchQueue {
    advertise: mpsc::Sender<Slot>,
    idle: IdleWorkers,
}

impl DispatchQueue {
    /// `capacity` must be at least 1.
    pub(crate) fn new(capacity: usize) -> Self {
        let (advertise, receiver) = mpsc::channel(capacity);
        Self {
            advertise,
            idle: IdleWorkers {
                receiver: Arc::new(Mutex::new(receiver)),
            },
        }
    }

    /// Handle used by a worker to announce it is idle.
    pub(crate) fn advertiser(&self) -> mpsc::Sender<Slot> {
        self.advertise.clone()
    }

    /// Handle used by producers to claim idle workers.
    pub(crate) fn idle_workers(&self) -> IdleWorkers {
        self.idle.clone()
    }

    /// Number of slots currently waiting to be claimed.
    pub(crate) fn idle_count(&self) -> usize {
        self.advertise.max_capacity() - self.advertise.capacity()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.advertise.max_capacity()
    }

    /// Stop accepting advertisements and release the queue.
    pub(crate) async fn close(self) {
        self.idle.receiver.lock().await.close();
    }
}

/// Consumer side of the dispatch queue, shared by all producers.
#[derive(Clone)]
pub(crate) struct IdleWorkers {
    receiver: Arc<Mutex<mpsc::Receiver<Slot>>>,
}

impl IdleWorkers {
    /// Wait for the next idle worker's slot.
    ///
    /// Returns `None` once the queue is closed and drained. Producers wait in
    /// line behind the mutex, so slots go to them in arrival order.
    pub(crate) async fn next(&self) -> Option<Slot> {
        self.receiver.lock().await.recv().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
