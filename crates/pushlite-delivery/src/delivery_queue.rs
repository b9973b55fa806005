//! Bounded FIFO queue decoupling HTTP admission from delivery.
//!
//! Producers (request handlers) never wait on anything but a short critical
//! section. Consumers (dispatcher workers) suspend on a [`Notify`] until a job
//! arrives or the queue is closed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;

use crate::push_contract::PushJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
/// Enumerates reasons a job cannot be enqueued.
pub enum DeliveryQueueError {
    #[error("delivery queue is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("delivery queue is closed")]
    Closed,
}

#[derive(Debug, Default)]
struct DeliveryQueueState {
    jobs: VecDeque<PushJob>,
    closed: bool,
}

/// Process-wide pending-job queue, shared through `Arc`.
#[derive(Debug)]
pub struct DeliveryQueue {
    state: Mutex<DeliveryQueueState>,
    available: Notify,
    capacity: Option<usize>,
}

impl DeliveryQueue {
    /// Creates an empty queue. A capacity of `0` means unbounded.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(DeliveryQueueState::default()),
            available: Notify::new(),
            capacity: (capacity > 0).then_some(capacity),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Appends `job` and returns the pending count right after the append.
    pub fn enqueue(&self, job: PushJob) -> Result<usize, DeliveryQueueError> {
        let size = {
            let mut state = self.lock_state();
            if state.closed {
                return Err(DeliveryQueueError::Closed);
            }
            if let Some(capacity) = self.capacity {
                if state.jobs.len() >= capacity {
                    return Err(DeliveryQueueError::Full { capacity });
                }
            }
            state.jobs.push_back(job);
            state.jobs.len()
        };
        self.available.notify_one();
        Ok(size)
    }

    pub fn try_dequeue(&self) -> Option<PushJob> {
        self.lock_state().jobs.pop_front()
    }

    /// Waits for the next job in FIFO order.
    ///
    /// Returns `None` once the queue is closed and fully drained.
    pub async fn dequeue(&self) -> Option<PushJob> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register interest before checking state so a concurrent
            // enqueue or close cannot slip between the check and the wait.
            notified.as_mut().enable();
            {
                let mut state = self.lock_state();
                if let Some(job) = state.jobs.pop_front() {
                    let has_more = !state.jobs.is_empty();
                    drop(state);
                    if has_more {
                        self.available.notify_one();
                    }
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn size(&self) -> usize {
        self.lock_state().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Rejects further enqueues and wakes every waiting consumer.
    pub fn close(&self) {
        self.lock_state().closed = true;
        self.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    fn lock_state(&self) -> MutexGuard<'_, DeliveryQueueState> {
        // The guarded state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
