//! Dispatcher workers draining the delivery queue.
//!
//! Each worker pops a job, makes exactly one send attempt, turns the result
//! into a [`DeliveryOutcome`], and hands it to the callback notifier. With a
//! single worker the queue order is also the send order. With several workers
//! jobs are still taken in FIFO order but may complete out of order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::FutureExt;
use pushlite_core::{duration_to_ms, elapsed_ms_since};
use tokio::task::JoinHandle;

use crate::callback_notifier::CallbackNotifier;
use crate::delivery_queue::DeliveryQueue;
use crate::delivery_stats::PushDeliveryStats;
use crate::message_sender::{PushMessageSender, PushSendError};
use crate::push_contract::{DeliveryOutcome, PushJob};

const SEND_PANICKED_REASON: &str = "send primitive panicked";
const UNSUPPORTED_IMAGE_REASON: &str = "unsupported image format";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Public struct `PushDispatcherConfig` used across pushlite components.
pub struct PushDispatcherConfig {
    pub workers: usize,
    /// Upper bound for one send attempt; `None` waits for the send primitive.
    pub send_timeout: Option<Duration>,
    /// How long shutdown waits for workers to drain before aborting them.
    pub drain_timeout: Duration,
}

impl Default for PushDispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            send_timeout: Some(Duration::from_secs(30)),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Everything a worker needs to process one job.
#[derive(Clone)]
pub struct PushDispatchContext {
    pub sender: Arc<dyn PushMessageSender>,
    pub notifier: CallbackNotifier,
    pub stats: Arc<PushDeliveryStats>,
}

/// Handle owning the running dispatcher workers.
pub struct PushDispatcherHandle {
    queue: Arc<DeliveryQueue>,
    workers: Vec<JoinHandle<()>>,
    notifier: CallbackNotifier,
    drain_timeout: Duration,
}

impl PushDispatcherHandle {
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        self.workers.iter().any(|worker| !worker.is_finished())
    }

    /// Closes the queue, lets workers drain and their outcome callbacks finish
    /// within the drain timeout, then aborts whatever is still running. Jobs
    /// left behind are dropped.
    pub async fn shutdown(&mut self) {
        let deadline = tokio::time::Instant::now() + self.drain_timeout;
        self.queue.close();
        let workers = std::mem::take(&mut self.workers);
        let abort_handles = workers
            .iter()
            .map(JoinHandle::abort_handle)
            .collect::<Vec<_>>();
        let drained =
            tokio::time::timeout_at(deadline, futures_util::future::join_all(workers)).await;
        if drained.is_err() {
            for handle in abort_handles {
                handle.abort();
            }
            tracing::warn!(
                dropped_jobs = self.queue.size(),
                drain_timeout_ms = duration_to_ms(self.drain_timeout),
                "dispatcher drain timed out; remaining jobs dropped"
            );
            return;
        }
        if tokio::time::timeout_at(deadline, self.notifier.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                callbacks_in_flight = self.notifier.in_flight(),
                drain_timeout_ms = duration_to_ms(self.drain_timeout),
                "callback drain timed out; pending callbacks abandoned"
            );
        }
    }
}

impl Drop for PushDispatcherHandle {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

/// Spawns `config.workers` tasks draining `queue` on the current Tokio runtime.
pub fn start_push_dispatcher(
    config: PushDispatcherConfig,
    queue: Arc<DeliveryQueue>,
    context: PushDispatchContext,
) -> Result<PushDispatcherHandle> {
    if config.workers == 0 {
        bail!("push dispatcher requires at least one worker");
    }
    let runtime = tokio::runtime::Handle::try_current()
        .context("push dispatcher requires an active Tokio runtime")?;

    let workers = (0..config.workers)
        .map(|worker_index| {
            let queue = Arc::clone(&queue);
            let context = context.clone();
            runtime.spawn(async move {
                run_push_dispatch_worker(worker_index, queue, context, config.send_timeout).await;
            })
        })
        .collect::<Vec<_>>();
    tracing::info!(
        workers = config.workers,
        send_timeout_ms = config.send_timeout.map(duration_to_ms),
        "push dispatcher started"
    );

    Ok(PushDispatcherHandle {
        queue,
        workers,
        notifier: context.notifier,
        drain_timeout: config.drain_timeout,
    })
}

async fn run_push_dispatch_worker(
    worker_index: usize,
    queue: Arc<DeliveryQueue>,
    context: PushDispatchContext,
    send_timeout: Option<Duration>,
) {
    while let Some(job) = queue.dequeue().await {
        let callback_url = job.callback_url().map(str::to_string);
        let outcome = dispatch_push_job(&job, &context, send_timeout).await;
        context.notifier.notify(callback_url.as_deref(), outcome).await;
    }
    tracing::debug!(worker = worker_index, "push dispatch worker stopped");
}

/// Makes the single send attempt for `job` and records the outcome.
pub async fn dispatch_push_job(
    job: &PushJob,
    context: &PushDispatchContext,
    send_timeout: Option<Duration>,
) -> DeliveryOutcome {
    tracing::info!(
        message_id = job.message_id(),
        queue_wait_ms = elapsed_ms_since(job.admitted_unix_ms()),
        "processing push message"
    );

    if let Some(image) = job.message().image.as_ref() {
        if !image.has_recognized_format() {
            tracing::error!(
                message_id = job.message_id(),
                image_kind = image.kind(),
                "push message image is not a recognized format; send skipped"
            );
            context.stats.record_delivery(false);
            return DeliveryOutcome::failed(job.message_id(), UNSUPPORTED_IMAGE_REASON);
        }
    }

    let attempt = AssertUnwindSafe(context.sender.send(job.target(), job.message())).catch_unwind();
    let result = match send_timeout {
        Some(limit) => match tokio::time::timeout(limit, attempt).await {
            Ok(result) => result,
            Err(_) => Ok(Err(PushSendError::new(format!(
                "send timed out after {}ms",
                duration_to_ms(limit)
            )))),
        },
        None => attempt.await,
    };

    let outcome = match result {
        Ok(Ok(())) => {
            tracing::info!(message_id = job.message_id(), "push message delivered");
            DeliveryOutcome::delivered(job.message_id())
        }
        Ok(Err(error)) => {
            tracing::error!(
                message_id = job.message_id(),
                reason = error.reason(),
                "push message delivery failed"
            );
            DeliveryOutcome::failed(job.message_id(), error.reason())
        }
        Err(_) => {
            tracing::error!(
                message_id = job.message_id(),
                "push send primitive panicked"
            );
            DeliveryOutcome::failed(job.message_id(), SEND_PANICKED_REASON)
        }
    };
    context.stats.record_delivery(outcome.success);
    outcome
}
