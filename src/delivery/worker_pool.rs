//! Bounded worker pool for async-mode messages.
//!
//! Webhook calls enqueue message ids; a fixed set of workers drains the
//! queue through the `MessageProcessor`. A full queue is reported to the
//! caller instead of spawning unbounded work.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::metrics::QueueMetrics;

use super::orchestrator::MessageProcessor;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Delivery queue is full")]
    QueueFull,

    #[error("Delivery queue is shut down")]
    Closed,
}

pub struct DeliveryWorkerPool {
    sender: RwLock<Option<mpsc::Sender<i64>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeliveryWorkerPool {
    /// Spawn `workers` tasks sharing a queue of `capacity` message ids.
    pub fn start(processor: Arc<MessageProcessor>, workers: usize, capacity: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, processor.clone(), rx.clone())))
            .collect();

        tracing::info!(workers, capacity, "Delivery worker pool started");

        Self {
            sender: RwLock::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Queue a message for processing without waiting for a slot.
    pub async fn submit(&self, message_id: i64) -> Result<(), SubmitError> {
        let guard = self.sender.read().await;
        let sender = guard.as_ref().ok_or(SubmitError::Closed)?;

        QueueMetrics::record_enqueued();
        sender.try_send(message_id).map_err(|e| {
            QueueMetrics::record_dequeued();
            QueueMetrics::record_rejected();
            match e {
                mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
            }
        })
    }

    /// Stop accepting work and wait for queued messages to finish.
    ///
    /// Workers still busy after `drain_timeout` are left running. Returns
    /// whether every worker finished in time.
    pub async fn shutdown(&self, drain_timeout: Duration) -> bool {
        // Dropping the last sender lets workers exit once the queue is empty
        self.sender.write().await.take();

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        if handles.is_empty() {
            return true;
        }

        match timeout(drain_timeout, join_all(handles)).await {
            Ok(_) => {
                tracing::info!("Delivery worker pool drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = drain_timeout.as_secs(),
                    "Delivery worker pool did not drain in time"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker_id: usize,
    processor: Arc<MessageProcessor>,
    queue: Arc<Mutex<mpsc::Receiver<i64>>>,
) {
    loop {
        // Hold the lock only while waiting for the next id
        let next = { queue.lock().await.recv().await };
        let Some(message_id) = next else {
            break;
        };
        QueueMetrics::record_dequeued();

        match processor.process(message_id).await {
            Ok(outcome) => tracing::debug!(
                worker_id,
                message_id,
                status = %outcome.status,
                "Async message processed"
            ),
            Err(e) => tracing::warn!(
                worker_id,
                message_id,
                error = %e,
                "Async message processing failed"
            ),
        }
    }

    tracing::debug!(worker_id, "Delivery worker stopped");
}
