//! Bounded request queue and the single deployment worker.
//!
//! Ingestion holds cloned [`DeploymentQueue`] handles and only ever enqueues.
//! Exactly one [`Worker`] exists per queue; it runs one deployment at a time,
//! which is the only concurrency control the cluster needs.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{error, info, warn, Instrument};

use crate::{DeployError, DeploymentOutcome, DeploymentRequest, LifecycleState, Orchestrator, QueueError};

/// Pending requests accepted before enqueue starts waiting.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Something that can carry a request to completion.
///
/// Implemented by [`Orchestrator`]; tests substitute their own.
#[async_trait]
pub trait DeploymentHandler: Send + Sync + 'static {
    /// Processes one request.
    async fn handle(&self, request: DeploymentRequest) -> Result<DeploymentOutcome, DeployError>;
}

#[async_trait]
impl DeploymentHandler for Orchestrator {
    async fn handle(&self, request: DeploymentRequest) -> Result<DeploymentOutcome, DeployError> {
        self.deploy(request).await
    }
}

/// Creates a queue holding up to `capacity` pending requests and its worker.
pub fn deployment_queue(capacity: usize) -> (DeploymentQueue, Worker) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (DeploymentQueue { sender }, Worker { receiver })
}

/// Producer side of the deployment queue.
#[derive(Debug, Clone)]
pub struct DeploymentQueue {
    sender: mpsc::Sender<DeploymentRequest>,
}

impl DeploymentQueue {
    /// Enqueues `request`, waiting for space when the queue is full.
    ///
    /// Waiting pushes back on the event source instead of dropping events.
    pub async fn enqueue(&self, request: DeploymentRequest) -> Result<(), QueueError> {
        info!(deployment_id = %request.id, pr = %request.number, "enqueueing deployment");
        self.sender.send(request).await.map_err(|_| QueueError::Closed)
    }

    /// Enqueues `request` only if there is space right now.
    pub fn try_enqueue(&self, request: DeploymentRequest) -> Result<(), QueueError> {
        self.sender.try_send(request).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Free slots before [`Self::enqueue`] starts waiting.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// Consumer side of the deployment queue.
#[derive(Debug)]
pub struct Worker {
    receiver: mpsc::Receiver<DeploymentRequest>,
}

impl Worker {
    /// Processes requests in FIFO order until every [`DeploymentQueue`]
    /// handle has been dropped. Returns the number of requests processed.
    ///
    /// Each request runs in its own task which the worker awaits before
    /// taking the next, so a panic while deploying is logged like any other
    /// failure and the loop carries on.
    pub async fn run<H: DeploymentHandler>(mut self, handler: Arc<H>) -> usize {
        let mut processed = 0;
        while let Some(request) = self.receiver.recv().await {
            processed += 1;
            let span = tracing::info_span!("deployment", deployment_id = %request.id);
            span.in_scope(|| {
                info!(
                    received_at = %request.received_at,
                    queued_ms = request.received_at.elapsed_ms(),
                    "deployment dequeued"
                );
            });
            let handler = Arc::clone(&handler);
            let task = tokio::spawn(
                async move { handler.handle(request).await }.instrument(span.clone()),
            );
            let result = task.await;

            let _entered = span.enter();
            match result {
                Ok(Ok(outcome)) => match outcome.state() {
                    LifecycleState::Failed => {
                        let reason = outcome
                            .failure
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        warn!(reason = %reason, "deployment failed");
                    }
                    state => info!(%state, applied = outcome.applied.len(), "deployment finished"),
                },
                Ok(Err(err)) => error!(error = %err, "error processing deployment"),
                Err(join) if join.is_panic() => error!("deployment panicked"),
                Err(join) => error!(error = %join, "deployment task aborted"),
            }
        }
        info!(processed, "deployment queue closed; worker stopping");
        processed
    }
}
