//! Background invalidation.
//!
//! Writers hand purge requests to the dispatcher after their transaction
//! commits and return immediately. A single worker task drains the queue in
//! order and retries failed purges with exponential backoff. Nothing here
//! ever fails the write path: a full queue drops the request, and a purge
//! that exhausts its attempts is logged and counted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use forum_core::{DataConfig, EntityType, ForumResult, Identifier, Scope};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::invalidate::Invalidator;
use crate::telemetry;

/// One unit of invalidation work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeRequest {
    /// Every scope of an entity, with cascades.
    Entity {
        entity_type: EntityType,
        id: Identifier,
    },
    /// A single scope of an entity.
    Scope {
        scope: Scope,
        entity_type: EntityType,
        id: Identifier,
    },
}

impl PurgeRequest {
    pub fn entity(entity_type: EntityType, id: impl Into<Identifier>) -> Self {
        PurgeRequest::Entity {
            entity_type,
            id: id.into(),
        }
    }

    pub fn scope(scope: Scope, entity_type: EntityType, id: impl Into<Identifier>) -> Self {
        PurgeRequest::Scope {
            scope,
            entity_type,
            id: id.into(),
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            PurgeRequest::Entity { entity_type, .. } | PurgeRequest::Scope { entity_type, .. } => {
                *entity_type
            }
        }
    }

    pub fn id(&self) -> &Identifier {
        match self {
            PurgeRequest::Entity { id, .. } | PurgeRequest::Scope { id, .. } => id,
        }
    }

    async fn execute(&self, invalidator: &Invalidator) -> ForumResult<usize> {
        match self {
            PurgeRequest::Entity { entity_type, id } => {
                invalidator.try_purge(*entity_type, id.clone()).await
            }
            PurgeRequest::Scope {
                scope,
                entity_type,
                id,
            } => {
                invalidator
                    .try_purge_scope(*scope, *entity_type, id.clone())
                    .await
            }
        }
    }
}

/// Counters since the dispatcher was started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub enqueued: u64,
    pub purged: u64,
    /// Individual retry attempts, not requests.
    pub retried: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct DispatchCounters {
    enqueued: AtomicU64,
    purged: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl DispatchCounters {
    fn record(&self, counter: &AtomicU64, request: &PurgeRequest, outcome: &str) {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(metrics) = telemetry::metrics() {
            metrics.record_invalidation(request.entity_type().as_str(), outcome);
        }
    }

    fn record_dropped(&self, request: &PurgeRequest, reason: &str) {
        tracing::warn!(
            entity = %request.entity_type(),
            id = %request.id(),
            reason,
            "cache purge dropped"
        );
        self.record(&self.dropped, request, "dropped");
    }
}

enum Message {
    Purge(PurgeRequest),
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Queue plus worker task for purge requests.
pub struct InvalidationDispatcher {
    sender: mpsc::Sender<Message>,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<DispatchCounters>,
    closed: AtomicBool,
}

impl InvalidationDispatcher {
    /// Start the worker. Must be called from within a Tokio runtime.
    pub fn spawn(invalidator: Invalidator, config: &DataConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.invalidation_queue.max(1));
        let counters = Arc::new(DispatchCounters::default());
        let worker = Worker {
            invalidator,
            receiver,
            counters: Arc::clone(&counters),
            max_attempts: config.invalidation_max_attempts.max(1),
            backoff: config.invalidation_backoff,
        };
        let handle = tokio::spawn(worker.run());

        tracing::info!(
            queue = config.invalidation_queue,
            max_attempts = config.invalidation_max_attempts,
            "invalidation dispatcher started"
        );

        Self {
            sender,
            worker: Mutex::new(Some(handle)),
            counters,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a request without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, request: PurgeRequest) -> bool {
        if self.closed.load(Ordering::Acquire) {
            self.record_dropped(&request, "dispatcher is shut down");
            return false;
        }

        match self.sender.try_send(Message::Purge(request)) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                let reason = match &e {
                    TrySendError::Full(_) => "queue full",
                    TrySendError::Closed(_) => "worker stopped",
                };
                if let Message::Purge(request) = e.into_inner() {
                    self.record_dropped(&request, reason);
                }
                false
            }
        }
    }

    pub fn purge(&self, entity_type: EntityType, id: impl Into<Identifier>) -> bool {
        self.enqueue(PurgeRequest::entity(entity_type, id))
    }

    pub fn purge_scope(&self, scope: Scope, entity_type: EntityType, id: impl Into<Identifier>) -> bool {
        self.enqueue(PurgeRequest::scope(scope, entity_type, id))
    }

    /// Wait until every request queued before this call has been processed.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(Message::Flush(ack)).await.is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Stop accepting requests, drain the queue and join the worker.
    /// Calling it twice is harmless.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);

        let (ack, done) = oneshot::channel();
        if self.sender.send(Message::Shutdown(ack)).await.is_ok() {
            let _ = done.await;
        }

        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "invalidation worker panicked");
            }
        }
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            purged: self.counters.purged.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    fn record_dropped(&self, request: &PurgeRequest, reason: &str) {
        self.counters.record_dropped(request, reason);
    }
}

struct Worker {
    invalidator: Invalidator,
    receiver: mpsc::Receiver<Message>,
    counters: Arc<DispatchCounters>,
    max_attempts: u32,
    backoff: Duration,
}

impl Worker {
    async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            match message {
                Message::Purge(request) => self.process(&request).await,
                Message::Flush(ack) => {
                    let _ = ack.send(());
                }
                Message::Shutdown(ack) => {
                    let _ = ack.send(());
                    break;
                }
            }
        }
        self.drain_after_shutdown();
        tracing::info!("invalidation dispatcher stopped");
    }

    /// Requests that raced past the closed check land behind `Shutdown`.
    fn drain_after_shutdown(&mut self) {
        self.receiver.close();
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                Message::Purge(request) => {
                    self.counters.record_dropped(&request, "dispatcher is shut down")
                }
                Message::Flush(ack) | Message::Shutdown(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }

    /// Run one request with retry and exponential backoff.
    async fn process(&self, request: &PurgeRequest) {
        let mut attempts = 0;
        let mut backoff = self.backoff;

        loop {
            attempts += 1;
            match request.execute(&self.invalidator).await {
                Ok(deleted) => {
                    tracing::debug!(
                        entity = %request.entity_type(),
                        id = %request.id(),
                        deleted,
                        attempts,
                        "cache purge completed"
                    );
                    self.counters
                        .record(&self.counters.purged, request, "purged");
                    return;
                }
                Err(e) => {
                    if attempts >= self.max_attempts {
                        tracing::error!(
                            entity = %request.entity_type(),
                            id = %request.id(),
                            attempts,
                            error = %e,
                            "cache purge failed after all retries"
                        );
                        self.counters
                            .record(&self.counters.failed, request, "failed");
                        return;
                    }

                    tracing::warn!(
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "cache purge failed, retrying"
                    );
                    self.counters
                        .record(&self.counters.retried, request, "retried");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
            }
        }
    }
}
