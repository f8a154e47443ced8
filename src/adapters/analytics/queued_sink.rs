//! QueuedAnalyticsSink - Bounded, non-blocking analytics pipeline.
//!
//! The request path calls [`AnalyticsSink::emit`], which only ever does a
//! `try_send` into a bounded channel. A background [`AnalyticsWorker`]
//! drains the channel and hands each event to every configured writer
//! with a per-write timeout.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `capacity` | 10 000 | Events buffered before new ones are dropped |
//! | `write_timeout` | 500ms | Deadline for each writer call |
//!
//! ## Graceful Shutdown
//!
//! On shutdown the worker drains whatever is already queued, then stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::domain::analytics::{AnalyticsEvent, EventPayload};
use crate::ports::{AnalyticsSink, AnalyticsWriter};

#[derive(Debug, Clone)]
pub struct QueuedSinkConfig {
    pub capacity: usize,
    pub write_timeout: Duration,
}

impl Default for QueuedSinkConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            write_timeout: Duration::from_millis(500),
        }
    }
}

/// Sending half. Cheap to clone.
#[derive(Clone)]
pub struct QueuedAnalyticsSink {
    sender: mpsc::Sender<AnalyticsEvent>,
    dropped: Arc<AtomicU64>,
}

impl QueuedAnalyticsSink {
    /// Creates the sink and the worker that must be spawned to drain it.
    pub fn new(
        config: QueuedSinkConfig,
        writers: Vec<Arc<dyn AnalyticsWriter>>,
    ) -> (Self, AnalyticsWorker) {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let sink = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        let worker = AnalyticsWorker {
            receiver,
            writers,
            write_timeout: config.write_timeout,
        };
        (sink, worker)
    }

    /// Events dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AnalyticsSink for QueuedAnalyticsSink {
    fn emit(&self, event: AnalyticsEvent) {
        if let Err(e) = self.sender.try_send(event) {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            let (reason, event) = match e {
                mpsc::error::TrySendError::Full(event) => ("queue full", event),
                mpsc::error::TrySendError::Closed(event) => ("queue closed", event),
            };
            tracing::warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                dropped_total = total,
                reason,
                "Dropping analytics event"
            );
        }
    }
}

/// Receiving half; drains the queue into the writers.
pub struct AnalyticsWorker {
    receiver: mpsc::Receiver<AnalyticsEvent>,
    writers: Vec<Arc<dyn AnalyticsWriter>>,
    write_timeout: Duration,
}

impl AnalyticsWorker {
    /// Runs until shutdown is signalled or every sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let drained = self.drain().await;
                        tracing::info!(drained, "Analytics worker stopped");
                        return;
                    }
                }
                next = self.receiver.recv() => match next {
                    Some(event) => self.deliver(&event).await,
                    None => {
                        tracing::info!("Analytics queue closed, worker stopping");
                        return;
                    }
                },
            }
        }
    }

    /// Delivers everything currently queued without waiting for more.
    pub async fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.receiver.try_recv() {
            self.deliver(&event).await;
            count += 1;
        }
        count
    }

    async fn deliver(&self, event: &AnalyticsEvent) {
        for writer in &self.writers {
            let write = async {
                writer.append_analytics_event(event).await?;
                if let EventPayload::Feedback(feedback) = &event.payload {
                    writer.append_feedback(feedback).await?;
                }
                Ok::<(), crate::domain::foundation::DomainError>(())
            };

            match tokio::time::timeout(self.write_timeout, write).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    event_id = %event.event_id,
                    error = %e,
                    "Analytics write failed, event dropped for this writer"
                ),
                Err(_) => tracing::warn!(
                    event_id = %event.event_id,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Analytics write timed out, event dropped for this writer"
                ),
            }
        }
    }
}
