//! Fire-and-forget click recording.
//!
//! The redirect path never waits on recording: `record` bumps an in-memory
//! counter and queues the event row onto an mpsc channel. A worker task
//! inserts event rows as they arrive and flushes accumulated counter
//! increments to storage on an interval. Failures are logged and dropped;
//! nothing propagates back to the caller.

use crate::models::NewClickEvent;
use crate::storage::LinkStore;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Request metadata captured for one click.
#[derive(Debug, Clone, Default)]
pub struct ClickRequest {
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Counter increments pending flush for one link.
#[derive(Debug, Clone, Copy)]
struct Pending {
    count: i64,
    last_access: i64,
}

enum WorkerMessage {
    Record(NewClickEvent),
    /// Flush buffered counter increments, then ack.
    Flush(oneshot::Sender<()>),
    /// Final flush, ack, stop the worker.
    Shutdown(oneshot::Sender<()>),
}

pub struct ClickRecorder {
    tx: mpsc::Sender<WorkerMessage>,
    counters: Arc<DashMap<i64, Pending>>,
}

impl ClickRecorder {
    pub fn new(store: Arc<dyn LinkStore>, queue_capacity: usize, flush_interval_secs: u64) -> Self {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let counters: Arc<DashMap<i64, Pending>> = Arc::new(DashMap::new());

        let worker = Worker {
            rx,
            store,
            counters: Arc::clone(&counters),
            flush_interval: Duration::from_secs(flush_interval_secs),
        };
        tokio::spawn(worker.run());

        Self { tx, counters }
    }

    /// Record one click. Never blocks and never fails the caller; a full
    /// queue drops the event row with a warning (the counter bump survives).
    pub fn record(&self, link_id: i64, request: ClickRequest) {
        let timestamp = chrono::Utc::now().timestamp();

        self.counters
            .entry(link_id)
            .and_modify(|p| {
                p.count += 1;
                p.last_access = p.last_access.max(timestamp);
            })
            .or_insert(Pending {
                count: 1,
                last_access: timestamp,
            });

        let event = NewClickEvent {
            link_id,
            timestamp,
            source_ip: request.source_ip,
            user_agent: request.user_agent,
            referrer: request.referrer,
        };

        if self.tx.try_send(WorkerMessage::Record(event)).is_err() {
            warn!(link_id, "click queue full, dropping event");
        }
    }

    /// Flush pending counter increments and wait for the write to finish.
    /// Queued event rows ahead of the flush message are processed first.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WorkerMessage::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Drain the queue, flush counters and stop the worker.
    pub async fn shutdown(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WorkerMessage::Shutdown(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

struct Worker {
    rx: mpsc::Receiver<WorkerMessage>,
    store: Arc<dyn LinkStore>,
    counters: Arc<DashMap<i64, Pending>>,
    flush_interval: Duration,
}

impl Worker {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        // The first tick fires immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                msg = self.rx.recv() => {
                    match msg {
                        Some(WorkerMessage::Record(event)) => self.insert_event(event).await,
                        Some(WorkerMessage::Flush(ack)) => {
                            self.flush_counters().await;
                            let _ = ack.send(());
                        }
                        Some(WorkerMessage::Shutdown(ack)) => {
                            self.drain_queue().await;
                            self.flush_counters().await;
                            let _ = ack.send(());
                            info!("click recorder stopped");
                            break;
                        }
                        None => {
                            self.flush_counters().await;
                            break;
                        }
                    }
                }
                _ = ticker.tick() => {
                    self.flush_counters().await;
                }
            }
        }
    }

    async fn insert_event(&self, event: NewClickEvent) {
        if let Err(err) = self.store.insert_click(&event).await {
            warn!(link_id = event.link_id, error = %err, "failed to persist click event");
        }
    }

    /// Process whatever is already queued, without waiting for more.
    async fn drain_queue(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                WorkerMessage::Record(event) => self.insert_event(event).await,
                WorkerMessage::Flush(ack) => {
                    self.flush_counters().await;
                    let _ = ack.send(());
                }
                WorkerMessage::Shutdown(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }

    async fn flush_counters(&self) {
        let link_ids: Vec<i64> = self.counters.iter().map(|entry| *entry.key()).collect();

        for link_id in link_ids {
            if let Some((_, pending)) = self.counters.remove(&link_id) {
                if let Err(err) = self
                    .store
                    .increment_clicks(link_id, pending.count, pending.last_access)
                    .await
                {
                    warn!(link_id, error = %err, "failed to flush click counters");
                }
            }
        }
    }
}
