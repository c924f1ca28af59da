//! Audit writer - fire-and-forget operation log.
//!
//! Flow:
//! 1. A storage operation calls `record()` which `try_send`s onto a bounded queue
//! 2. One writer task drains the queue into the `AuditSink`
//! 3. Sink failures and queue overflows are counted, never surfaced
//!
//! `flush()` travels through the same queue, so it resolves only after every
//! entry recorded before it has reached the sink.

use crate::domain::entities::OperationLogEntry;
use crate::ports::outbound::AuditSink;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counters for the audit trail.
#[derive(Debug, Default)]
pub struct AuditStats {
    /// Entries the sink accepted
    pub written: AtomicU64,
    /// Entries the sink rejected
    pub failed: AtomicU64,
    /// Entries discarded because the queue was full or closed
    pub dropped: AtomicU64,
}

impl AuditStats {
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

enum AuditCommand {
    Record(OperationLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Handle to the audit writer task.
pub struct AuditLog {
    sender: Mutex<Option<mpsc::Sender<AuditCommand>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<AuditStats>,
}

impl AuditLog {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn<S: AuditSink>(sink: S, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(AuditStats::default());
        let writer = tokio::spawn(writer_task(sink, rx, Arc::clone(&stats)));

        Self {
            sender: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
            stats,
        }
    }

    /// Enqueue an entry without waiting.
    pub fn record(&self, entry: OperationLogEntry) {
        let guard = self.sender.lock();
        let Some(tx) = guard.as_ref() else {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };

        if let Err(e) = tx.try_send(AuditCommand::Record(entry)) {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            match e {
                mpsc::error::TrySendError::Full(_) => warn!("Audit queue full, entry dropped"),
                mpsc::error::TrySendError::Closed(_) => warn!("Audit writer gone, entry dropped"),
            }
        }
    }

    /// Wait until everything recorded so far has been handed to the sink.
    pub async fn flush(&self) {
        let tx = self.sender.lock().clone();
        let Some(tx) = tx else {
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(AuditCommand::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Stop accepting entries, drain the queue and stop the writer.
    pub async fn close(&self) {
        // Dropping the last sender ends the writer loop once the queue is empty.
        drop(self.sender.lock().take());

        let writer = self.writer.lock().take();
        if let Some(handle) = writer {
            if let Err(e) = handle.await {
                warn!(error = %e, "Audit writer task ended abnormally");
            }
        }
    }

    pub fn stats(&self) -> &AuditStats {
        &self.stats
    }
}

async fn writer_task<S: AuditSink>(
    sink: S,
    mut rx: mpsc::Receiver<AuditCommand>,
    stats: Arc<AuditStats>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            AuditCommand::Record(entry) => match sink.append(&entry).await {
                Ok(()) => {
                    stats.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        username = %entry.username,
                        operation = entry.operation.audit_label(),
                        storage_key = ?entry.storage_key,
                        error = %e,
                        "Error logging operation"
                    );
                }
            },
            AuditCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!("Audit writer stopped");
}
