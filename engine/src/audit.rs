//! Audit writer: a bounded queue drained by one dedicated task.
//!
//! Producers call [`AuditHandle::record`], which never waits. When the
//! queue is full the newest record is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use wordchain_store::AuditStore;
use wordchain_types::{AuditRecord, HistoryEntry, LogLevel, Platform, SystemLogEntry};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct AuditHandle {
    tx: mpsc::Sender<AuditRecord>,
    dropped: Arc<AtomicU64>,
}

impl AuditHandle {
    /// Enqueue without blocking. Returns `false` if the record was dropped.
    pub fn record(&self, record: AuditRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    warn!(dropped, "Audit queue full, dropping records");
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Audit writer has stopped, dropping record");
                false
            }
        }
    }

    pub fn history(
        &self,
        actor: &str,
        platform: &Platform,
        input_word: &str,
        previous_word: &str,
        status: &str,
        at: DateTime<Utc>,
    ) -> bool {
        self.record(AuditRecord::History(HistoryEntry {
            actor: actor.to_string(),
            platform: platform.to_string(),
            input_word: input_word.to_string(),
            previous_word: previous_word.to_string(),
            status: status.to_string(),
            at,
        }))
    }

    pub fn system(
        &self,
        level: LogLevel,
        source: &str,
        message: impl Into<String>,
        detail: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        self.record(AuditRecord::System(SystemLogEntry {
            level,
            source: source.to_string(),
            message: message.into(),
            detail,
            at,
        }))
    }

    /// Records dropped since the writer started.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Start the writer task. It exits once every handle is dropped and the
/// queue is drained, returning how many records it persisted.
pub fn spawn_audit_writer(
    store: Arc<dyn AuditStore>,
    capacity: usize,
) -> (AuditHandle, JoinHandle<u64>) {
    let (tx, mut rx) = mpsc::channel::<AuditRecord>(capacity.max(1));
    let handle = AuditHandle {
        tx,
        dropped: Arc::new(AtomicU64::new(0)),
    };

    let task = tokio::spawn(async move {
        let mut written = 0_u64;
        while let Some(record) = rx.recv().await {
            let store = Arc::clone(&store);
            let result = tokio::task::spawn_blocking(move || store.append_audit(&record)).await;
            match result {
                Ok(Ok(())) => written += 1,
                Ok(Err(err)) => warn!(error = %err, "Failed to write audit record"),
                Err(err) => warn!(error = %err, "Audit write task panicked"),
            }
        }
        debug!(written, "Audit writer stopped");
        written
    });

    (handle, task)
}
