//! # Automation Logger
//!
//! Queues execution and communication records in memory and persists them in
//! batches. A failed batch write puts the batch back at the front of the
//! queue, in order, so records are delayed rather than lost. Records still
//! queued when the process exits are lost; `AutomationOrchestrator::stop`
//! performs a final flush to narrow that window.
//!
//! Also serves the dashboard read API and retention cleanup.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{AutomationError, Result};
use crate::models::{
    CleanupReport, CommunicationRecord, DateRange, ExecutionRecord, ExecutionStatistics,
    LogFilters, PagedResult,
};
use crate::store::LogStore;

/// Automations listed in statistics
pub const TOP_AUTOMATIONS: usize = 10;

/// One queued audit record
#[derive(Debug, Clone, PartialEq)]
pub enum LogEntry {
    Execution(ExecutionRecord),
    Communication(CommunicationRecord),
}

pub struct AutomationLogger {
    store: Arc<dyn LogStore>,
    queue: Mutex<VecDeque<LogEntry>>,
    /// Serializes flushes so requeued batches keep their position
    flush_lock: tokio::sync::Mutex<()>,
    batch_size: usize,
}

impl std::fmt::Debug for AutomationLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationLogger")
            .field("batch_size", &self.batch_size)
            .field("queued", &self.queued_len())
            .finish_non_exhaustive()
    }
}

impl AutomationLogger {
    pub fn new(store: Arc<dyn LogStore>, batch_size: usize) -> Self {
        Self {
            store,
            queue: Mutex::new(VecDeque::new()),
            flush_lock: tokio::sync::Mutex::new(()),
            batch_size: batch_size.max(1),
        }
    }

    /// Queue an execution record; a full batch triggers a flush
    pub async fn log_execution(&self, record: ExecutionRecord) {
        self.enqueue(LogEntry::Execution(record)).await;
    }

    pub async fn log_communication(&self, record: CommunicationRecord) {
        self.enqueue(LogEntry::Communication(record)).await;
    }

    async fn enqueue(&self, entry: LogEntry) {
        let queued = {
            let mut queue = self.queue.lock();
            queue.push_back(entry);
            queue.len()
        };
        if queued >= self.batch_size {
            if let Err(e) = self.flush().await {
                warn!(queued, error = %e, "Batch flush failed; records stay queued");
            }
        }
    }

    pub fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Persist everything queued, returning how many records were written
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<usize> {
        let _guard = self.flush_lock.lock().await;
        let batch: Vec<LogEntry> = self.queue.lock().drain(..).collect();
        if batch.is_empty() {
            return Ok(0);
        }

        let mut executions = Vec::new();
        let mut communications = Vec::new();
        for entry in &batch {
            match entry {
                LogEntry::Execution(record) => executions.push(record.clone()),
                LogEntry::Communication(record) => communications.push(record.clone()),
            }
        }

        match self.store.write_batch(&executions, &communications).await {
            Ok(()) => {
                debug!(
                    executions = executions.len(),
                    communications = communications.len(),
                    "Flushed automation log batch"
                );
                Ok(batch.len())
            }
            Err(e) => {
                let count = batch.len();
                let mut queue = self.queue.lock();
                for entry in batch.into_iter().rev() {
                    queue.push_front(entry);
                }
                warn!(requeued = count, error = %e, "Log batch write failed; requeued");
                Err(e)
            }
        }
    }

    /// Flush before a read so the caller sees its own recent writes
    async fn flush_for_read(&self) {
        if let Err(e) = self.flush().await {
            warn!(error = %e, "Pre-read flush failed; results may lag");
        }
    }

    /// Paged execution log, newest first; failures are returned like any other status
    pub async fn get_logs(
        &self,
        filters: &LogFilters,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<ExecutionRecord>> {
        self.flush_for_read().await;
        self.store.query_executions(filters, page, page_size).await
    }

    pub async fn get_communications(
        &self,
        customer_id: Option<Uuid>,
        page: u32,
        page_size: u32,
    ) -> Result<PagedResult<CommunicationRecord>> {
        self.flush_for_read().await;
        self.store
            .query_communications(customer_id, page, page_size)
            .await
    }

    pub async fn get_statistics(&self, range: DateRange) -> Result<ExecutionStatistics> {
        self.flush_for_read().await;
        self.store.execution_statistics(range, TOP_AUTOMATIONS).await
    }

    /// Permanently delete execution and communication records older than
    /// `retention_days`.
    ///
    /// This is a hard delete: removed records are not archived and cannot be
    /// recovered.
    #[instrument(skip(self))]
    pub async fn cleanup_old_logs(&self, retention_days: i64) -> Result<CleanupReport> {
        if retention_days <= 0 {
            return Err(AutomationError::invalid_state(format!(
                "retention_days must be positive, got {retention_days}"
            )));
        }
        let cutoff = chrono::Duration::try_days(retention_days)
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                AutomationError::invalid_state(format!(
                    "retention_days {retention_days} is out of range"
                ))
            })?;
        let report = self.store.delete_older_than(cutoff).await?;
        info!(
            cutoff = %cutoff,
            executions_deleted = report.executions_deleted,
            communications_deleted = report.communications_deleted,
            "Hard-deleted automation logs past retention"
        );
        Ok(report)
    }

    /// Flush on a fixed interval until `shutdown` is notified
    pub fn spawn_flush_loop(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: Arc<Notify>,
    ) -> JoinHandle<()> {
        let logger = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = logger.flush().await {
                            warn!(error = %e, "Periodic log flush failed");
                        }
                    }
                    _ = shutdown.notified() => {
                        debug!("Log flush loop shutting down");
                        break;
                    }
                }
            }
        })
    }
}
