//! Batched upload of the activity log.
//!
//! The log is read in batches sized from the memory currently free, each
//! batch is handed to the [`Collector`], and, when asked to, a batch is
//! deleted from the log only after the collector accepted it. Batches are
//! never deleted on failure; they are retried on the next run.
//!
//! ```text
//!   start = 1, remaining = count
//!   loop while start <= remaining:
//!       end = min(start + batch - 1, remaining)
//!       push lines start..=end
//!         accepted + delete  -> delete start..=end, remaining -= len   (start stays)
//!         otherwise          -> start = end + 1
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use gatehouse_store::LineStore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ErrorKind,
    env::Environment,
    logbook::{LogBook, LogError, LogRecord},
};

/// Errors reported by a collector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectError {
    /// Transport-level failure: DNS, connect, TLS, timeout.
    #[error("collector unreachable: {0}")]
    Unreachable(String),

    /// The collector answered with a non-success status.
    #[error("collector rejected batch with status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },
}

impl CollectError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreachable(_) => ErrorKind::Unreachable,
            Self::Rejected { .. } => ErrorKind::Rejected,
        }
    }
}

/// Remote endpoint accepting batches of log records.
#[async_trait]
pub trait Collector: Send + Sync + 'static {
    /// Push one batch. `Ok` means the collector durably accepted it.
    async fn push_batch(&self, records: &[LogRecord]) -> Result<(), CollectError>;
}

#[async_trait]
impl<C: Collector + ?Sized> Collector for Arc<C> {
    async fn push_batch(&self, records: &[LogRecord]) -> Result<(), CollectError> {
        (**self).push_batch(records).await
    }
}

/// Batch sizing for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Free memory is divided by this before sizing a batch.
    pub safety_factor: u64,
    /// Memory charged per record in a batch.
    pub record_footprint: u64,
    /// Upper bound on records per batch.
    pub max_batch: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { safety_factor: 4, record_footprint: 290, max_batch: 200 }
    }
}

impl SyncConfig {
    /// Records per batch given `free_memory` bytes. Always at least one.
    pub fn batch_size(&self, free_memory: u64) -> usize {
        let fit = free_memory / self.safety_factor.max(1) / self.record_footprint.max(1);
        (usize::try_from(fit).unwrap_or(usize::MAX)).clamp(1, self.max_batch.max(1))
    }
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Batches attempted.
    pub batches: usize,
    /// Batches the collector accepted.
    pub accepted: usize,
    /// Records in accepted batches.
    pub pushed: usize,
    /// Records deleted from the log.
    pub deleted: usize,
}

/// Overall result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Every batch was accepted (also an empty log).
    Complete,
    /// Some but not all batches were accepted.
    Partial,
    /// No batch was accepted.
    Failed,
}

impl SyncReport {
    /// Overall result.
    pub fn status(&self) -> SyncStatus {
        if self.accepted == self.batches {
            SyncStatus::Complete
        } else if self.accepted > 0 {
            SyncStatus::Partial
        } else {
            SyncStatus::Failed
        }
    }
}

/// Errors that stop a run before it finishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Reading or deleting log lines failed.
    #[error("sync aborted: {0}")]
    Log(#[from] LogError),

    /// Single-record push failed.
    #[error(transparent)]
    Collect(#[from] CollectError),
}

impl SyncError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Log(err) => err.kind(),
            Self::Collect(err) => err.kind(),
        }
    }
}

/// Uploads the log to a collector.
///
/// Runs are serialized: a second `sync_all` waits for the first to finish.
pub struct SyncClient<S: LineStore, C: Collector, E: Environment> {
    book: Arc<LogBook<S>>,
    collector: C,
    env: E,
    config: SyncConfig,
    running: tokio::sync::Mutex<()>,
}

impl<S: LineStore, C: Collector, E: Environment> SyncClient<S, C, E> {
    /// Create a client uploading `book` to `collector`.
    pub fn new(book: Arc<LogBook<S>>, collector: C, env: E, config: SyncConfig) -> Self {
        Self { book, collector, env, config, running: tokio::sync::Mutex::new(()) }
    }

    /// The collector in use.
    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// Upload every line present when the run starts.
    ///
    /// With `delete_on_success`, each accepted batch is removed from the log.
    /// Collector failures are counted in the report, not returned.
    ///
    /// # Errors
    ///
    /// `Log` if the log table cannot be read or an accepted batch cannot be
    /// deleted. The run stops at that point.
    pub async fn sync_all(&self, delete_on_success: bool) -> Result<SyncReport, SyncError> {
        let _running = self.running.lock().await;

        let mut report = SyncReport::default();
        let mut remaining = self.book.count();
        let mut start = 1;

        while start <= remaining {
            let size = self.config.batch_size(self.env.free_memory());
            let end = (start + size - 1).min(remaining);
            let batch = self.book.read_batch(start, end)?;
            report.batches += 1;

            match self.collector.push_batch(&batch.records()).await {
                Ok(()) => {
                    report.accepted += 1;
                    report.pushed += batch.len();
                    tracing::debug!(start, end, "batch accepted");

                    if delete_on_success {
                        let removed = self.book.delete_batch(&batch)?;
                        report.deleted += removed;
                        if removed == batch.len() {
                            remaining -= removed;
                            continue;
                        }
                    }
                },
                Err(err) => {
                    tracing::warn!(start, end, %err, "batch not accepted");
                },
            }
            start = end + 1;
        }

        match report.status() {
            SyncStatus::Complete => tracing::info!(?report, "log sync complete"),
            SyncStatus::Partial | SyncStatus::Failed => {
                tracing::warn!(?report, "log sync incomplete");
            },
        }
        Ok(report)
    }

    /// Push a single record outside the batch loop.
    pub async fn push_one(&self, record: LogRecord) -> Result<(), SyncError> {
        self.collector.push_batch(std::slice::from_ref(&record)).await?;
        Ok(())
    }
}
