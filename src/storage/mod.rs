//! Durable storage collaborators
//!
//! The core mirrors metric points and alerts to a [`DurableStore`] on a
//! fire-and-forget basis: writes run on spawned tasks and failures are only
//! logged, never surfaced to the caller that recorded the data.

mod jsonl;

pub use jsonl::JsonLinesStore;

use crate::alerts::Alert;
use crate::error::CollaboratorError;
use crate::metrics::MetricPoint;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use tokio::task::JoinHandle;

/// Persistence interface for metrics and alerts
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Store one metric point
    async fn persist_metric(&self, name: &str, point: &MetricPoint)
        -> Result<(), CollaboratorError>;

    /// Store a newly triggered alert
    async fn persist_alert(&self, alert: &Alert) -> Result<(), CollaboratorError>;

    /// Store the resolution time of an alert
    async fn persist_alert_resolution(
        &self,
        id: &str,
        resolved_at: SystemTime,
    ) -> Result<(), CollaboratorError>;

    /// Store name for log messages
    fn name(&self) -> &str;
}

/// One persisted record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredRecord {
    Metric { name: String, point: MetricPoint },
    Alert { alert: Alert },
    Resolution { id: String, resolved_at: SystemTime },
}

/// Store that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl DurableStore for NullStore {
    async fn persist_metric(&self, _: &str, _: &MetricPoint) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn persist_alert(&self, _: &Alert) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn persist_alert_resolution(
        &self,
        _: &str,
        _: SystemTime,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// In-memory store, mainly useful for inspecting what was persisted
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything persisted so far, in arrival order
    pub fn records(&self) -> Vec<StoredRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, record: StoredRecord) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn persist_metric(
        &self,
        name: &str,
        point: &MetricPoint,
    ) -> Result<(), CollaboratorError> {
        self.push(StoredRecord::Metric {
            name: name.to_string(),
            point: point.clone(),
        });
        Ok(())
    }

    async fn persist_alert(&self, alert: &Alert) -> Result<(), CollaboratorError> {
        self.push(StoredRecord::Alert {
            alert: alert.clone(),
        });
        Ok(())
    }

    async fn persist_alert_resolution(
        &self,
        id: &str,
        resolved_at: SystemTime,
    ) -> Result<(), CollaboratorError> {
        self.push(StoredRecord::Resolution {
            id: id.to_string(),
            resolved_at,
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Background persistence writes owned by one component
///
/// Writes stay fire-and-forget for callers; [`PendingWrites::flush`] waits for
/// the ones spawned so far so they finish before the runtime goes away.
#[derive(Debug, Default)]
pub struct PendingWrites {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PendingWrites {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run a persistence write in the background, logging failures
    ///
    /// Outside a tokio runtime the write is skipped.
    pub fn spawn<F>(&self, store: &str, what: &'static str, write: F)
    where
        F: Future<Output = Result<(), CollaboratorError>> + Send + 'static,
    {
        let store = store.to_string();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(async move {
                    if let Err(e) = write.await {
                        log::warn!("Failed to persist {} to {} store: {}", what, store, e);
                    }
                });
                let mut handles = self.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
            }
            Err(_) => {
                log::debug!("No async runtime, skipping persistence of {}", what);
            }
        }
    }

    /// Writes spawned and not yet flushed or finished
    pub fn in_flight(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every write spawned so far, returning how many were awaited
    pub async fn flush(&self) -> usize {
        let handles = std::mem::take(&mut *self.lock());
        let count = handles.len();
        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("Persistence task did not complete: {}", e);
            }
        }
        count
    }
}
