//! JSON-lines file store
//!
//! Appends one tagged [`StoredRecord`] per line.

use super::{DurableStore, StoredRecord};
use crate::alerts::Alert;
use crate::error::CollaboratorError;
use crate::metrics::MetricPoint;
use async_trait::async_trait;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Durable store that appends records to a file
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl JsonLinesStore {
    /// Create a store writing to `path` (created on first write)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// File the store writes to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record in the file
    pub fn read_all(&self) -> Result<Vec<StoredRecord>, CollaboratorError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CollaboratorError::from))
            .collect()
    }

    async fn append(&self, record: StoredRecord) -> Result<(), CollaboratorError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let path = self.path.clone();
        let write_lock = Arc::clone(&self.write_lock);

        tokio::task::spawn_blocking(move || -> Result<(), CollaboratorError> {
            let _guard = write_lock.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            Ok(())
        })
        .await
        .map_err(|e| CollaboratorError::Persistence(format!("write task failed: {}", e)))?
    }
}

#[async_trait]
impl DurableStore for JsonLinesStore {
    async fn persist_metric(
        &self,
        name: &str,
        point: &MetricPoint,
    ) -> Result<(), CollaboratorError> {
        self.append(StoredRecord::Metric {
            name: name.to_string(),
            point: point.clone(),
        })
        .await
    }

    async fn persist_alert(&self, alert: &Alert) -> Result<(), CollaboratorError> {
        self.append(StoredRecord::Alert {
            alert: alert.clone(),
        })
        .await
    }

    async fn persist_alert_resolution(
        &self,
        id: &str,
        resolved_at: SystemTime,
    ) -> Result<(), CollaboratorError> {
        self.append(StoredRecord::Resolution {
            id: id.to_string(),
            resolved_at,
        })
        .await
    }

    fn name(&self) -> &str {
        "jsonl"
    }
}
