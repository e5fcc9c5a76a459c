//! External metric providers
//!
//! Providers are pulled once per monitor tick; whatever they return is
//! recorded into the metric store.

use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Source of metric values pulled on each tick
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Collect current values as `(metric name, value)` pairs
    async fn collect(&self) -> Result<Vec<(String, f64)>, CollaboratorError>;

    /// Provider name for log messages
    fn name(&self) -> &str;
}

/// Provider returning whatever values were last set
#[derive(Debug, Default)]
pub struct StaticProvider {
    values: Mutex<BTreeMap<String, f64>>,
}

impl StaticProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value reported for a metric
    pub fn set(&self, name: &str, value: f64) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value);
    }

    /// Stop reporting a metric
    pub fn unset(&self, name: &str) {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}

#[async_trait]
impl MetricProvider for StaticProvider {
    async fn collect(&self) -> Result<Vec<(String, f64)>, CollaboratorError> {
        Ok(self
            .values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Provider reading a JSON object of `name -> value` from a file on every pull
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    /// Create a provider for `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MetricProvider for JsonFileProvider {
    async fn collect(&self) -> Result<Vec<(String, f64)>, CollaboratorError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CollaboratorError::Provider {
                provider: self.path.display().to_string(),
                message: e.to_string(),
            })?;
        let values: BTreeMap<String, f64> = serde_json::from_str(&content)?;
        Ok(values.into_iter().collect())
    }

    fn name(&self) -> &str {
        "json-file"
    }
}
