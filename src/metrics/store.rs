//! Bounded in-memory metric time series
//!
//! Each metric name owns a timestamp-ordered series of at most `max_points_per_series`
//! points. Recording is synchronous; points are also mirrored to a durable store
//! in the background, [`NullStore`] unless one is attached.

use crate::clock::Clock;
use crate::storage::{DurableStore, NullStore, PendingWrites};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

/// Free-form metadata attached to a point
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One observed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: SystemTime,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl MetricPoint {
    /// Create a point without metadata
    pub fn new(timestamp: SystemTime, value: f64) -> Self {
        Self {
            timestamp,
            value,
            metadata: None,
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Series sizing and retention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricStoreConfig {
    /// Capacity of each series
    pub max_points_per_series: usize,
    /// Points older than this are dropped by [`MetricStore::cleanup_expired`]
    pub retention: Duration,
}

impl Default for MetricStoreConfig {
    fn default() -> Self {
        Self {
            max_points_per_series: 1000,
            retention: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Metric series keyed by name
pub struct MetricStore {
    config: MetricStoreConfig,
    clock: Arc<dyn Clock>,
    series: Mutex<HashMap<String, VecDeque<MetricPoint>>>,
    store: Arc<dyn DurableStore>,
    pending: PendingWrites,
}

impl fmt::Debug for MetricStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricStore")
            .field("config", &self.config)
            .field("series", &self.lock().len())
            .field("store", &self.store.name())
            .field("pending", &self.pending.in_flight())
            .finish()
    }
}

impl MetricStore {
    /// Create an empty store
    pub fn new(config: MetricStoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            series: Mutex::new(HashMap::new()),
            store: Arc::new(NullStore),
            pending: PendingWrites::new(),
        }
    }

    /// Mirror recorded points to a durable store
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = store;
        self
    }

    /// Store configuration
    pub fn config(&self) -> &MetricStoreConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<MetricPoint>>> {
        self.series.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a value to the named series, evicting the oldest point when full
    pub fn record(&self, name: &str, value: f64, metadata: Option<Metadata>) -> MetricPoint {
        let point = MetricPoint {
            timestamp: self.clock.now(),
            value,
            metadata,
        };
        self.insert(name, point.clone());
        self.forward(name, &point);
        point
    }

    /// Record several values at the same instant
    pub fn record_batch(&self, values: &[(String, f64)]) -> usize {
        let now = self.clock.now();
        for (name, value) in values {
            let point = MetricPoint::new(now, *value);
            self.insert(name, point.clone());
            self.forward(name, &point);
        }
        values.len()
    }

    /// Insert a point with an explicit timestamp (replay/import)
    ///
    /// The series stays ordered by timestamp, so points may arrive in any
    /// order; on overflow the oldest point is evicted, which can be the one
    /// just inserted.
    pub fn insert(&self, name: &str, point: MetricPoint) {
        let capacity = self.config.max_points_per_series.max(1);
        let mut series = self.lock();
        let points = series.entry(name.to_string()).or_default();
        let at = points.partition_point(|p| p.timestamp <= point.timestamp);
        points.insert(at, point);
        while points.len() > capacity {
            points.pop_front();
        }
    }

    fn forward(&self, name: &str, point: &MetricPoint) {
        let store = Arc::clone(&self.store);
        let store_name = store.name().to_string();
        let name = name.to_string();
        let point = point.clone();
        self.pending.spawn(&store_name, "metric", async move {
            store.persist_metric(&name, &point).await
        });
    }

    /// Wait for points still being written to the durable store
    pub async fn flush(&self) -> usize {
        self.pending.flush().await
    }

    /// Points with `timestamp` in `[now - window, now]`, oldest first
    pub fn history(&self, name: &str, window: Duration) -> Vec<MetricPoint> {
        let now = self.clock.now();
        let start = now.checked_sub(window).unwrap_or(SystemTime::UNIX_EPOCH);

        self.lock()
            .get(name)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= start && p.timestamp <= now)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Most recent point of a series
    pub fn latest(&self, name: &str) -> Option<MetricPoint> {
        self.lock().get(name).and_then(|points| points.back().cloned())
    }

    /// Latest point of every series
    pub fn current(&self) -> BTreeMap<String, MetricPoint> {
        self.lock()
            .iter()
            .filter_map(|(name, points)| points.back().map(|p| (name.clone(), p.clone())))
            .collect()
    }

    /// Number of points held for a series
    pub fn len(&self, name: &str) -> usize {
        self.lock().get(name).map(VecDeque::len).unwrap_or(0)
    }

    /// Names of all series
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop points older than `retention`; returns how many were removed
    pub fn cleanup(&self, retention: Duration) -> usize {
        let cutoff = self
            .clock
            .now()
            .checked_sub(retention)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut removed = 0;
        let mut series = self.lock();
        for points in series.values_mut() {
            let before = points.len();
            points.retain(|p| p.timestamp >= cutoff);
            removed += before - points.len();
        }
        series.retain(|_, points| !points.is_empty());

        if removed > 0 {
            log::debug!("Purged {} expired metric points", removed);
        }
        removed
    }

    /// Drop points older than the configured retention
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup(self.config.retention)
    }
}
