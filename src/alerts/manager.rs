//! Alert manager implementation
//!
//! Owns the alert lifecycle: trigger, resolve, acknowledge and retention.
//! At most one unresolved alert exists per rule identity. Persistence and
//! notification are best-effort and happen after the alert record exists.

use super::notifier::NotificationManager;
use super::types::{Alert, AlertRule};
use crate::clock::{elapsed_since, Clock};
use crate::error::AlertError;
use crate::health::HealthStatus;
use crate::metrics::Metadata;
use crate::storage::{DurableStore, NullStore, PendingWrites};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

/// Alert manager configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertManagerConfig {
    /// Active alert count above which health is degraded
    pub degraded_threshold: usize,
    /// How long resolved alerts stay in memory
    pub resolved_retention: Duration,
    /// Buffered events per subscriber
    pub event_capacity: usize,
}

impl Default for AlertManagerConfig {
    fn default() -> Self {
        Self {
            degraded_threshold: 2,
            resolved_retention: Duration::from_secs(24 * 60 * 60),
            event_capacity: 256,
        }
    }
}

/// Lifecycle event published to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Triggered(Alert),
    Resolved(Alert),
    Acknowledged(Alert),
}

#[derive(Debug, Default)]
struct AlertTable {
    alerts: HashMap<String, Alert>,
    last_trigger: HashMap<String, SystemTime>,
}

/// Alert manager
pub struct AlertManager {
    config: AlertManagerConfig,
    clock: Arc<dyn Clock>,
    table: Mutex<AlertTable>,
    store: Arc<dyn DurableStore>,
    pending: PendingWrites,
    notifier: NotificationManager,
    events: broadcast::Sender<AlertEvent>,
}

impl AlertManager {
    /// Create a manager that notifies through the log
    pub fn new(config: AlertManagerConfig, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            clock,
            table: Mutex::new(AlertTable::default()),
            store: Arc::new(NullStore),
            pending: PendingWrites::new(),
            notifier: NotificationManager::with_log(),
            events,
        }
    }

    /// Mirror alerts to a durable store
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = store;
        self
    }

    /// Replace the notification channels
    pub fn with_notifier(mut self, notifier: NotificationManager) -> Self {
        self.notifier = notifier;
        self
    }

    /// Manager configuration
    pub fn config(&self) -> &AlertManagerConfig {
        &self.config
    }

    /// Wait for alerts and resolutions still being written to the durable store
    pub async fn flush(&self) -> usize {
        self.pending.flush().await
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, AlertTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether `rule` may trigger again: never triggered, or cooldown elapsed
    pub fn cooldown_elapsed(&self, rule: &AlertRule) -> bool {
        let now = self.clock.now();
        self.lock()
            .last_trigger
            .get(&rule.id())
            .map(|at| elapsed_since(now, *at) >= rule.cooldown)
            .unwrap_or(true)
    }

    /// Create an alert for `rule` unless one is already unresolved
    pub fn trigger(&self, rule: &AlertRule, current_value: f64) -> Option<Alert> {
        let now = self.clock.now();
        let id = rule.id();

        let alert = {
            let mut table = self.lock();
            if table.alerts.get(&id).is_some_and(Alert::is_active) {
                return None;
            }
            let alert = Alert::new(rule, current_value, now);
            table.alerts.insert(id.clone(), alert.clone());
            table.last_trigger.insert(id, now);
            alert
        };

        log::warn!("Alert triggered [{}] {}", alert.level, alert.summary());

        let store = Arc::clone(&self.store);
        let store_name = store.name().to_string();
        let record = alert.clone();
        self.pending.spawn(&store_name, "alert", async move {
            store.persist_alert(&record).await
        });

        self.notifier
            .notify_all(alert.level, &alert.summary(), &context(&alert, "triggered"));
        let _ = self.events.send(AlertEvent::Triggered(alert.clone()));

        Some(alert)
    }

    /// Resolve the unresolved alert with `id`, if any
    pub fn resolve(&self, id: &str) -> Option<Alert> {
        let now = self.clock.now();

        let alert = {
            let mut table = self.lock();
            let alert = table.alerts.get_mut(id)?;
            if !alert.resolve(now) {
                return None;
            }
            alert.clone()
        };

        log::info!("Alert resolved: {}", alert.id);

        let store = Arc::clone(&self.store);
        let store_name = store.name().to_string();
        let id = alert.id.clone();
        self.pending.spawn(&store_name, "alert resolution", async move {
            store.persist_alert_resolution(&id, now).await
        });

        self.notifier.notify_all(
            alert.level,
            &format!("Resolved: {}", alert.message),
            &context(&alert, "resolved"),
        );
        let _ = self.events.send(AlertEvent::Resolved(alert.clone()));

        Some(alert)
    }

    /// Acknowledge an unresolved alert
    pub fn acknowledge(&self, id: &str) -> Result<Alert, AlertError> {
        let alert = {
            let mut table = self.lock();
            match table.alerts.get_mut(id) {
                Some(alert) if alert.is_active() => {
                    alert.acknowledge();
                    alert.clone()
                }
                _ => return Err(AlertError::NotFound(id.to_string())),
            }
        };

        log::info!("Alert acknowledged: {}", id);
        let _ = self.events.send(AlertEvent::Acknowledged(alert.clone()));
        Ok(alert)
    }

    /// Look up an alert (active or retained resolved)
    pub fn get(&self, id: &str) -> Option<Alert> {
        self.lock().alerts.get(id).cloned()
    }

    /// Unresolved alerts, newest first
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .lock()
            .alerts
            .values()
            .filter(|a| a.is_active())
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        alerts
    }

    /// Every alert still in memory, newest first
    pub fn all_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.lock().alerts.values().cloned().collect();
        alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        alerts
    }

    /// Health derived from active alerts
    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::from_alerts(&self.active_alerts(), self.config.degraded_threshold)
    }

    /// Drop resolved alerts older than the retention window
    pub fn purge_resolved(&self) -> usize {
        let now = self.clock.now();
        let retention = self.config.resolved_retention;

        let mut table = self.lock();
        let before = table.alerts.len();
        table.alerts.retain(|_, alert| match alert.resolved_at {
            Some(at) => elapsed_since(now, at) < retention,
            None => true,
        });
        let purged = before - table.alerts.len();

        if purged > 0 {
            log::debug!("Purged {} resolved alerts", purged);
        }
        purged
    }
}

fn context(alert: &Alert, event: &str) -> Metadata {
    let epoch_secs = |t: SystemTime| t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

    let mut context = Metadata::new();
    context.insert("event".to_string(), serde_json::json!(event));
    context.insert("id".to_string(), serde_json::json!(alert.id));
    context.insert("metric".to_string(), serde_json::json!(alert.metric));
    context.insert("value".to_string(), serde_json::json!(alert.current_value));
    context.insert("threshold".to_string(), serde_json::json!(alert.threshold));
    context.insert(
        "triggered_at".to_string(),
        serde_json::json!(epoch_secs(alert.triggered_at)),
    );
    if let Some(at) = alert.resolved_at {
        context.insert("resolved_at".to_string(), serde_json::json!(epoch_secs(at)));
    }
    context
}
