//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod check;
pub mod config;
pub mod evaluate;
pub mod monitor;
pub mod rules;

pub use check::run_check;
pub use config::run_config;
pub use evaluate::run_evaluate;
pub use monitor::run_monitor;
pub use rules::run_rules;

use crate::alerts::{AlertConfig, AlertManager, AlertRule, NotificationManager, RuleDefaults};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::context::ResilienceContext;
use crate::error::Result;
use crate::services::Monitor;
use crate::storage::{DurableStore, JsonLinesStore, NullStore};
use std::path::Path;
use std::sync::Arc;

/// Build a monitor from configuration on the system clock
pub fn build_monitor(config: &Config, notifier: NotificationManager) -> Result<Monitor> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn DurableStore> = match &config.storage.path {
        Some(path) => {
            log::info!("Mirroring metrics and alerts to {}", path.display());
            Arc::new(JsonLinesStore::new(path))
        }
        None => Arc::new(NullStore),
    };

    let ctx = ResilienceContext::with_store(
        config.breaker_config(),
        config.metric_store_config(),
        Arc::clone(&clock),
        Arc::clone(&store),
    );
    let alerts = AlertManager::new(config.alert_manager_config(), clock)
        .with_notifier(notifier)
        .with_store(store);

    Ok(Monitor::new(
        config.monitor_config()?,
        ctx,
        config.retry_policy(),
        alerts,
    ))
}

/// Rules from `path`, or the built-in rules when it does not exist
///
/// Returns the rules and a label naming where they came from.
pub fn load_rules(path: &Path, defaults: RuleDefaults) -> Result<(Vec<AlertRule>, String)> {
    if path.exists() {
        let rules = AlertConfig::load(path)?.to_alert_rules(defaults)?;
        Ok((rules, path.display().to_string()))
    } else {
        log::debug!("{} not found, using built-in rules", path.display());
        let rules = AlertConfig::default_rules().to_alert_rules(defaults)?;
        Ok((rules, "built-in".to_string()))
    }
}
