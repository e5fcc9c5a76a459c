//! Alert and notification system
//!
//! Provides windowed threshold rules, the alert lifecycle and notification channels.

mod config;
mod engine;
mod manager;
mod notifier;
mod types;

pub use config::{AlertConfig, AlertRuleConfig, RuleDefaults, RuleSource, TomlRuleSource};
pub use engine::{aggregate, evaluate, RuleSet, Verdict};
pub use manager::{AlertEvent, AlertManager, AlertManagerConfig};
pub use notifier::{LogNotifier, NotificationManager, Notifier, TerminalNotifier};
pub use types::{Aggregation, Alert, AlertLevel, AlertRule, Condition, EQUALS_EPSILON};
