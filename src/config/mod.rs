//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::alerts::{Aggregation, AlertConfig, AlertManagerConfig, RuleDefaults};
use crate::error::ConfigError;
use crate::metrics::MetricStoreConfig;
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::services::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Circuit breaker settings
    pub breaker: BreakerSection,
    /// Default retry policy
    pub retry: RetrySection,
    /// Alert evaluation settings
    pub evaluation: EvaluationSection,
    /// Metric store settings
    pub metrics: MetricsSection,
    /// Health and alert retention settings
    pub health: HealthSection,
    /// Durable store settings
    pub storage: StorageSection,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub failure_threshold: u32,
    pub reset_timeout_secs: u64,
    pub success_threshold: u32,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
            success_threshold: 3,
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    pub attempt_timeout_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_factor: 2.0,
            attempt_timeout_ms: 30_000,
        }
    }
}

/// Alert evaluation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSection {
    /// Seconds between evaluation ticks
    pub tick_interval_secs: u64,
    /// Window for rules that do not set one
    pub default_window_secs: u64,
    /// Cooldown for rules that do not set one
    pub default_cooldown_secs: u64,
    /// Default aggregation (mean, max)
    pub aggregation: String,
    /// Alert rules file, re-read every tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
            default_window_secs: 300,
            default_cooldown_secs: 300,
            aggregation: "mean".to_string(),
            rules_file: None,
        }
    }
}

/// Metric store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub retention_secs: u64,
    pub max_points_per_series: usize,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            retention_secs: 7 * 24 * 60 * 60,
            max_points_per_series: 1000,
        }
    }
}

/// Health configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSection {
    /// Active alert count above which health is degraded
    pub degraded_threshold: usize,
    /// Seconds a resolved alert stays in memory
    pub resolved_retention_secs: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            degraded_threshold: 2,
            resolved_retention_secs: 24 * 60 * 60,
        }
    }
}

/// Durable store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSection {
    /// JSON-lines file receiving metric points and alerts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Check values that would make the runtime misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.breaker.failure_threshold == 0 {
            return Err(invalid("breaker.failure_threshold", "must be at least 1"));
        }
        if self.breaker.success_threshold == 0 {
            return Err(invalid("breaker.success_threshold", "must be at least 1"));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(invalid("retry.backoff_factor", "must be a number >= 1.0"));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.initial_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(invalid("retry.attempt_timeout_ms", "must be positive"));
        }
        if self.evaluation.tick_interval_secs == 0 {
            return Err(invalid("evaluation.tick_interval_secs", "must be positive"));
        }
        if self.evaluation.default_window_secs == 0 {
            return Err(invalid("evaluation.default_window_secs", "must be positive"));
        }
        self.aggregation()?;
        if self.metrics.max_points_per_series == 0 {
            return Err(invalid("metrics.max_points_per_series", "must be at least 1"));
        }

        Ok(())
    }

    /// Parsed default aggregation
    pub fn aggregation(&self) -> Result<Aggregation, ConfigError> {
        Aggregation::parse(&self.evaluation.aggregation).ok_or_else(|| {
            ConfigError::InvalidValue {
                key: "evaluation.aggregation".to_string(),
                message: format!("Unknown aggregation: {}", self.evaluation.aggregation),
            }
        })
    }

    /// Convert to breaker settings
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            reset_timeout: Duration::from_secs(self.breaker.reset_timeout_secs),
            success_threshold: self.breaker.success_threshold,
        }
    }

    /// Convert to the default retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            attempt_timeout: Duration::from_millis(self.retry.attempt_timeout_ms),
        }
    }

    /// Convert to metric store settings
    pub fn metric_store_config(&self) -> MetricStoreConfig {
        MetricStoreConfig {
            max_points_per_series: self.metrics.max_points_per_series,
            retention: Duration::from_secs(self.metrics.retention_secs),
        }
    }

    /// Convert to alert manager settings
    pub fn alert_manager_config(&self) -> AlertManagerConfig {
        AlertManagerConfig {
            degraded_threshold: self.health.degraded_threshold,
            resolved_retention: Duration::from_secs(self.health.resolved_retention_secs),
            ..AlertManagerConfig::default()
        }
    }

    /// Convert to monitor settings
    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        Ok(MonitorConfig {
            tick_interval: Duration::from_secs(self.evaluation.tick_interval_secs),
            default_aggregation: self.aggregation()?,
            single_use: false,
        })
    }

    /// Window and cooldown for rules without their own
    pub fn rule_defaults(&self) -> RuleDefaults {
        RuleDefaults {
            window: Duration::from_secs(self.evaluation.default_window_secs),
            cooldown: Duration::from_secs(self.evaluation.default_cooldown_secs),
        }
    }

    /// Rules file to use, falling back to the per-user default
    pub fn rules_path(&self) -> PathBuf {
        self.evaluation
            .rules_file
            .clone()
            .unwrap_or_else(AlertConfig::default_path)
    }
}
