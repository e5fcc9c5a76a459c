//! Alert rule configuration
//!
//! Provides TOML-based rule files and the dynamic [`RuleSource`] that reloads
//! them on every evaluation tick.

use super::types::{Aggregation, AlertLevel, AlertRule, Condition};
use crate::error::{CollaboratorError, ConfigError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Window and cooldown applied to rules that do not set their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleDefaults {
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(300),
            cooldown: Duration::from_secs(300),
        }
    }
}

/// Alert rule file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Alert rules
    #[serde(default)]
    pub rules: Vec<AlertRuleConfig>,
}

impl AlertConfig {
    /// Load rules from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = fs::read_to_string(path.as_ref())
            .map_err(|_| ConfigError::FileNotFound(path_str))?;

        Self::parse(&contents)
    }

    /// Parse rules from TOML text
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save rules to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize: {}", e)))?;

        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ConfigError::InvalidValue {
                key: "rules_file".to_string(),
                message: e.to_string(),
            })?;
        }
        fs::write(path.as_ref(), contents).map_err(|e| ConfigError::InvalidValue {
            key: "rules_file".to_string(),
            message: e.to_string(),
        })
    }

    /// Get default rule file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("ingestwatch").join("alerts.toml")
        } else {
            PathBuf::from("alerts.toml")
        }
    }

    /// Built-in rules for an ingestion backend
    pub fn default_rules() -> Self {
        let rule = |metric: &str, threshold: f64, level: &str, message: &str| AlertRuleConfig {
            metric: metric.to_string(),
            condition: "above".to_string(),
            threshold,
            level: level.to_string(),
            message: message.to_string(),
            window_secs: None,
            cooldown_secs: None,
            aggregation: None,
            enabled: true,
        };

        Self {
            rules: vec![
                rule("errorRate", 0.05, "warning", "Error rate above 5%"),
                rule("errorRate", 0.15, "critical", "Error rate above 15%"),
                rule("queueSize", 1000.0, "warning", "Ingestion queue backing up"),
                rule("responseTime", 5000.0, "warning", "Upstream responses slower than 5s"),
                rule("memoryUsage", 0.9, "critical", "Memory usage above 90%"),
                rule("pendingApprovals", 500.0, "info", "Approval backlog growing"),
            ],
        }
    }

    /// Convert enabled entries to alert rules
    pub fn to_alert_rules(&self, defaults: RuleDefaults) -> Result<Vec<AlertRule>, ConfigError> {
        self.rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| r.to_alert_rule(defaults))
            .collect()
    }
}

/// Alert rule configuration (TOML-friendly format)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRuleConfig {
    /// Metric name
    pub metric: String,
    /// Condition name (above, below, equals, change)
    pub condition: String,
    /// Threshold value
    pub threshold: f64,
    /// Level name (info, warning, error, critical)
    pub level: String,
    /// Alert message
    #[serde(default)]
    pub message: String,
    /// Evaluation window in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_secs: Option<u64>,
    /// Cooldown in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_secs: Option<u64>,
    /// Aggregation name (mean, max)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    /// Whether rule is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AlertRuleConfig {
    /// Convert to AlertRule
    pub fn to_alert_rule(&self, defaults: RuleDefaults) -> Result<AlertRule, ConfigError> {
        let condition = Condition::parse(&self.condition).ok_or_else(|| ConfigError::InvalidValue {
            key: "condition".to_string(),
            message: format!("Unknown condition: {}", self.condition),
        })?;
        let level = AlertLevel::parse(&self.level).ok_or_else(|| ConfigError::InvalidValue {
            key: "level".to_string(),
            message: format!("Unknown level: {}", self.level),
        })?;

        if self.metric.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "metric".to_string(),
                message: "metric name must not be empty".to_string(),
            });
        }
        if !self.threshold.is_finite() {
            return Err(ConfigError::InvalidValue {
                key: "threshold".to_string(),
                message: format!("threshold must be finite, got {}", self.threshold),
            });
        }

        let message = if self.message.is_empty() {
            format!("{} {} {}", self.metric, condition, self.threshold)
        } else {
            self.message.clone()
        };

        let mut rule = AlertRule::new(&self.metric, condition, self.threshold, level, message)
            .with_window(self.window_secs.map(Duration::from_secs).unwrap_or(defaults.window))
            .with_cooldown(
                self.cooldown_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cooldown),
            );

        if let Some(name) = &self.aggregation {
            let aggregation = Aggregation::parse(name).ok_or_else(|| ConfigError::InvalidValue {
                key: "aggregation".to_string(),
                message: format!("Unknown aggregation: {}", name),
            })?;
            rule = rule.with_aggregation(aggregation);
        }

        Ok(rule)
    }
}

/// Source of rules loaded at runtime
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Load the current rule set
    async fn load_rules(&self) -> Result<Vec<AlertRule>, CollaboratorError>;

    /// Source name for log messages
    fn name(&self) -> &str;
}

/// Rule source backed by a TOML rule file, re-read on every load
#[derive(Debug, Clone)]
pub struct TomlRuleSource {
    path: PathBuf,
    defaults: RuleDefaults,
}

impl TomlRuleSource {
    /// Create a source for `path`
    pub fn new<P: AsRef<Path>>(path: P, defaults: RuleDefaults) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            defaults,
        }
    }
}

#[async_trait]
impl RuleSource for TomlRuleSource {
    async fn load_rules(&self) -> Result<Vec<AlertRule>, CollaboratorError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        AlertConfig::parse(&contents)
            .and_then(|config| config.to_alert_rules(self.defaults))
            .map_err(|e| CollaboratorError::RuleSource(format!("{}: {}", self.path.display(), e)))
    }

    fn name(&self) -> &str {
        "toml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AlertRuleConfig {
        AlertRuleConfig {
            metric: "errorRate".to_string(),
            condition: "above".to_string(),
            threshold: 0.05,
            level: "warning".to_string(),
            message: "High error rate".to_string(),
            window_secs: Some(600),
            cooldown_secs: None,
            aggregation: Some("max".to_string()),
            enabled: true,
        }
    }

    #[test]
    fn test_default_rules() {
        let config = AlertConfig::default_rules();
        let rules = config.to_alert_rules(RuleDefaults::default()).unwrap();
        assert_eq!(rules.len(), 6);
        assert!(rules.iter().any(|r| r.level == AlertLevel::Critical));
    }

    #[test]
    fn test_to_alert_rule() {
        let rule = entry().to_alert_rule(RuleDefaults::default()).unwrap();
        assert_eq!(rule.id(), "errorRate:above:0.05");
        assert_eq!(rule.window, Duration::from_secs(600));
        assert_eq!(rule.cooldown, Duration::from_secs(300));
        assert_eq!(rule.aggregation, Some(Aggregation::Max));
    }

    #[test]
    fn test_invalid_entries() {
        let mut bad = entry();
        bad.condition = "sideways".to_string();
        assert!(matches!(
            bad.to_alert_rule(RuleDefaults::default()),
            Err(ConfigError::InvalidValue { key, .. }) if key == "condition"
        ));

        let mut bad = entry();
        bad.level = "panic".to_string();
        assert!(bad.to_alert_rule(RuleDefaults::default()).is_err());

        let mut bad = entry();
        bad.aggregation = Some("median".to_string());
        assert!(bad.to_alert_rule(RuleDefaults::default()).is_err());
    }

    #[test]
    fn test_disabled_rules_skipped() {
        let mut disabled = entry();
        disabled.enabled = false;
        let config = AlertConfig {
            rules: vec![entry(), disabled],
        };
        assert_eq!(config.to_alert_rules(RuleDefaults::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_toml() {
        let config = AlertConfig::parse(
            r#"
            [[rules]]
            metric = "queueSize"
            condition = "above"
            threshold = 1000
            level = "critical"
            cooldown_secs = 60
            "#,
        )
        .unwrap();
        let rules = config.to_alert_rules(RuleDefaults::default()).unwrap();
        assert_eq!(rules[0].threshold, 1000.0);
        assert_eq!(rules[0].cooldown, Duration::from_secs(60));
        assert_eq!(rules[0].message, "queueSize above 1000");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.toml");
        let config = AlertConfig::default_rules();
        config.save(&path).unwrap();

        let loaded = AlertConfig::load(&path).unwrap();
        assert_eq!(loaded.rules, config.rules);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AlertConfig::load("/nonexistent/alerts.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_toml_rule_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.toml");
        let source = TomlRuleSource::new(&path, RuleDefaults::default());

        assert!(source.load_rules().await.is_err());

        std::fs::write(
            &path,
            concat!(
                "[[rules]]\n",
                "metric = \"errorRate\"\n",
                "condition = \"above\"\n",
                "threshold = 0.1\n",
                "level = \"error\"\n",
            ),
        )
        .unwrap();
        let rules = source.load_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].level, AlertLevel::Error);

        std::fs::write(&path, "[[rules]]\nmetric = 1\n").unwrap();
        assert!(matches!(
            source.load_rules().await,
            Err(CollaboratorError::RuleSource(_))
        ));
    }
}
