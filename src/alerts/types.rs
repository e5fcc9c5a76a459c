//! Alert system domain types
//!
//! Defines rules, conditions, levels and alert instances for the alerting system.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Tolerance for `equals` comparisons
pub const EQUALS_EPSILON: f64 = 1e-3;

/// Alert levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    /// Informational, no action needed
    Info,
    /// Attention recommended
    Warning,
    /// Something is failing
    Error,
    /// Immediate action required
    Critical,
}

impl AlertLevel {
    /// Parse a lowercase level name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Alert condition type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Aggregate greater than threshold
    Above,
    /// Aggregate less than threshold
    Below,
    /// Aggregate equals threshold (within [`EQUALS_EPSILON`])
    Equals,
    /// Absolute change across the window greater than threshold
    Change,
}

impl Condition {
    /// Parse a lowercase condition name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "above" => Some(Self::Above),
            "below" => Some(Self::Below),
            "equals" => Some(Self::Equals),
            "change" => Some(Self::Change),
            _ => None,
        }
    }

    /// Evaluate condition against an aggregated value
    pub fn evaluate(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above | Self::Change => value > threshold,
            Self::Below => value < threshold,
            Self::Equals => (value - threshold).abs() < EQUALS_EPSILON,
        }
    }

    /// Short name used in rule identities
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
            Self::Equals => "equals",
            Self::Change => "change",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How window points are reduced to one value
///
/// Only applies to `above`, `below` and `equals`; `change` always compares
/// the first and last point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Arithmetic mean
    #[default]
    Mean,
    /// Maximum over the window
    Max,
}

impl Aggregation {
    /// Parse a lowercase aggregation name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mean" | "avg" | "average" => Some(Self::Mean),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Alert rule definition
///
/// Identity is `(metric, condition, threshold)`; see [`AlertRule::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Metric to monitor
    pub metric: String,
    /// Condition to evaluate
    pub condition: Condition,
    /// Threshold the aggregate is compared with
    pub threshold: f64,
    /// Span of recent points considered
    pub window: Duration,
    /// Alert level
    pub level: AlertLevel,
    /// Message attached to alerts
    pub message: String,
    /// Minimum time between two triggers
    pub cooldown: Duration,
    /// Rule-level aggregation override
    pub aggregation: Option<Aggregation>,
}

impl AlertRule {
    /// Create a rule with a 5 minute window and cooldown
    pub fn new(
        metric: impl Into<String>,
        condition: Condition,
        threshold: f64,
        level: AlertLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            metric: metric.into(),
            condition,
            threshold,
            window: Duration::from_secs(300),
            level,
            message: message.into(),
            cooldown: Duration::from_secs(300),
            aggregation: None,
        }
    }

    /// Set the evaluation window
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the cooldown
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Override aggregation for this rule
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    /// Rule identity, also used as the id of its alerts
    ///
    /// Negative zero is normalised so `0.0` and `-0.0` share an id.
    pub fn id(&self) -> String {
        format!("{}:{}:{}", self.metric, self.condition, self.threshold + 0.0)
    }
}

/// Alert instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Identity of the rule that triggered this alert
    pub id: String,
    /// Metric the rule watches
    pub metric: String,
    /// Condition that held
    pub condition: Condition,
    /// Alert level
    pub level: AlertLevel,
    /// Aggregate value at trigger time
    pub current_value: f64,
    /// Threshold value
    pub threshold: f64,
    /// Alert message
    pub message: String,
    /// When the alert was triggered
    pub triggered_at: SystemTime,
    /// Whether an operator acknowledged it
    pub acknowledged: bool,
    /// When the alert was resolved; set once
    pub resolved_at: Option<SystemTime>,
}

impl Alert {
    /// Create an unresolved alert for `rule`
    pub fn new(rule: &AlertRule, current_value: f64, triggered_at: SystemTime) -> Self {
        Self {
            id: rule.id(),
            metric: rule.metric.clone(),
            condition: rule.condition,
            level: rule.level,
            current_value,
            threshold: rule.threshold,
            message: rule.message.clone(),
            triggered_at,
            acknowledged: false,
            resolved_at: None,
        }
    }

    /// Whether the alert is still active
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Mark alert as resolved; returns false if it already was
    pub fn resolve(&mut self, at: SystemTime) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(at);
        true
    }

    /// Mark alert as acknowledged
    pub fn acknowledge(&mut self) {
        self.acknowledged = true;
    }

    /// One-line description for notifications and logs
    pub fn summary(&self) -> String {
        format!(
            "{}: {} {} {} (current: {:.3})",
            self.message, self.metric, self.condition, self.threshold, self.current_value
        )
    }
}
