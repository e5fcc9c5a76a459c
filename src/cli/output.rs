//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::alerts::{Alert, AlertRule};
use crate::cli::args::OutputFormat;
use crate::health::HealthSummary;
use serde::Serialize;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Alert list for display
#[derive(Debug, Clone, Serialize)]
pub struct AlertList {
    pub alerts: Vec<Alert>,
}

impl TableDisplay for AlertList {
    fn to_table(&self) -> String {
        if self.alerts.is_empty() {
            return "No active alerts".to_string();
        }

        let mut output = format!("Active Alerts: {}\n\n", self.alerts.len());
        output.push_str("  Level     Value       Id\n");
        output.push_str("  ────────────────────────────────────────────────────────────\n");

        for alert in &self.alerts {
            let ack = if alert.acknowledged { " (ack)" } else { "" };
            output.push_str(&format!(
                "  {:<9} {:<11} {}{}\n",
                alert.level.to_string(),
                format!("{:.3}", alert.current_value),
                alert.id,
                ack
            ));
            output.push_str(&format!(
                "            {} (since {})\n",
                alert.message,
                epoch_secs(alert.triggered_at)
            ));
        }

        output
    }

    fn to_compact(&self) -> String {
        if self.alerts.is_empty() {
            return "0 alerts".to_string();
        }
        self.alerts
            .iter()
            .map(|a| format!("{}={}", a.id, a.level))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TableDisplay for HealthSummary {
    fn to_table(&self) -> String {
        let mut output = format!("Health: {}\n", self.status);
        output.push_str(&format!(
            "  Active alerts: {} ({} critical)\n",
            self.active_alerts, self.critical_alerts
        ));

        if !self.open_circuits.is_empty() {
            output.push_str(&format!(
                "  Open circuits: {}\n",
                self.open_circuits.join(", ")
            ));
        }

        if !self.metrics.is_empty() {
            output.push_str("\n  Current Metrics:\n");
            for (name, value) in &self.metrics {
                output.push_str(&format!("    {:<32} {}\n", name, value));
            }
        }

        output
    }

    fn to_compact(&self) -> String {
        format!(
            "{}: {} active, {} critical, {} open circuits",
            self.status,
            self.active_alerts,
            self.critical_alerts,
            self.open_circuits.len()
        )
    }
}

/// Rule entry for display
#[derive(Debug, Clone, Serialize)]
pub struct RuleEntry {
    pub id: String,
    pub metric: String,
    pub condition: String,
    pub threshold: f64,
    pub level: String,
    pub window_secs: u64,
    pub cooldown_secs: u64,
    pub aggregation: Option<String>,
    pub message: String,
}

impl From<&AlertRule> for RuleEntry {
    fn from(rule: &AlertRule) -> Self {
        Self {
            id: rule.id(),
            metric: rule.metric.clone(),
            condition: rule.condition.to_string(),
            threshold: rule.threshold,
            level: rule.level.to_string(),
            window_secs: rule.window.as_secs(),
            cooldown_secs: rule.cooldown.as_secs(),
            aggregation: rule.aggregation.map(|a| a.to_string()),
            message: rule.message.clone(),
        }
    }
}

/// Rule list for display
#[derive(Debug, Clone, Serialize)]
pub struct RuleList {
    pub source: String,
    pub rules: Vec<RuleEntry>,
}

impl TableDisplay for RuleList {
    fn to_table(&self) -> String {
        let mut output = format!("Alert Rules ({})\n", self.source);
        output.push_str(&format!("{:-<80}\n", ""));

        for rule in &self.rules {
            output.push_str(&format!("[{}] {}\n", rule.level, rule.id));
            output.push_str(&format!(
                "   Window: {}s, Cooldown: {}s, Aggregation: {}\n",
                rule.window_secs,
                rule.cooldown_secs,
                rule.aggregation.as_deref().unwrap_or("default")
            ));
            output.push_str(&format!("   {}\n", rule.message));
        }

        output.push_str(&format!("{:-<80}\n", ""));
        output.push_str(&format!("Total rules: {}", self.rules.len()));
        output
    }

    fn to_compact(&self) -> String {
        self.rules
            .iter()
            .map(|r| r.id.clone())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Result of a one-shot evaluation
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutput {
    pub evaluated: usize,
    pub no_data: usize,
    pub alerts: AlertList,
    pub health: HealthSummary,
}

impl TableDisplay for EvaluationOutput {
    fn to_table(&self) -> String {
        let mut output = format!(
            "Evaluated {} rule(s), {} without data\n\n",
            self.evaluated, self.no_data
        );
        output.push_str(&self.alerts.to_table());
        output.push_str("\n\n");
        output.push_str(&self.health.to_table());
        output
    }

    fn to_compact(&self) -> String {
        format!("{} | {}", self.alerts.to_compact(), self.health.to_compact())
    }
}

/// Simple message output
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub message: String,
    pub success: bool,
}

impl TableDisplay for Message {
    fn to_table(&self) -> String {
        if self.success {
            format!("✓ {}", self.message)
        } else {
            format!("✗ {}", self.message)
        }
    }
}
