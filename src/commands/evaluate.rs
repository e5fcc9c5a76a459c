//! Evaluate command implementation
//!
//! Loads points from a JSON file, runs one evaluation tick and prints the
//! resulting alerts and health.

use super::{build_monitor, load_rules};
use crate::alerts::NotificationManager;
use crate::cli::args::{EvaluateArgs, OutputFormat};
use crate::cli::output::{print_output, AlertList, EvaluationOutput};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::metrics::MetricPoint;
use serde::Deserialize;
use std::time::Duration;

/// One recorded point, `age_secs` before now
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PointInput {
    pub metric: String,
    pub value: f64,
    #[serde(default)]
    pub age_secs: u64,
}

/// Parse a JSON array of points
pub fn parse_points(content: &str) -> Result<Vec<PointInput>> {
    Ok(serde_json::from_str(content).map_err(ConfigError::from)?)
}

/// Execute the evaluate command
pub async fn run_evaluate(
    args: &EvaluateArgs,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let content = tokio::fs::read_to_string(&args.points).await?;
    let points = parse_points(&content)?;

    let mut config = config.clone();
    if let Some(aggregation) = args.aggregation {
        config.evaluation.aggregation = aggregation.as_str().to_string();
    }

    let rules_path = args.rules.clone().unwrap_or_else(|| config.rules_path());
    let (rules, source) = load_rules(&rules_path, config.rule_defaults())?;
    log::info!("Evaluating {} rule(s) from {}", rules.len(), source);

    let monitor = build_monitor(&config, NotificationManager::new())?.with_rules(rules);
    let ctx = monitor.context();
    let now = ctx.clock().now();
    for point in &points {
        let timestamp = now
            .checked_sub(Duration::from_secs(point.age_secs))
            .unwrap_or(now);
        ctx.metrics()
            .insert(&point.metric, MetricPoint::new(timestamp, point.value));
    }
    log::debug!("Loaded {} point(s)", points.len());

    let report = monitor.tick().await;
    monitor.flush().await;
    let output = EvaluationOutput {
        evaluated: report.evaluated,
        no_data: report.no_data,
        alerts: AlertList {
            alerts: monitor.active_alerts(),
        },
        health: monitor.health_summary(),
    };
    print_output(&output, format)?;
    Ok(())
}
