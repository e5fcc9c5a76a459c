//! Monitor command implementation
//!
//! Runs the evaluation loop until Ctrl-C.

use super::build_monitor;
use crate::alerts::{AlertConfig, NotificationManager, TerminalNotifier, TomlRuleSource};
use crate::cli::args::{MonitorArgs, OutputFormat};
use crate::cli::output::{print_output, AlertList};
use crate::config::Config;
use crate::error::Result;
use crate::metrics::JsonFileProvider;
use std::sync::Arc;

/// Execute the monitor command
pub async fn run_monitor(args: &MonitorArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let mut notifier = NotificationManager::with_log();
    notifier.add_notifier(Box::new(TerminalNotifier::new()));

    let mut monitor = build_monitor(config, notifier)?;

    let rules_path = config.rules_path();
    if rules_path.exists() {
        log::info!("Reloading alert rules from {} every tick", rules_path.display());
        monitor = monitor.with_rule_source(Arc::new(TomlRuleSource::new(
            &rules_path,
            config.rule_defaults(),
        )));
    } else {
        log::info!(
            "No rules at {}, using built-in rules",
            rules_path.display()
        );
        let rules = AlertConfig::default_rules().to_alert_rules(config.rule_defaults())?;
        monitor = monitor.with_rules(rules);
    }

    if let Some(path) = &args.metrics_file {
        log::info!("Reading metrics from {}", path.display());
        monitor = monitor.with_provider(Arc::new(JsonFileProvider::new(path)));
    }

    let interval = monitor.config().tick_interval;
    log::info!("Starting evaluation loop");
    log::info!("  Interval: {:?}", interval);
    log::info!("  Aggregation: {}", monitor.config().default_aggregation);
    log::info!("  Rules: {}", monitor.rules().len());

    if args.single_use {
        log::info!("Single-use mode: exiting after one tick");
        monitor.tick().await;
    } else {
        eprintln!("Monitoring (interval: {:?}). Press Ctrl+C to stop", interval);
        monitor
            .run(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await;
    }

    let flushed = monitor.flush().await;
    log::debug!("Flushed {} pending write(s)", flushed);

    print_output(
        &AlertList {
            alerts: monitor.active_alerts(),
        },
        format,
    )?;
    print_output(&monitor.health_summary(), format)?;
    Ok(())
}
