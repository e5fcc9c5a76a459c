//! Check command implementation
//!
//! Validates the configuration and the alert rules file.

use crate::alerts::AlertConfig;
use crate::cli::args::{CheckArgs, OutputFormat};
use crate::cli::output::{print_output, Message};
use crate::config::Config;
use crate::error::Result;

/// Execute the check command
pub fn run_check(args: &CheckArgs, config: &Config, format: OutputFormat) -> Result<()> {
    config.validate()?;
    print_output(
        &Message {
            message: "Configuration is valid".to_string(),
            success: true,
        },
        format,
    )?;

    let path = args.rules.clone().unwrap_or_else(|| config.rules_path());
    if !path.exists() {
        print_output(
            &Message {
                message: format!("No rules file at {}, built-in rules apply", path.display()),
                success: true,
            },
            format,
        )?;
        return Ok(());
    }

    let alert_config = AlertConfig::load(&path)?;
    let rules = alert_config.to_alert_rules(config.rule_defaults())?;
    print_output(
        &Message {
            message: format!(
                "{}: {} rule(s), {} enabled",
                path.display(),
                alert_config.rules.len(),
                rules.len()
            ),
            success: true,
        },
        format,
    )?;
    Ok(())
}
