//! Rules command implementation
//!
//! Lists the alert rules a monitor would run with.

use super::load_rules;
use crate::alerts::AlertConfig;
use crate::cli::args::{OutputFormat, RulesArgs};
use crate::cli::output::{print_output, Message, RuleEntry, RuleList};
use crate::config::Config;
use crate::error::Result;

/// Execute the rules command
pub fn run_rules(args: &RulesArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let path = args.file.clone().unwrap_or_else(|| config.rules_path());

    if args.init {
        if path.exists() {
            print_output(
                &Message {
                    message: format!("{} already exists, leaving it untouched", path.display()),
                    success: false,
                },
                format,
            )?;
        } else {
            AlertConfig::default_rules().save(&path)?;
            print_output(
                &Message {
                    message: format!("Saved built-in rules to {}", path.display()),
                    success: true,
                },
                format,
            )?;
        }
    }

    let (rules, source) = load_rules(&path, config.rule_defaults())?;
    let list = RuleList {
        source,
        rules: rules.iter().map(RuleEntry::from).collect(),
    };
    print_output(&list, format)?;
    Ok(())
}
