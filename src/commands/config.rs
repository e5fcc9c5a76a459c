//! Config command implementation
//!
//! Prints the effective configuration after file and CLI merging.

use crate::cli::args::OutputFormat;
use crate::config::{Config, ConfigFile};
use crate::error::{ConfigError, Result};

/// Execute the config command
pub fn run_config(config: &Config, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(config).map_err(ConfigError::from)?,
        OutputFormat::Table | OutputFormat::Compact => ConfigFile::to_toml(config)?,
    };
    println!("{}", rendered);
    Ok(())
}
