//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Resilience and alerting monitor for ingestion pipelines
///
/// Evaluates threshold rules over recorded metrics and tracks alert lifecycles.
#[derive(Parser, Debug)]
#[command(name = "ingestwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "INGESTWATCH_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the evaluation loop until interrupted
    Monitor(MonitorArgs),

    /// Evaluate rules once against a file of metric points
    Evaluate(EvaluateArgs),

    /// List alert rules
    Rules(RulesArgs),

    /// Validate configuration and rule files
    Check(CheckArgs),

    /// Print the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the monitor command
#[derive(Parser, Debug)]
pub struct MonitorArgs {
    /// Evaluation interval in seconds
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// JSON object of metric values, re-read every tick
    #[arg(long, value_name = "FILE")]
    pub metrics_file: Option<PathBuf>,

    /// Alert rules file
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// JSON-lines file receiving metric points and alerts
    #[arg(long, value_name = "FILE")]
    pub storage: Option<PathBuf>,

    /// Run once and exit (single-use mode)
    #[arg(long)]
    pub single_use: bool,
}

/// Arguments for the evaluate command
#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// JSON array of points: {"metric", "value", "age_secs"}
    pub points: PathBuf,

    /// Alert rules file
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Default aggregation
    #[arg(long, value_enum)]
    pub aggregation: Option<AggregationArg>,
}

/// Arguments for the rules command
#[derive(Parser, Debug)]
pub struct RulesArgs {
    /// Alert rules file
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Write the built-in rules to the file if it does not exist
    #[arg(long)]
    pub init: bool,
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Alert rules file
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,
}

/// Aggregation argument
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationArg {
    /// Arithmetic mean of the window
    Mean,
    /// Largest value in the window
    Max,
}

impl AggregationArg {
    /// Config spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Max => "max",
        }
    }
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
