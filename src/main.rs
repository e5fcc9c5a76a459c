//! ingestwatch - resilience and alerting monitor
//!
//! A command-line tool that evaluates threshold rules over ingestion metrics
//! and tracks the resulting alerts.

use clap::Parser;
use ingestwatch::cli::args::{generate_completions, Cli, Commands};
use ingestwatch::commands::{run_check, run_config, run_evaluate, run_monitor, run_rules};
use ingestwatch::config::{Config, ConfigBuilder};
use ingestwatch::error::{AppError, ConfigError};

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Set log level based on verbose flag
    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    if let Commands::Completions { shell } = &cli.command {
        generate_completions(*shell);
        return Ok(());
    }

    let config = load_config(cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match &cli.command {
        Commands::Monitor(args) => runtime.block_on(run_monitor(args, &config, cli.format)),

        Commands::Evaluate(args) => runtime.block_on(run_evaluate(args, &config, cli.format)),

        Commands::Rules(args) => run_rules(args, &config, cli.format),

        Commands::Check(args) => run_check(args, &config, cli.format),

        Commands::Config => run_config(&config, cli.format),

        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(cli: &Cli) -> Result<Config, AppError> {
    let mut builder = ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_verbose(cli.verbose.then_some(true));

    if let Commands::Monitor(args) = &cli.command {
        builder = builder
            .with_interval(args.interval)
            .with_rules_file(args.rules.clone())
            .with_storage(args.storage.clone());
    }

    Ok(builder.build()?)
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Config(ConfigError::FileNotFound(path)) => {
            eprintln!();
            eprintln!("Hint: Check the path passed with --config or INGESTWATCH_CONFIG.");
            eprintln!("      Tried: {}", path);
        }
        AppError::Config(ConfigError::InvalidValue { key, .. }) => {
            eprintln!();
            eprintln!("Hint: Fix '{}' in your configuration file.", key);
            eprintln!("      Run 'ingestwatch config' to see the effective values.");
        }
        _ => {}
    }
}
