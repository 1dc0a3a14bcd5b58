//! pricediff CLI: Difference-in-Differences reports for price changes.
//!
//! Reads a CSV of daily observations, fits the DiD regression and prints a
//! plain-language report with a parallel-trends check.

mod chart;
mod commands;
mod render;
mod report;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// pricediff: did the price change work?
#[derive(Parser, Debug)]
#[command(name = "pricediff", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .pricediff/config.toml)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Fit the DiD model and print the full report
    Analyze(AnalyzeArgs),
    /// List the columns that can be analyzed as outcomes
    Columns {
        /// CSV file (`-` for stdin)
        input: PathBuf,
    },
    /// Print the pre-treatment series as CSV
    Trend {
        /// CSV file (`-` for stdin)
        input: PathBuf,
        /// Rows strictly before this date are kept
        #[arg(long)]
        intervention_date: String,
        /// Outcome column (defaults to the first candidate)
        #[arg(long)]
        outcome: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// CSV file (`-` for stdin)
    input: Option<PathBuf>,

    /// Outcome column (defaults to the first candidate)
    #[arg(long)]
    outcome: Option<String>,

    /// Intervention date for the trend check (defaults to the earliest date)
    #[arg(long)]
    intervention_date: Option<String>,

    /// Output format: text, markdown, json
    #[arg(short, long, value_parser = parse_format)]
    format: Option<pricediff_core::ReportFormat>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a Vega-Lite chart of the pre-treatment trend
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Write the pre-treatment series as CSV
    #[arg(long)]
    trend_csv: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the merged configuration
    Show,
}

fn parse_format(s: &str) -> Result<pricediff_core::ReportFormat, String> {
    s.parse().map_err(|e: pricediff_core::ConfigError| e.to_string())
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let config = pricediff_core::load_config(Some(&workspace), cli.config.as_deref(), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => config
            .logging
            .level
            .clone()
            .unwrap_or_else(|| "warn".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let (json_layer, _guard) = if config.logging.file_logging {
        let log_dir = pricediff_core::config::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."));
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "pricediff.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_filter(EnvFilter::new("debug"));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, config, &workspace, cli.quiet)
}
