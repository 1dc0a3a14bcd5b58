//! CLI subcommand handlers.

use crate::AnalyzeArgs;
use crate::Commands;
use crate::ConfigAction;
use crate::chart::{TrendChart, write_trend_csv};
use crate::render::renderer_for;
use crate::report::{NO_PRE_PERIOD_WARNING, ReportRequest, build_report};
use anyhow::Context;
use chrono::NaiveDate;
use pricediff_core::data::schema::parse_date;
use pricediff_core::data::{DataTable, DidFrame, SchemaOptions, outcome_candidates};
use pricediff_core::{FitError, PricediffConfig};
use pricediff_stats::{TrendInspector, TrendOutcome};
use std::path::{Path, PathBuf};

/// Printed instead of a report when no CSV was given.
pub const MISSING_INPUT_PROMPT: &str = "Please supply a CSV to proceed.";

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    config: PricediffConfig,
    workspace: &Path,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Analyze(args) => handle_analyze(args, config, quiet),
        Commands::Columns { input } => handle_columns(&input, &config),
        Commands::Trend {
            input,
            intervention_date,
            outcome,
        } => handle_trend(&input, &intervention_date, outcome.as_deref(), &config),
        Commands::Config { action } => handle_config(action, &config, workspace),
    }
}

fn require_input(input: Option<PathBuf>) -> Result<PathBuf, FitError> {
    input.ok_or(FitError::MissingInput)
}

fn load_table(input: &Path) -> anyhow::Result<DataTable> {
    DataTable::load(input).with_context(|| format!("Failed to load {}", input.display()))
}

fn parse_cli_date(value: &str, config: &PricediffConfig) -> anyhow::Result<NaiveDate> {
    parse_date(value, &config.analysis.date_formats).with_context(|| {
        format!(
            "'{value}' is not a date (accepted formats: {})",
            config.analysis.date_formats.join(", ")
        )
    })
}

fn handle_analyze(args: AnalyzeArgs, mut config: PricediffConfig, quiet: bool) -> anyhow::Result<()> {
    let input = match require_input(args.input) {
        Ok(input) => input,
        Err(FitError::MissingInput) => {
            println!("{MISSING_INPUT_PROMPT}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Apply CLI overrides
    if let Some(format) = args.format {
        config.report.format = format;
    }

    let table = load_table(&input)?;
    let intervention_date = args
        .intervention_date
        .as_deref()
        .map(|d| parse_cli_date(d, &config))
        .transpose()?;
    let request = ReportRequest {
        outcome: args.outcome,
        intervention_date,
    };
    let report = build_report(&table, &request, &config)?;

    let renderer = renderer_for(config.report.format, config.report.wrap_width);
    let rendered = renderer.render(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!("Report written to {}", path.display());
            }
        }
        None => print!("{rendered}"),
    }

    if args.chart.is_none() && args.trend_csv.is_none() {
        return Ok(());
    }
    let Some(series) = report.trend.outcome.series() else {
        tracing::warn!("skipping trend artifacts: {NO_PRE_PERIOD_WARNING}");
        return Ok(());
    };
    if let Some(path) = &args.chart {
        TrendChart::from_series(series)
            .write(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "trend chart written");
    }
    if let Some(path) = &args.trend_csv {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        write_trend_csv(series, file)?;
        tracing::info!(path = %path.display(), "trend series written");
    }
    Ok(())
}

fn handle_columns(input: &Path, config: &PricediffConfig) -> anyhow::Result<()> {
    let table = load_table(input)?;
    let candidates = outcome_candidates(&table, &SchemaOptions::from(&config.analysis));
    if candidates.is_empty() {
        anyhow::bail!(
            "No outcome columns found. Columns present: {}",
            table.columns().join(", ")
        );
    }
    for column in candidates {
        println!("{column}");
    }
    Ok(())
}

fn handle_trend(
    input: &Path,
    intervention_date: &str,
    outcome: Option<&str>,
    config: &PricediffConfig,
) -> anyhow::Result<()> {
    let cutoff = parse_cli_date(intervention_date, config)?;
    let table = load_table(input)?;
    let options = SchemaOptions::from(&config.analysis);
    let outcome = match outcome {
        Some(o) => o.to_string(),
        None => outcome_candidates(&table, &options)
            .into_iter()
            .next()
            .ok_or_else(|| FitError::schema("no outcome column besides the structural ones"))?,
    };
    let frame = DidFrame::from_table(&table, &outcome, &options)?;
    match TrendInspector::new().aggregate(&frame, cutoff) {
        TrendOutcome::Series(series) => {
            write_trend_csv(&series, std::io::stdout().lock())?;
        }
        TrendOutcome::Empty { .. } => eprintln!("{NO_PRE_PERIOD_WARNING}"),
    }
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    config: &PricediffConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = pricediff_core::config::workspace_config_path(workspace);
            match pricediff_core::config::init_workspace_config(workspace)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!(
                    "Configuration file already exists at: {}",
                    path.display()
                ),
            }
            Ok(())
        }
        ConfigAction::Show => {
            if !pricediff_core::config::config_exists(Some(workspace)) {
                eprintln!("No configuration file found; showing defaults and environment overrides.");
            }
            let toml_str = toml::to_string_pretty(config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
