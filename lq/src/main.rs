//! Lookupq - rate-limited person API lookups
//!
//! CLI entry point for staging and dispatching lookups.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use lookupq::cli::{Cli, Command};
use lookupq::config::Config;
use lookupq::run::{self, RunOptions};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lookupq")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("lookupq.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Run {
            input,
            history,
            sample,
            dry_run,
        } => {
            let opts = RunOptions {
                input,
                history,
                sample,
                dry_run,
            };
            cmd_run(&config, &opts).await
        }
        Command::Plan { input, history } => {
            let opts = RunOptions {
                input,
                history,
                ..Default::default()
            };
            cmd_plan(&config, &opts)
        }
        Command::Config => cmd_config(&config),
    }
}

/// Load, stage and dispatch every item
async fn cmd_run(config: &Config, opts: &RunOptions) -> Result<()> {
    debug!(?opts, "cmd_run: called");
    config.validate()?;

    let prepared = run::prepare(opts)?;
    println!(
        "{} {} items to process ({} rejected, {} duplicates, {} already processed)",
        "→".cyan(),
        prepared.candidates.len().to_string().bold(),
        prepared.rejected,
        prepared.duplicates,
        prepared.already_processed
    );

    let report = run::execute(config, prepared, opts).await?;
    let summary = &report.dispatch;

    println!(
        "{} Run {} finished in {:.1}s",
        "✓".green(),
        report.run_id.to_string().dimmed(),
        summary.elapsed.as_secs_f64()
    );
    println!("  Staged:       {}", report.staged);
    println!("  Dispatched:   {}", summary.dispatched);
    println!("  Redispatched: {}", summary.redispatched);
    if let Some(totals) = report.totals {
        println!("  Succeeded:    {}", totals.succeeded.to_string().green());
        println!("  Failed:       {}", totals.failed.to_string().red());
        println!("  Retried:      {}", totals.retried.to_string().yellow());
    }
    if summary.pool.panicked > 0 {
        println!("  Crashed:      {}", summary.pool.panicked.to_string().red());
    }
    if summary.abandoned > 0 {
        println!(
            "{} {} items were re-staged after the queue timed out and were not dispatched",
            "!".yellow(),
            summary.abandoned
        );
    }
    Ok(())
}

/// Print the staged schedule
fn cmd_plan(config: &Config, opts: &RunOptions) -> Result<()> {
    debug!(?opts, "cmd_plan: called");
    config.validate()?;

    let prepared = run::prepare(opts)?;
    let staged = run::schedule(config, &prepared)?;

    if staged.is_empty() {
        println!("No items to process");
        return Ok(());
    }

    println!(
        "{} items, one every {:.3}s after a {}s start delay",
        staged.len(),
        config.rate_limit.interval().as_secs_f64(),
        config.rate_limit.start_delay_secs
    );
    for s in &staged {
        println!(
            "{:>6}  +{:>9.3}s  {}  {}",
            s.item.sequence.to_string().dimmed(),
            s.offset.as_secs_f64(),
            s.item.identity.yellow(),
            s.item.lookup_value
        );
    }
    Ok(())
}

/// Print the effective configuration as YAML
fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}
