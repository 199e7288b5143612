//! bs - batch import of delimited files into a remote record store

use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use batchsync::cli::{Cli, Command, InputArgs};
use batchsync::config::Config;
use batchsync::engine::{RunContext, SyncEngine};
use batchsync::input::{ParsedInput, read_file};
use batchsync::profile::{ImportPlan, ProfileLoader};
use batchsync::progress::ProgressSnapshot;
use batchsync::repository::HttpRepository;
use batchsync::report::{write_error_report, write_generated};
use batchsync::scope::month_end_string;
use batchsync::summary::RunSummary;

fn setup_logging(cli_level: Option<&str>, config_level: Option<&str>) -> Result<()> {
    let level = cli_level.or(config_level).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("bs starting");

    match cli.command {
        Command::Import {
            input,
            error_report,
            summary_json,
            credentials,
            quiet,
        } => {
            let (plan, parsed, ctx) = load_run(&config, &input)?;
            let repository = HttpRepository::from_config(&config.remote, &plan.resource)
                .context("Failed to create store client")?;
            let engine = SyncEngine::new(Arc::new(repository), plan, config.batch.clone(), config.retry.clone())?;

            let progress = |snapshot: &ProgressSnapshot| {
                if !quiet {
                    print_progress(snapshot);
                }
            };
            let summary = engine.run(&parsed.rows, &ctx, &progress).await?;
            print_summary(&summary);

            if let Some(path) = error_report {
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                write_error_report(&summary, BufWriter::new(file))?;
                println!("Error report written to {}", path.display().to_string().cyan());
            }
            if let Some(path) = summary_json {
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), &summary).context("Failed to write summary")?;
                println!("Summary written to {}", path.display().to_string().cyan());
            }
            if let Some(path) = credentials {
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                write_generated(&summary, BufWriter::new(file))?;
                println!("Generated values written to {}", path.display().to_string().cyan());
            }
        }
        Command::Check { input, error_report } => {
            let (plan, parsed, ctx) = load_run(&config, &input)?;
            let repository = batchsync::repository::MemoryRepository::new();
            let engine = SyncEngine::new(Arc::new(repository), plan, config.batch.clone(), config.retry.clone())?;
            let preparation = engine.prepare(&parsed.rows, &ctx)?;

            println!(
                "{} {} valid, {} rejected of {} rows",
                "✓".green(),
                preparation.valid.len().to_string().green(),
                preparation.rejected.len().to_string().yellow(),
                preparation.total
            );
            for result in &preparation.rejected {
                println!(
                    "  row {}: {}",
                    result.row.to_string().yellow(),
                    result.outcome.reason().unwrap_or_default()
                );
            }

            if let Some(path) = error_report {
                let mut aggregator = batchsync::summary::ResultAggregator::new(
                    uuid::Uuid::now_v7(),
                    preparation.total,
                    engine.batch_config().max_errors,
                );
                aggregator.record_all(preparation.rejected);
                let file = File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
                write_error_report(&aggregator.finish(), BufWriter::new(file))?;
                println!("Error report written to {}", path.display().to_string().cyan());
            }
        }
        Command::Profiles => {
            let loader = ProfileLoader::new(&config.profiles)?;
            if loader.is_empty() {
                println!("No profiles found");
            }
            for profile in loader.iter() {
                println!(
                    "{} {} {}",
                    profile.name.cyan(),
                    format!("[{}]", profile.resource).dimmed(),
                    profile.description
                );
            }
        }
    }

    Ok(())
}

/// Resolve the profile, read the input file and build the run context
fn load_run(config: &Config, input: &InputArgs) -> Result<(ImportPlan, ParsedInput, RunContext)> {
    let loader = ProfileLoader::new(&config.profiles)?;
    let plan = loader.plan(&input.profile)?;

    let parsed = read_file(&input.file)?;
    if parsed.malformed > 0 {
        println!(
            "{} {} malformed lines were skipped",
            "!".yellow(),
            parsed.malformed.to_string().yellow()
        );
    }

    let scope = match (input.month, input.year) {
        (Some(month), Some(year)) => Some(
            month_end_string(year, month).ok_or_else(|| eyre::eyre!("Invalid month {} of year {}", month, year))?,
        ),
        _ => input.scope.clone(),
    };

    let mut ctx = RunContext::new();
    ctx.scope_value = scope;
    ctx.caller_scope = input.caller_scope.clone();
    Ok((plan, parsed, ctx))
}

fn print_progress(snapshot: &ProgressSnapshot) {
    let counters = &snapshot.outcome_counters;
    println!(
        "[{}/{}] {:>3}% {} created, {} updated, {} skipped, {} failed",
        snapshot.batch_index,
        snapshot.batch_count,
        snapshot.percentage,
        counters.created.to_string().green(),
        counters.updated.to_string().green(),
        counters.skipped.to_string().yellow(),
        counters.failed.to_string().red()
    );
}

fn print_summary(summary: &RunSummary) {
    let mark = if summary.failed == 0 { "✓".green() } else { "✗".red() };
    println!(
        "{} {} of {} rows written in {} ms ({} created, {} updated, {} skipped, {} failed)",
        mark,
        summary.succeeded(),
        summary.total,
        summary.duration_ms,
        summary.created.to_string().green(),
        summary.updated.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.failed.to_string().red()
    );
    for error in summary.errors.iter().take(20) {
        println!("  row {}: {}", error.row.to_string().yellow(), error.reason);
    }
    if summary.errors.len() > 20 {
        println!("  ... and {} more", summary.errors.len() - 20);
    }
    if summary.errors_dropped > 0 {
        println!("  {} further errors were not kept", summary.errors_dropped);
    }
}
