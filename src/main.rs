mod cli;
mod logging;
mod utils;

use std::process;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::progress::CliReporter;
use cli::{Cli, Commands, RunArgs};
use colored::*;
use dotenv::dotenv;
use refacdir::engine::JobOutcome;
use refacdir::executor::{write_json_report, Outcome};
use refacdir::{AppConfig, RunOptions, RunSummary, SyncEngine};
use tracing::{error, info, warn};
use utils::prompt::prompt_confirm;
use utils::PromptConfirm;

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match refacdir::config::load_configuration(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let result = match args.command {
        Some(Commands::Backup(run)) => run_backups(&config, &run),
        Some(Commands::Dedupe { run, csv_dir }) => run_dedupe(&config, &run, csv_dir),
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(true)
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("Error: {:#}", err);
            process::exit(1);
        }
    }
}

fn run_options(run: &RunArgs) -> RunOptions {
    RunOptions {
        test: run.test,
        skip_confirm: run.skip_confirm,
        only: run.only.clone(),
        deadline: run
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs)),
        duplicate_report_dir: None,
    }
}

/// Returns `Ok(false)` when any operation failed.
fn run_backups(config: &AppConfig, run: &RunArgs) -> anyhow::Result<bool> {
    let options = run_options(run);
    let confirm = PromptConfirm;
    let reporter = CliReporter::new();
    let engine = SyncEngine::new(config, &confirm, &reporter);

    let mappings = engine.selected_mappings(&options);
    if mappings.is_empty() {
        warn!("No backup mappings selected");
        return Ok(true);
    }
    for mapping in &mappings {
        info!(
            "{} {} {} -> {}",
            mapping.name.bold(),
            format!("[{}]", mapping.mode).cyan(),
            mapping.source_dir,
            mapping.target_dir
        );
    }
    if !options.test && !options.skip_confirm && !prompt_confirm("Run these backup mappings?", Some(true))? {
        info!("No change made");
        return Ok(true);
    }

    let summary = engine.run_backups(&options);
    finish(&summary, run)
}

fn run_dedupe(config: &AppConfig, run: &RunArgs, csv_dir: Option<std::path::PathBuf>) -> anyhow::Result<bool> {
    let mut options = run_options(run);
    options.duplicate_report_dir = csv_dir;
    let confirm = PromptConfirm;
    let reporter = CliReporter::new();
    let engine = SyncEngine::new(config, &confirm, &reporter);

    if engine.selected_removers(&options).is_empty() {
        warn!("No duplicate removers selected");
        return Ok(true);
    }
    let summary = engine.run_duplicate_removers(&options);
    finish(&summary, run)
}

fn finish(summary: &RunSummary, run: &RunArgs) -> anyhow::Result<bool> {
    println!();
    for job in &summary.jobs {
        print_job(job);
    }
    if let Some(path) = &run.report {
        write_json_report(path, summary)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }
    Ok(!summary.has_failures())
}

fn print_job(job: &JobOutcome) {
    if let Some(err) = &job.error {
        error!("{}: {}", job.name.bold(), err.red());
        return;
    }
    let Some(report) = &job.report else {
        return;
    };
    let c = &report.counts;
    if report.dry_run {
        info!(
            "{} {}: {} operation(s) planned, {} skipped, {} conflict(s)",
            job.name.bold(),
            "(dry run)".yellow(),
            format!("{}", c.planned).cyan(),
            c.skipped,
            format!("{}", c.conflicts).red(),
        );
    } else {
        info!(
            "{}: {} copied, {} removed, {} dir(s) created, {} dir(s) removed, {} skipped, {} failed",
            job.name.bold(),
            format!("{}", c.copied).green(),
            format!("{}", c.removed).green(),
            c.dirs_created,
            c.dirs_removed,
            c.skipped,
            format!("{}", c.failed).red(),
        );
    }
    if c.declined > 0 {
        warn!("{}: {} destructive operation(s) declined", job.name, c.declined);
    }
    for entry in report.failures() {
        if let Outcome::Failed { kind, reason } = &entry.outcome {
            error!("  {:?}: {} ({})", kind, entry.operation, reason);
        }
    }
    for issue in &job.scan_issues {
        error!("  unreadable: {} ({})", issue.path.display(), issue.reason);
    }
}

fn print_config(config: &AppConfig) -> anyhow::Result<bool> {
    println!("{}", config.to_toml().context("serializing configuration")?);
    Ok(true)
}
