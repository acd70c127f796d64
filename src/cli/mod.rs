pub mod progress;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "refacdir")]
#[command(about = "Content-addressed backup, mirror and duplicate cleanup", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./Config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, clap::Args)]
pub struct RunArgs {
    /// Dry run: print the plan without touching any file
    #[arg(short, long)]
    pub test: bool,
    /// Do not ask before replacements and removals
    #[arg(short = 'y', long)]
    pub skip_confirm: bool,
    /// Only run the job with this name
    #[arg(long)]
    pub only: Option<String>,
    /// Stop starting new operations after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Write the execution report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the configured backup mappings in order
    Backup(RunArgs),
    /// Run the configured duplicate removers in order
    Dedupe {
        #[command(flatten)]
        run: RunArgs,
        /// Write one duplicates CSV per remover into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Print configuration values
    PrintConfig,
}
