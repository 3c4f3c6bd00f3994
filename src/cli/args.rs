//! Command-line arguments and subcommands for `calcgrade`.
//!
//! Declared with `clap`'s derive API. Flags that also exist in the config file
//! are optional here so an absent flag keeps the file's value.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::GraderConfig;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "calcgrade",
    version,
    about = "Grades calculator submissions against a fixed arithmetic contract."
)]
pub struct CalcgradeArgs {
    /// Log at debug level (overridden by CALCGRADE_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grade a single submission and print its report.
    Check {
        /// The calc script to grade.
        #[arg(required = true)]
        file: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        settings: Settings,
    },
    /// Grade every submission in a directory, writing one report per file.
    Grade {
        /// Directory searched recursively for submissions.
        #[arg(long, default_value = "submissions")]
        submissions: PathBuf,
        /// Directory receiving `<name>_grade_report.json` files.
        #[arg(long, default_value = "grade_reports")]
        output: PathBuf,
        /// Number of submissions graded in parallel.
        #[arg(long)]
        workers: Option<usize>,
        #[command(flatten)]
        settings: Settings,
    },
    /// List the suite's cases and their expected outcomes.
    Suite {
        #[command(flatten)]
        settings: Settings,
    },
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct Settings {
    /// YAML configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// YAML suite file (defaults to the built-in suite).
    #[arg(long)]
    pub suite: Option<PathBuf>,
    /// Per-case time budget in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl Settings {
    /// Applies flags on top of a loaded configuration.
    pub fn apply(&self, config: &mut GraderConfig) {
        if let Some(suite) = &self.suite {
            config.suite = Some(suite.clone());
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}
