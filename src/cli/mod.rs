//! The calcgrade Command-Line Interface.
//!
//! Parses arguments, resolves configuration and the suite, then dispatches to
//! the grading library. Exit status: 0 when everything graded passes, 1 when
//! anything fails, 2 when the harness inputs themselves are unusable.

use clap::Parser;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use crate::batch;
use crate::cli::args::{CalcgradeArgs, Command, Settings};
use crate::config::GraderConfig;
use crate::errors::CliError;
use crate::grader::Grader;
use crate::loader::SubmissionSource;
use crate::logging;
use crate::suite::Suite;

pub mod args;
pub mod output;

pub const EXIT_PASS: u8 = 0;
pub const EXIT_FAIL: u8 = 1;
pub const EXIT_USAGE: u8 = 2;

/// The main entry point for the CLI.
pub fn run() -> ExitCode {
    let args = CalcgradeArgs::parse();
    logging::init(args.verbose);

    let result = match args.command {
        Command::Check {
            file,
            json,
            settings,
        } => handle_check(&file, json, &settings),
        Command::Grade {
            submissions,
            output,
            workers,
            settings,
        } => handle_grade(&submissions, &output, workers, &settings),
        Command::Suite { settings } => handle_suite(&settings),
    };

    match result {
        Ok(passed) if passed => ExitCode::from(EXIT_PASS),
        Ok(_) => ExitCode::from(EXIT_FAIL),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Loads the config file and applies flag overrides.
fn resolve_config(settings: &Settings) -> Result<GraderConfig, CliError> {
    let mut config = GraderConfig::load_or_default(settings.config.as_deref())?;
    settings.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn resolve_suite(config: &GraderConfig) -> Result<Arc<Suite>, CliError> {
    let suite = match &config.suite {
        Some(path) => Suite::load(path)?,
        None => Suite::builtin(),
    };
    tracing::debug!(cases = suite.len(), "suite ready");
    Ok(Arc::new(suite))
}

/// Handles the `check` subcommand.
fn handle_check(path: &Path, json: bool, settings: &Settings) -> Result<bool, CliError> {
    let config = resolve_config(settings)?;
    let grader = Grader::new(resolve_suite(&config)?, &config);
    let source = SubmissionSource::read(path).map_err(|source| CliError::Submission {
        path: path.to_path_buf(),
        source,
    })?;

    let (report, load_error) = grader.grade_detailed(&source);
    if let Some(err) = load_error {
        eprintln!("{:?}", miette::Report::new(err));
    }

    let mut out = output::stdout(config.use_color());
    if json {
        writeln!(out, "{}", report.to_json()?).map_err(stdout_error)?;
    } else {
        output::print_report(&mut out, &report).map_err(stdout_error)?;
    }
    Ok(report.is_pass())
}

/// Handles the `grade` subcommand.
fn handle_grade(
    submissions: &Path,
    output_dir: &Path,
    workers: Option<usize>,
    settings: &Settings,
) -> Result<bool, CliError> {
    let mut config = resolve_config(settings)?;
    if let Some(workers) = workers {
        config.workers = workers;
        config.validate()?;
    }
    let grader = Grader::new(resolve_suite(&config)?, &config);
    let summary = batch::grade_directory(&grader, submissions, output_dir, &config)?;

    let mut out = output::stdout(config.use_color());
    output::print_batch_summary(&mut out, &summary).map_err(stdout_error)?;
    Ok(summary.all_passed())
}

/// Handles the `suite` subcommand.
fn handle_suite(settings: &Settings) -> Result<bool, CliError> {
    let config = resolve_config(settings)?;
    let suite = resolve_suite(&config)?;
    let mut out = output::stdout(config.use_color());
    output::print_suite(&mut out, &suite).map_err(stdout_error)?;
    Ok(true)
}

fn stdout_error(source: std::io::Error) -> CliError {
    CliError::Report {
        path: "<stdout>".into(),
        source,
    }
}
