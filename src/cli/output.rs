//! Handles all user-facing output for the CLI.
//!
//! Text reports are colorized with `termcolor`. Every printer writes to a
//! [`WriteColor`] so the same code renders to stdout or to an in-memory
//! buffer.

use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::batch::{BatchEntry, BatchSummary};
use crate::report::{CaseStatus, Report};
use crate::suite::Suite;

pub fn stdout(use_color: bool) -> StandardStream {
    StandardStream::stdout(if use_color {
        ColorChoice::Always
    } else {
        ColorChoice::Never
    })
}

// ============================================================================
// REPORTS
// ============================================================================

/// Prints one line per case followed by a summary line.
pub fn print_report(out: &mut impl WriteColor, report: &Report) -> io::Result<()> {
    bold(out, None)?;
    writeln!(out, "{} ({})", report.submission, short_digest(&report.digest))?;
    out.reset()?;

    let width = report
        .results
        .iter()
        .map(|r| r.case.name.len())
        .max()
        .unwrap_or(0);

    for result in &report.results {
        let case = &result.case;
        colored(out, status_color(&result.status))?;
        write!(out, "  {:<7}", result.status.label())?;
        out.reset()?;
        write!(
            out,
            " {:<width$}  {}({}, {})",
            case.name,
            case.operation,
            case.inputs.0,
            case.inputs.1,
            width = width
        )?;
        match &result.status {
            CaseStatus::Pass | CaseStatus::TimedOut => writeln!(out)?,
            CaseStatus::Fail { actual, expected } => {
                writeln!(out, "  got {}, expected {}", actual, expected)?
            }
            CaseStatus::Errored { kind, message } => writeln!(out, "  [{}] {}", kind, message)?,
        }
    }

    print_totals(out, report)
}

fn print_totals(out: &mut impl WriteColor, report: &Report) -> io::Result<()> {
    let color = if report.is_pass() {
        Color::Green
    } else {
        Color::Red
    };
    bold(out, Some(color))?;
    write!(out, "{}", report.overall)?;
    out.reset()?;
    writeln!(
        out,
        ": {} passed, {} failed ({} errored, {} timed out)",
        report.passed, report.failed, report.errored, report.timed_out
    )
}

pub fn print_batch_summary(out: &mut impl WriteColor, summary: &BatchSummary) -> io::Result<()> {
    for entry in &summary.entries {
        match entry {
            BatchEntry::Graded { report, .. } => {
                colored(
                    out,
                    if report.is_pass() {
                        Color::Green
                    } else {
                        Color::Red
                    },
                )?;
                write!(out, "{:<5}", report.overall)?;
                out.reset()?;
                writeln!(
                    out,
                    " {} ({}/{} passed)",
                    entry.submission().display(),
                    report.passed,
                    report.results.len()
                )?;
            }
            BatchEntry::Skipped { reason, .. } => {
                colored(out, Color::Yellow)?;
                write!(out, "{:<5}", "SKIP")?;
                out.reset()?;
                writeln!(out, " {}: {}", entry.submission().display(), reason)?;
            }
        }
    }
    let passed = summary.entries.iter().filter(|e| e.passed()).count();
    writeln!(
        out,
        "{} submissions: {} passed, {} graded, {} skipped",
        summary.entries.len(),
        passed,
        summary.graded(),
        summary.skipped()
    )
}

pub fn print_suite(out: &mut impl WriteColor, suite: &Suite) -> io::Result<()> {
    let width = suite.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for case in suite {
        write!(out, "{:<width$}  ", case.name, width = width)?;
        colored(out, Color::Cyan)?;
        write!(out, "{}({}, {})", case.operation, case.inputs.0, case.inputs.1)?;
        out.reset()?;
        writeln!(out, " => {}", case.expectation)?;
    }
    writeln!(out, "{} cases", suite.len())
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn status_color(status: &CaseStatus) -> Color {
    match status {
        CaseStatus::Pass => Color::Green,
        CaseStatus::Fail { .. } => Color::Red,
        CaseStatus::Errored { .. } => Color::Magenta,
        CaseStatus::TimedOut => Color::Yellow,
    }
}

fn colored(out: &mut impl WriteColor, color: Color) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(color)))
}

fn bold(out: &mut impl WriteColor, color: Option<Color>) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(color).set_bold(true))
}

fn short_digest(digest: &str) -> &str {
    digest.get(..12).unwrap_or(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraderConfig;
    use crate::grader::Grader;
    use crate::loader::SubmissionSource;
    use std::sync::Arc;
    use termcolor::Buffer;

    fn render(report: &Report) -> String {
        let mut buffer = Buffer::no_color();
        print_report(&mut buffer, report).unwrap();
        String::from_utf8(buffer.into_inner()).unwrap()
    }

    #[test]
    fn report_lists_every_case() {
        let grader = Grader::new(Arc::new(Suite::builtin()), &GraderConfig::default());
        let report = grader.grade(&SubmissionSource::new(
            "partial.calc",
            "(define (add a b) (+ a b))",
        ));
        let text = render(&report);
        assert!(text.starts_with("partial.calc ("));
        assert!(text.contains("PASS    add_positive"));
        assert!(text.contains("[missing-symbol]"));
        assert!(text.trim_end().ends_with("timed out)"));
        assert_eq!(text.lines().count(), report.results.len() + 2);
    }

    #[test]
    fn suite_listing_shows_expectations() {
        let mut buffer = Buffer::no_color();
        print_suite(&mut buffer, &Suite::builtin()).unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("divide(10, 0) => error division-by-zero"));
        assert!(text.ends_with("19 cases\n"));
    }
}
