//! Batch grading of a directory of submissions.
//!
//! Submissions are discovered recursively, sorted, and graded by a fixed pool
//! of scoped worker threads. Each worker owns the bindings it creates; the
//! only shared state is the read-only [`Grader`] and a work cursor. One
//! report file is written per submission.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use walkdir::WalkDir;

use crate::config::GraderConfig;
use crate::errors::CliError;
use crate::grader::Grader;
use crate::loader::SubmissionSource;
use crate::report::Report;

pub const REPORT_SUFFIX: &str = "_grade_report.json";

#[derive(Debug)]
pub enum BatchEntry {
    Graded {
        submission: PathBuf,
        report: Report,
        report_path: PathBuf,
    },
    /// Could not be read or its report could not be written.
    Skipped { submission: PathBuf, reason: String },
}

impl BatchEntry {
    pub fn submission(&self) -> &Path {
        match self {
            BatchEntry::Graded { submission, .. } | BatchEntry::Skipped { submission, .. } => {
                submission
            }
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, BatchEntry::Graded { report, .. } if report.is_pass())
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    /// In discovery order.
    pub entries: Vec<BatchEntry>,
}

impl BatchSummary {
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(BatchEntry::passed)
    }

    pub fn graded(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, BatchEntry::Graded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.entries.len() - self.graded()
    }
}

/// Recursively finds submission files under `root`, sorted by path.
/// Unreadable directory entries are logged and skipped.
pub fn discover(root: &Path, config: &GraderConfig) -> Result<Vec<PathBuf>, CliError> {
    if !root.is_dir() {
        return Err(CliError::Submission {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && config.is_submission(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    tracing::debug!(root = %root.display(), count = files.len(), "discovered submissions");
    Ok(files)
}

/// `dir/alice.calc` under `root` becomes `dir_alice_grade_report.json`.
pub fn report_file_name(root: &Path, submission: &Path) -> String {
    let relative = submission.strip_prefix(root).unwrap_or(submission);
    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let stem = submission
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "submission".to_string());
    parts.push(stem);
    format!("{}{}", parts.join("_"), REPORT_SUFFIX)
}

/// Grades every submission under `submissions`, writing reports to `output`.
pub fn grade_directory(
    grader: &Grader,
    submissions: &Path,
    output: &Path,
    config: &GraderConfig,
) -> Result<BatchSummary, CliError> {
    let files = discover(submissions, config)?;
    fs::create_dir_all(output).map_err(|source| CliError::Report {
        path: output.to_path_buf(),
        source,
    })?;

    let workers = config.workers.clamp(1, files.len().max(1));
    tracing::info!(submissions = files.len(), workers, "starting batch");

    let cursor = &AtomicUsize::new(0);
    let files = &files;
    let mut indexed: Vec<(usize, BatchEntry)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(move || {
                    let mut done = Vec::new();
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = files.get(index) else {
                            break;
                        };
                        done.push((index, grade_one(grader, submissions, path, output)));
                    }
                    done
                })
            })
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(done) => done,
                Err(_) => {
                    tracing::error!("batch worker panicked");
                    Vec::new()
                }
            })
            .collect()
    });
    indexed.sort_by_key(|(index, _)| *index);

    Ok(BatchSummary {
        entries: indexed.into_iter().map(|(_, entry)| entry).collect(),
    })
}

fn grade_one(grader: &Grader, root: &Path, path: &Path, output: &Path) -> BatchEntry {
    let source = match SubmissionSource::read(path) {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "cannot read submission");
            return BatchEntry::Skipped {
                submission: path.to_path_buf(),
                reason: format!("cannot read submission: {}", err),
            };
        }
    };

    let report = grader.grade(&source);
    let report_path = output.join(report_file_name(root, path));
    let written = report
        .to_json()
        .map_err(|err| err.to_string())
        .and_then(|json| fs::write(&report_path, json + "\n").map_err(|err| err.to_string()));

    match written {
        Ok(()) => BatchEntry::Graded {
            submission: path.to_path_buf(),
            report,
            report_path,
        },
        Err(err) => {
            tracing::error!(path = %report_path.display(), error = %err, "cannot write report");
            BatchEntry::Skipped {
                submission: path.to_path_buf(),
                reason: format!("cannot write report {}: {}", report_path.display(), err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::Suite;
    use std::sync::Arc;

    const GOOD: &str = "(define (add a b) (+ a b))";

    #[test]
    fn report_names_follow_the_submission_path() {
        let root = Path::new("/subs");
        assert_eq!(
            report_file_name(root, Path::new("/subs/alice.calc")),
            "alice_grade_report.json"
        );
        assert_eq!(
            report_file_name(root, Path::new("/subs/week1/bob.calc")),
            "week1_bob_grade_report.json"
        );
    }

    #[test]
    fn discovers_sorted_submissions_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.calc"), GOOD).unwrap();
        fs::write(dir.path().join("a.calc"), GOOD).unwrap();
        fs::write(dir.path().join("nested/c.calc"), GOOD).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let found = discover(dir.path(), &GraderConfig::default()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.calc"),
                PathBuf::from("b.calc"),
                PathBuf::from("nested/c.calc")
            ]
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("nope"), &GraderConfig::default()).is_err());
    }

    #[test]
    fn grades_every_submission_and_writes_reports() {
        let subs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        for i in 0..5 {
            fs::write(subs.path().join(format!("s{}.calc", i)), GOOD).unwrap();
        }
        fs::write(subs.path().join("broken.calc"), "(define").unwrap();

        let config = GraderConfig {
            workers: 3,
            ..GraderConfig::default()
        };
        let grader = Grader::new(Arc::new(Suite::builtin()), &config);
        let summary = grade_directory(&grader, subs.path(), out.path(), &config).unwrap();

        assert_eq!(summary.graded(), 6);
        assert_eq!(summary.skipped(), 0);
        assert!(!summary.all_passed());
        assert_eq!(
            summary.entries[0].submission().file_name().unwrap(),
            "broken.calc"
        );
        for entry in &summary.entries {
            let BatchEntry::Graded { report_path, .. } = entry else {
                panic!("expected graded entry");
            };
            assert!(report_path.exists());
        }
        assert!(out.path().join("s3_grade_report.json").exists());
    }
}
