//! Grading one submission: load, run, aggregate.

use std::sync::Arc;

use crate::config::GraderConfig;
use crate::errors::{ErrorKind, LoadError};
use crate::loader::{Loader, SubmissionSource};
use crate::report::{CaseResult, CaseStatus, Report};
use crate::runner::Runner;
use crate::suite::Suite;

/// Shared, read-only grading setup. Cheap to clone across workers; every
/// call to [`Grader::grade`] builds its own binding.
#[derive(Debug, Clone)]
pub struct Grader {
    suite: Arc<Suite>,
    loader: Loader,
    runner: Runner,
}

impl Grader {
    pub fn new(suite: Arc<Suite>, config: &GraderConfig) -> Self {
        Self {
            suite,
            loader: Loader::new(config.max_call_depth),
            runner: Runner::new(config.timeout()),
        }
    }

    pub fn suite(&self) -> &Suite {
        &self.suite
    }

    pub fn grade(&self, source: &SubmissionSource) -> Report {
        self.grade_detailed(source).0
    }

    /// Like [`Grader::grade`], also handing back the load error, if any, so
    /// callers can render it.
    pub fn grade_detailed(&self, source: &SubmissionSource) -> (Report, Option<LoadError>) {
        let _span = tracing::info_span!("grade", submission = %source.name).entered();

        let (results, load_error) = match self.loader.load(source) {
            Ok(binding) => (self.runner.run(&self.suite, &binding), None),
            Err(err) => {
                tracing::warn!(error = %err, "submission failed to load");
                let status = CaseStatus::errored(ErrorKind::LoadFailure, err.to_string());
                let results = self
                    .suite
                    .iter()
                    .map(|case| CaseResult::new(case, status.clone()))
                    .collect();
                (results, Some(err))
            }
        };

        let report = Report::aggregate(&source.name, source.digest(), results);
        tracing::info!(
            passed = report.passed,
            failed = report.failed,
            overall = %report.overall,
            "graded"
        );
        (report, load_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grader() -> Grader {
        Grader::new(Arc::new(Suite::builtin()), &GraderConfig::default())
    }

    #[test]
    fn load_failure_errors_every_case() {
        let source = SubmissionSource::new("broken.calc", "(define (add a b)");
        let (report, err) = grader().grade_detailed(&source);
        assert!(err.is_some());
        assert_eq!(report.passed, 0);
        assert_eq!(report.errored, report.results.len());
        assert!(report.results.iter().all(|r| matches!(
            r.status,
            CaseStatus::Errored {
                kind: ErrorKind::LoadFailure,
                ..
            }
        )));
    }

    #[test]
    fn empty_submission_is_all_missing_symbols() {
        let report = grader().grade(&SubmissionSource::new("empty.calc", ""));
        assert_eq!(report.failed, Suite::builtin().len());
        assert!(report.results.iter().all(|r| matches!(
            r.status,
            CaseStatus::Errored {
                kind: ErrorKind::MissingSymbol,
                ..
            }
        )));
    }
}
