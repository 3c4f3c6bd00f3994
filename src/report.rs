//! Result aggregation: per-case outcomes and the immutable [`Report`].
//!
//! Reports carry no timings, so grading the same submission twice serializes
//! to the same bytes.

use serde::Serialize;
use std::fmt;

use crate::errors::ErrorKind;
use crate::oracle::ExpectedOutcome;
use crate::runtime::Value;
use crate::suite::TestCase;

// ============================================================================
// CASE RESULTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CaseStatus {
    Pass,
    /// A value came back, but not the expected one (or an error was required).
    Fail {
        actual: Value,
        expected: ExpectedOutcome,
    },
    Errored {
        kind: ErrorKind,
        message: String,
    },
    TimedOut,
}

impl CaseStatus {
    pub fn errored(kind: ErrorKind, message: impl Into<String>) -> Self {
        CaseStatus::Errored {
            kind,
            message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, CaseStatus::Pass)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaseStatus::Pass => "PASS",
            CaseStatus::Fail { .. } => "FAIL",
            CaseStatus::Errored { .. } => "ERROR",
            CaseStatus::TimedOut => "TIMEOUT",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseStatus::Pass | CaseStatus::TimedOut => f.write_str(self.label()),
            CaseStatus::Fail { actual, expected } => {
                write!(f, "FAIL: got {}, expected {}", actual, expected)
            }
            CaseStatus::Errored { kind, message } => write!(f, "ERROR [{}] {}", kind, message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    #[serde(flatten)]
    pub case: TestCase,
    #[serde(flatten)]
    pub status: CaseStatus,
}

impl CaseResult {
    pub fn new(case: &TestCase, status: CaseStatus) -> Self {
        Self {
            case: case.clone(),
            status,
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Pass,
    Fail,
}

impl fmt::Display for Overall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overall::Pass => f.pad("PASS"),
            Overall::Fail => f.pad("FAIL"),
        }
    }
}

/// Graded outcome of one submission against one suite.
///
/// `passed + failed == results.len()`; `errored` and `timed_out` break down
/// part of `failed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub submission: String,
    pub digest: String,
    pub overall: Overall,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub timed_out: usize,
    pub results: Vec<CaseResult>,
}

impl Report {
    pub fn aggregate(
        submission: impl Into<String>,
        digest: impl Into<String>,
        results: Vec<CaseResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.status.is_pass()).count();
        let errored = results
            .iter()
            .filter(|r| matches!(r.status, CaseStatus::Errored { .. }))
            .count();
        let timed_out = results
            .iter()
            .filter(|r| matches!(r.status, CaseStatus::TimedOut))
            .count();
        let failed = results.len() - passed;
        let overall = if failed == 0 {
            Overall::Pass
        } else {
            Overall::Fail
        };

        Self {
            submission: submission.into(),
            digest: digest.into(),
            overall,
            passed,
            failed,
            errored,
            timed_out,
            results,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.overall == Overall::Pass
    }

    pub fn failing(&self) -> impl Iterator<Item = &CaseResult> {
        self.results.iter().filter(|r| !r.status.is_pass())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{}: {} ({}/{} passed)",
            self.submission,
            self.overall,
            self.passed,
            self.results.len()
        )
    }
}
