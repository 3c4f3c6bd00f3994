//! # calcgrade Error Handling
//!
//! Two families of failure live here and they must not be confused:
//!
//! - [`ErrorKind`] is *data*. It classifies what went wrong with a candidate
//!   (division by zero, missing operation, load failure, timeout) and ends up
//!   inside a [`crate::report::Report`]. Nothing about it is fatal.
//! - [`LoadError`], [`SuiteError`], [`ConfigError`] and [`CliError`] are Rust
//!   errors with `miette` diagnostics. They describe problems with the harness
//!   inputs themselves and are rendered to the operator.

use miette::{Diagnostic, NamedSource, SourceSpan};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::syntax::Span;

pub type SourceArc = Arc<NamedSource<String>>;

// ============================================================================
// ERROR TAXONOMY - what a case can fail with
// ============================================================================

/// Classification of a non-value outcome, used both by expectations
/// (`FailsWith(kind)`) and by `Errored` case results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    DivisionByZero,
    /// Real-valued result does not exist (e.g. a negative base raised to a
    /// fractional exponent).
    InvalidDomain,
    MissingSymbol,
    LoadFailure,
    TimedOut,
    UnexpectedError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DivisionByZero => "division-by-zero",
            ErrorKind::InvalidDomain => "invalid-domain",
            ErrorKind::MissingSymbol => "missing-symbol",
            ErrorKind::LoadFailure => "load-failure",
            ErrorKind::TimedOut => "timed-out",
            ErrorKind::UnexpectedError => "unexpected-error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LOAD ERRORS - the candidate blob could not be bound
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum LoadError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(calcgrade::load::syntax))]
    Syntax {
        message: String,
        #[source_code]
        src: SourceArc,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("malformed definition: {message}")]
    #[diagnostic(
        code(calcgrade::load::definition),
        help("definitions look like `(define (name a b) body)` or `(define name 42)`")
    )]
    MalformedDefinition {
        message: String,
        #[source_code]
        src: SourceArc,
        #[label("in this form")]
        span: SourceSpan,
    },
}

impl LoadError {
    pub fn syntax(message: impl Into<String>, src: &SourceArc, span: Span) -> Self {
        LoadError::Syntax {
            message: message.into(),
            src: Arc::clone(src),
            span: to_source_span(span),
        }
    }

    pub fn malformed(message: impl Into<String>, src: &SourceArc, span: Span) -> Self {
        LoadError::MalformedDefinition {
            message: message.into(),
            src: Arc::clone(src),
            span: to_source_span(span),
        }
    }
}

pub fn to_source_span(span: Span) -> SourceSpan {
    SourceSpan::new(span.start.into(), span.end.saturating_sub(span.start))
}

// ============================================================================
// HARNESS INPUT ERRORS - suite files and configuration
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum SuiteError {
    #[error("cannot read suite file {path}")]
    #[diagnostic(code(calcgrade::suite::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid suite file {path}")]
    #[diagnostic(code(calcgrade::suite::format))]
    Format {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("suite contains no test cases")]
    #[diagnostic(code(calcgrade::suite::empty))]
    Empty,

    #[error("duplicate test case name '{name}'")]
    #[diagnostic(
        code(calcgrade::suite::duplicate),
        help("case names identify results in reports and must be unique")
    )]
    DuplicateName { name: String },
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    #[diagnostic(code(calcgrade::config::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    #[diagnostic(code(calcgrade::config::format))]
    Format {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting `{field}`: {reason}")]
    #[diagnostic(code(calcgrade::config::invalid))]
    Invalid { field: &'static str, reason: String },
}

/// Everything the command line can fail with before grading starts.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Suite(#[from] SuiteError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot read submission {path}")]
    #[diagnostic(code(calcgrade::io::submission))]
    Submission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write report {path}")]
    #[diagnostic(code(calcgrade::io::report))]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize report")]
    #[diagnostic(code(calcgrade::io::serialize))]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds_serialize_kebab_case() {
        let json = serde_json::to_string(&ErrorKind::DivisionByZero).unwrap();
        assert_eq!(json, "\"division-by-zero\"");
        let kind: ErrorKind = serde_json::from_str("\"missing-symbol\"").unwrap();
        assert_eq!(kind, ErrorKind::MissingSymbol);
    }

    #[test]
    fn display_matches_serialized_name() {
        for kind in [
            ErrorKind::DivisionByZero,
            ErrorKind::InvalidDomain,
            ErrorKind::MissingSymbol,
            ErrorKind::LoadFailure,
            ErrorKind::TimedOut,
            ErrorKind::UnexpectedError,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind));
        }
    }

    #[test]
    fn load_error_carries_diagnostic_code() {
        let src: SourceArc = Arc::new(NamedSource::new("s.calc", "(define".to_string()));
        let err = LoadError::syntax("unclosed list", &src, Span { start: 0, end: 7 });
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("calcgrade::load::syntax"));
    }
}
