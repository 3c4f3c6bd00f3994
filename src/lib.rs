//! calcgrade: grades calculator submissions written in a small s-expression
//! language against a fixed arithmetic contract.
//!
//! The pipeline is [`loader`] → [`runner`] → [`report`], with [`oracle`]
//! supplying expected outcomes and [`grader`] tying them together for one
//! submission. [`batch`] grades whole directories on parallel workers.

pub mod batch;
pub mod cli;
pub mod config;
pub mod errors;
pub mod grader;
pub mod loader;
pub mod logging;
pub mod numeric;
pub mod oracle;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod suite;
pub mod syntax;

pub use errors::{ErrorKind, LoadError};
pub use grader::Grader;
pub use loader::{Callable, Loader, Slot, SubmissionBinding, SubmissionSource};
pub use numeric::Number;
pub use oracle::{expected_outcome, ExpectedOutcome, Operation};
pub use report::{CaseResult, CaseStatus, Overall, Report};
pub use runner::Runner;
pub use suite::{Suite, TestCase};
