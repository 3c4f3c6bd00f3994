//! # Test Runner
//!
//! Executes a suite against a [`SubmissionBinding`], one case at a time and in
//! suite order, and classifies each outcome against the oracle's expectation.
//!
//! Every invocation runs on its own named thread so a runaway candidate can be
//! abandoned: the runner waits on a channel with `recv_timeout`, and on expiry
//! it trips the invocation's [`CancelToken`] and moves on without joining.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::errors::ErrorKind;
use crate::loader::{Callable, Slot, SubmissionBinding};
use crate::numeric::Number;
use crate::oracle::{classify_raised, ExpectedOutcome};
use crate::report::{CaseResult, CaseStatus};
use crate::runtime::{CancelToken, EvalError, Raised, Value, INVOCATION_STACK_SIZE};
use crate::suite::{Suite, TestCase};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// How a single invocation ended.
#[derive(Debug)]
enum Invocation {
    Returned(Value),
    Raised(Raised),
    Crashed(String),
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
pub struct Runner {
    timeout: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Runner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs every case in order. A case never aborts the ones after it.
    pub fn run(&self, suite: &Suite, binding: &SubmissionBinding) -> Vec<CaseResult> {
        suite
            .iter()
            .map(|case| self.run_case(case, binding))
            .collect()
    }

    pub fn run_case(&self, case: &TestCase, binding: &SubmissionBinding) -> CaseResult {
        let status = match binding.slot(case.operation) {
            Slot::Unbound => CaseStatus::errored(
                ErrorKind::MissingSymbol,
                format!("operation '{}' is not defined", case.operation),
            ),
            Slot::Bound(callable) => {
                let (a, b) = case.inputs;
                let invocation = self.invoke(Arc::clone(callable), a, b, &case.name);
                classify(&case.expectation, invocation)
            }
        };

        tracing::debug!(case = %case.name, status = status.label(), "case finished");
        CaseResult::new(case, status)
    }

    fn invoke(&self, callable: Arc<dyn Callable>, a: Number, b: Number, label: &str) -> Invocation {
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name(thread_name(label))
            .stack_size(INVOCATION_STACK_SIZE)
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    callable.invoke(a, b, &worker_cancel)
                }));
                // The receiver is gone when the case already timed out.
                let _ = tx.send(outcome);
            });
        if let Err(err) = spawned {
            tracing::error!(case = %label, error = %err, "could not spawn invocation thread");
            return Invocation::Crashed(format!("could not start invocation: {}", err));
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(Ok(value))) => Invocation::Returned(value),
            Ok(Ok(Err(EvalError::Raised(raised)))) => Invocation::Raised(raised),
            Ok(Ok(Err(EvalError::Interrupted))) => Invocation::TimedOut,
            Ok(Err(payload)) => Invocation::Crashed(panic_message(payload.as_ref())),
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                tracing::warn!(
                    case = %label,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "invocation exceeded its time budget, abandoning it"
                );
                Invocation::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                Invocation::Crashed("invocation ended without a result".to_string())
            }
        }
    }
}

fn classify(expected: &ExpectedOutcome, invocation: Invocation) -> CaseStatus {
    match invocation {
        Invocation::Returned(actual) => {
            if expected.accepts_value(&actual) {
                CaseStatus::Pass
            } else {
                CaseStatus::Fail {
                    actual,
                    expected: *expected,
                }
            }
        }
        Invocation::Raised(raised) => {
            if expected.accepts_raised(&raised.kind) {
                CaseStatus::Pass
            } else {
                CaseStatus::errored(classify_raised(&raised.kind), raised.to_string())
            }
        }
        Invocation::Crashed(message) => CaseStatus::errored(ErrorKind::UnexpectedError, message),
        Invocation::TimedOut => CaseStatus::TimedOut,
    }
}

/// Thread names cannot contain NUL bytes.
fn thread_name(label: &str) -> String {
    format!("case-{}", label.replace('\0', ""))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
