//! Runtime module for calc scripts
//!
//! Runtime value types, the candidate-side error model and the cancellation
//! token shared between the runner and the interpreter. Everything a
//! candidate computes is a [`Value`]; everything it can fail with is a
//! [`Raised`] error, which is data for the grader and never a Rust error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::numeric::Number;

pub mod builtins;
pub mod eval;

pub use eval::{Function, Interpreter, Program, INVOCATION_STACK_SIZE, MAX_EVAL_NESTING};

// ============================================================================
// VALUES
// ============================================================================

/// Canonical runtime value for calc script evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(Number),
    Bool(bool),
    String(String),
    /// Absence of a value. Serialized as `null`.
    #[default]
    Nil,
}

impl Value {
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Only `false` and `nil` are falsy; `0` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false) | Value::Nil)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Nil => "nil",
        }
    }
}

impl From<Number> for Value {
    fn from(value: Number) -> Self {
        Value::Number(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Nil => f.write_str("nil"),
        }
    }
}

// ============================================================================
// RAISED ERRORS
// ============================================================================

/// The family of an error signalled by candidate code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RaisedKind {
    ZeroDivision,
    ValueError,
    ArithmeticError,
    TypeError,
    NameError,
    ArityError,
    RecursionError,
    /// A special form used with the wrong shape at runtime.
    SyntaxError,
    Custom(String),
}

impl RaisedKind {
    /// Maps the symbol used in `(raise <kind> "message")` to a kind.
    pub fn from_symbol(symbol: &str) -> Self {
        match symbol {
            "zero-division" => RaisedKind::ZeroDivision,
            "value-error" => RaisedKind::ValueError,
            "arithmetic-error" => RaisedKind::ArithmeticError,
            "type-error" => RaisedKind::TypeError,
            "name-error" => RaisedKind::NameError,
            "arity-error" => RaisedKind::ArityError,
            "recursion-error" => RaisedKind::RecursionError,
            "syntax-error" => RaisedKind::SyntaxError,
            other => RaisedKind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RaisedKind::ZeroDivision => "zero-division",
            RaisedKind::ValueError => "value-error",
            RaisedKind::ArithmeticError => "arithmetic-error",
            RaisedKind::TypeError => "type-error",
            RaisedKind::NameError => "name-error",
            RaisedKind::ArityError => "arity-error",
            RaisedKind::RecursionError => "recursion-error",
            RaisedKind::SyntaxError => "syntax-error",
            RaisedKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for RaisedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error signalled by candidate code, either explicitly via `raise` or by
/// a builtin rejecting its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Raised {
    pub kind: RaisedKind,
    pub message: String,
}

impl Raised {
    pub fn new(kind: RaisedKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn zero_division(message: impl Into<String>) -> Self {
        Self::new(RaisedKind::ZeroDivision, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(RaisedKind::ValueError, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(RaisedKind::TypeError, message)
    }

    pub fn arity(name: &str, expected: &str, actual: usize) -> Self {
        Self::new(
            RaisedKind::ArityError,
            format!("{} expects {} argument(s), got {}", name, expected, actual),
        )
    }
}

impl fmt::Display for Raised {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Why an evaluation stopped without producing a value.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Raised(Raised),
    /// The cancellation token was tripped; the result is abandoned.
    Interrupted,
}

impl From<Raised> for EvalError {
    fn from(raised: Raised) -> Self {
        EvalError::Raised(raised)
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancellation flag checked by the interpreter at every step.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
