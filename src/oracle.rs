//! # Contract Oracle
//!
//! The authoritative definition of correct behavior for the five calculator
//! operations, and of how a candidate's answer is compared against it.
//!
//! The oracle is pure: [`expected_outcome`] is a function of its inputs only
//! and the module holds no state, so it can be shared freely between worker
//! threads.
//!
//! ## Comparison policy
//!
//! | Operation                | Expectation                                   |
//! |--------------------------|-----------------------------------------------|
//! | add, subtract, multiply  | exact over integers, `1e-9` relative otherwise |
//! | divide                   | `a / b` within `1e-9`; error when `b == 0`     |
//! | power (integer exponent) | repeated product, or its reciprocal, `1e-9`    |
//! | power (fractional)       | `exp(e * ln(b))` within `1e-6`, `b > 0` only   |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ErrorKind;
use crate::numeric::Number;
use crate::runtime::{RaisedKind, Value};

/// Relative tolerance for floating-point arithmetic results.
pub const ARITHMETIC_TOLERANCE: f64 = 1e-9;

/// Looser tolerance for fractional powers, where iterative and
/// transcendental evaluation legitimately drift apart.
pub const FRACTIONAL_POWER_TOLERANCE: f64 = 1e-6;

/// Tolerance for results that must match exactly.
pub const EXACT: f64 = 0.0;

// ============================================================================
// OPERATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Add,
        Operation::Subtract,
        Operation::Multiply,
        Operation::Divide,
        Operation::Power,
    ];

    /// The symbol a submission must define for this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Power => "power",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| format!("unknown operation '{}'", s))
    }
}

// ============================================================================
// EXPECTATIONS
// ============================================================================

/// What a correct implementation does for one set of inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExpectedOutcome {
    Value {
        value: Number,
        #[serde(default)]
        tolerance: f64,
    },
    FailsWith {
        error: ErrorKind,
    },
}

impl ExpectedOutcome {
    pub fn value(value: impl Into<Number>, tolerance: f64) -> Self {
        ExpectedOutcome::Value {
            value: value.into(),
            tolerance,
        }
    }

    pub fn fails_with(error: ErrorKind) -> Self {
        ExpectedOutcome::FailsWith { error }
    }

    /// Whether a returned value satisfies this expectation. A value never
    /// satisfies an error expectation, and only numbers satisfy a value one.
    pub fn accepts_value(&self, actual: &Value) -> bool {
        match (self, actual) {
            (ExpectedOutcome::Value { value, tolerance }, Value::Number(actual)) => {
                numbers_match(*actual, *value, *tolerance)
            }
            _ => false,
        }
    }

    /// Whether a raised error satisfies this expectation.
    pub fn accepts_raised(&self, raised: &RaisedKind) -> bool {
        match self {
            ExpectedOutcome::FailsWith { error } => is_compatible(*error, raised),
            ExpectedOutcome::Value { .. } => false,
        }
    }
}

impl fmt::Display for ExpectedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedOutcome::Value { value, tolerance } if *tolerance == EXACT => {
                write!(f, "{}", value)
            }
            ExpectedOutcome::Value { value, tolerance } => {
                write!(f, "{} (±{:e} rel)", value, tolerance)
            }
            ExpectedOutcome::FailsWith { error } => write!(f, "error {}", error),
        }
    }
}

// ============================================================================
// REFERENCE SEMANTICS
// ============================================================================

/// The expected outcome of `operation(a, b)`.
pub fn expected_outcome(operation: Operation, a: Number, b: Number) -> ExpectedOutcome {
    match operation {
        Operation::Add => arithmetic(a, b, a.checked_add(b)),
        Operation::Subtract => arithmetic(a, b, a.checked_sub(b)),
        Operation::Multiply => arithmetic(a, b, a.checked_mul(b)),
        Operation::Divide => divide(a, b),
        Operation::Power => power(a, b),
    }
}

fn arithmetic(a: Number, b: Number, result: Number) -> ExpectedOutcome {
    match result {
        Number::Int(_) if a.both_int(b) => ExpectedOutcome::value(result, EXACT),
        _ => ExpectedOutcome::value(result, ARITHMETIC_TOLERANCE),
    }
}

fn divide(a: Number, b: Number) -> ExpectedOutcome {
    if b.is_zero() {
        return ExpectedOutcome::fails_with(ErrorKind::DivisionByZero);
    }
    ExpectedOutcome::value(a.as_f64() / b.as_f64(), ARITHMETIC_TOLERANCE)
}

fn power(base: Number, exponent: Number) -> ExpectedOutcome {
    match exponent.as_integral() {
        Some(0) => ExpectedOutcome::value(1i64, EXACT),
        Some(n) if n > 0 => {
            let tolerance = if fits_exactly(base, n) {
                EXACT
            } else {
                ARITHMETIC_TOLERANCE
            };
            ExpectedOutcome::value(repeated_product(base, n.unsigned_abs()), tolerance)
        }
        Some(n) => {
            if base.is_zero() {
                return ExpectedOutcome::fails_with(ErrorKind::DivisionByZero);
            }
            let denominator = repeated_product(base, n.unsigned_abs());
            ExpectedOutcome::value(1.0 / denominator.as_f64(), ARITHMETIC_TOLERANCE)
        }
        None => fractional_power(base, exponent),
    }
}

fn fractional_power(base: Number, exponent: Number) -> ExpectedOutcome {
    if base.is_negative() {
        return ExpectedOutcome::fails_with(ErrorKind::InvalidDomain);
    }
    if base.is_zero() {
        return if exponent.is_negative() {
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        } else {
            ExpectedOutcome::value(0.0, FRACTIONAL_POWER_TOLERANCE)
        };
    }
    let value = (exponent.as_f64() * base.as_f64().ln()).exp();
    ExpectedOutcome::value(value, FRACTIONAL_POWER_TOLERANCE)
}

/// `base` multiplied by itself `n` times, exact while it fits.
///
/// Squaring keeps this logarithmic in `n`; the result is the same product.
fn repeated_product(base: Number, mut n: u64) -> Number {
    let mut result = Number::Int(1);
    let mut square = base;
    while n > 0 {
        if n & 1 == 1 {
            result = result.checked_mul(square);
        }
        n >>= 1;
        if n > 0 {
            square = square.checked_mul(square);
        }
    }
    result
}

/// Whether an integer base raised to `n` stays within `i64`.
fn fits_exactly(base: Number, n: i64) -> bool {
    match (base, u32::try_from(n)) {
        (Number::Int(b), Ok(e)) => b.checked_pow(e).is_some(),
        _ => false,
    }
}

// ============================================================================
// COMPARISON RULES
// ============================================================================

/// Relative-tolerance comparison: `|a - e| <= tol * max(|a|, |e|)`.
///
/// An exact integer expectation needs an integral actual equal in `i64`.
/// Equal infinities match and NaN only matches NaN.
pub fn numbers_match(actual: Number, expected: Number, tolerance: f64) -> bool {
    if let (Number::Int(e), true) = (expected, tolerance == EXACT) {
        return actual.as_integral() == Some(e);
    }
    let (a, e) = (actual.as_f64(), expected.as_f64());
    if e.is_nan() || a.is_nan() {
        return e.is_nan() && a.is_nan();
    }
    if a == e {
        return true;
    }
    if a.is_infinite() || e.is_infinite() {
        return false;
    }
    (a - e).abs() <= tolerance * a.abs().max(e.abs())
}

/// Error-kind compatibility. A division by zero may be signalled as a zero
/// division or as any invalid-value/arithmetic error.
pub fn is_compatible(expected: ErrorKind, raised: &RaisedKind) -> bool {
    match expected {
        ErrorKind::DivisionByZero => matches!(
            raised,
            RaisedKind::ZeroDivision | RaisedKind::ValueError | RaisedKind::ArithmeticError
        ),
        ErrorKind::InvalidDomain => {
            matches!(raised, RaisedKind::ValueError | RaisedKind::ArithmeticError)
        }
        ErrorKind::MissingSymbol
        | ErrorKind::LoadFailure
        | ErrorKind::TimedOut
        | ErrorKind::UnexpectedError => false,
    }
}

/// The taxonomy entry reported for an error the expectation did not accept.
pub fn classify_raised(raised: &RaisedKind) -> ErrorKind {
    match raised {
        RaisedKind::ZeroDivision => ErrorKind::DivisionByZero,
        _ => ErrorKind::UnexpectedError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Number {
        Number::Int(i)
    }

    fn float(f: f64) -> Number {
        Number::Float(f)
    }

    fn expected_value(outcome: ExpectedOutcome) -> (Number, f64) {
        match outcome {
            ExpectedOutcome::Value { value, tolerance } => (value, tolerance),
            other => panic!("expected a value, got {:?}", other),
        }
    }

    #[test]
    fn concrete_scenarios() {
        let (v, tol) = expected_value(expected_outcome(Operation::Add, int(2), int(3)));
        assert_eq!((v, tol), (int(5), EXACT));

        let (v, _) = expected_value(expected_outcome(Operation::Divide, int(7), int(2)));
        assert_eq!(v, float(3.5));

        assert_eq!(
            expected_outcome(Operation::Divide, int(10), int(0)),
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );

        let (v, _) = expected_value(expected_outcome(Operation::Power, int(2), int(3)));
        assert_eq!(v, int(8));
        let (v, _) = expected_value(expected_outcome(Operation::Power, int(2), int(-1)));
        assert_eq!(v, float(0.5));
        let (v, _) = expected_value(expected_outcome(Operation::Power, int(4), int(-2)));
        assert_eq!(v, float(0.0625));
    }

    #[test]
    fn add_is_subtract_of_negation() {
        for (a, b) in [(2, 3), (-7, 4), (0, 0), (i64::MAX, -1), (123, -456)] {
            let add = expected_outcome(Operation::Add, int(a), int(b));
            let sub = expected_outcome(Operation::Subtract, int(a), int(-b));
            assert_eq!(add, sub, "a={} b={}", a, b);
        }
    }

    #[test]
    fn multiply_by_zero_is_zero() {
        for a in [-5, 0, 1, 99, i64::MIN] {
            let (v, tol) = expected_value(expected_outcome(Operation::Multiply, int(a), int(0)));
            assert_eq!((v, tol), (int(0), EXACT));
        }
    }

    #[test]
    fn divide_by_zero_fails_for_every_numerator() {
        for a in [1, -1, 10, i64::MAX] {
            assert_eq!(
                expected_outcome(Operation::Divide, int(a), int(0)),
                ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
            );
        }
        assert_eq!(
            expected_outcome(Operation::Divide, float(2.5), float(0.0)),
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn negative_power_is_reciprocal() {
        for x in [2, -3, 5, 10] {
            for n in 1..=6 {
                let (pos, _) = expected_value(expected_outcome(Operation::Power, int(x), int(n)));
                let (neg, tol) =
                    expected_value(expected_outcome(Operation::Power, int(x), int(-n)));
                assert!(numbers_match(neg, float(1.0 / pos.as_f64()), tol.max(1e-9)));
            }
        }
    }

    #[test]
    fn zero_exponent_is_one_for_any_base() {
        for base in [int(0), int(5), float(0.0), float(-2.5)] {
            let (v, tol) = expected_value(expected_outcome(Operation::Power, base, int(0)));
            assert_eq!((v, tol), (int(1), EXACT));
        }
        let (v, _) = expected_value(expected_outcome(Operation::Power, int(3), float(0.0)));
        assert_eq!(v, int(1));
    }

    #[test]
    fn zero_base_negative_exponent_fails() {
        assert_eq!(
            expected_outcome(Operation::Power, int(0), int(-2)),
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );
        assert_eq!(
            expected_outcome(Operation::Power, int(0), float(-0.5)),
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn fractional_power_uses_loose_tolerance() {
        let (v, tol) = expected_value(expected_outcome(Operation::Power, int(9), float(0.5)));
        assert_eq!(tol, FRACTIONAL_POWER_TOLERANCE);
        assert!(numbers_match(float(3.0), v, tol));
        assert_eq!(
            expected_outcome(Operation::Power, int(-8), float(0.5)),
            ExpectedOutcome::fails_with(ErrorKind::InvalidDomain)
        );
    }

    #[test]
    fn big_integer_power_falls_back_to_float() {
        let (v, tol) = expected_value(expected_outcome(Operation::Power, int(10), int(30)));
        assert!(matches!(v, Number::Float(_)));
        assert_eq!(tol, ARITHMETIC_TOLERANCE);
        assert!(numbers_match(float(1e30), v, tol));
    }

    #[test]
    fn mixed_inputs_use_relative_tolerance() {
        let (v, tol) = expected_value(expected_outcome(Operation::Add, float(0.1), float(0.2)));
        assert_eq!(tol, ARITHMETIC_TOLERANCE);
        assert!(numbers_match(float(0.3), v, tol));
    }

    #[test]
    fn value_comparison_rules() {
        let five = ExpectedOutcome::value(5i64, EXACT);
        assert!(five.accepts_value(&Value::Number(int(5))));
        assert!(five.accepts_value(&Value::Number(float(5.0))));
        assert!(!five.accepts_value(&Value::Number(int(6))));
        assert!(!five.accepts_value(&Value::Nil));
        assert!(!five.accepts_value(&Value::String("5".into())));

        let error = ExpectedOutcome::fails_with(ErrorKind::DivisionByZero);
        assert!(!error.accepts_value(&Value::Nil));
        assert!(!error.accepts_value(&Value::Number(float(f64::INFINITY))));
    }

    #[test]
    fn integer_expectations_honour_tolerance() {
        assert!(numbers_match(int(99), int(100), 0.1));
        assert!(numbers_match(int(110), int(100), 0.1));
        assert!(!numbers_match(int(80), int(100), 0.1));
        assert!(!numbers_match(int(99), int(100), EXACT));

        let loose = ExpectedOutcome::value(100i64, 0.1);
        assert!(loose.accepts_value(&Value::Number(int(99))));
        assert!(loose.accepts_value(&Value::Number(float(100.5))));
    }

    #[test]
    fn exact_integers_are_not_compared_as_floats() {
        let big = 1i64 << 53;
        assert!(!numbers_match(float(big as f64), int(big + 1), EXACT));
        assert!(numbers_match(float(big as f64), int(big), EXACT));
        assert!(numbers_match(int(i64::MAX), int(i64::MAX), EXACT));
        assert!(!numbers_match(float(5.5), int(5), EXACT));
        assert!(!numbers_match(float(1e30), int(i64::MAX), EXACT));
    }

    #[test]
    fn special_float_comparisons() {
        assert!(numbers_match(float(f64::NAN), float(f64::NAN), 0.0));
        assert!(!numbers_match(float(1.0), float(f64::NAN), 1.0));
        assert!(numbers_match(float(f64::INFINITY), float(f64::INFINITY), 0.0));
        assert!(!numbers_match(float(f64::INFINITY), float(f64::NEG_INFINITY), 1.0));
        assert!(!numbers_match(float(1e308), float(f64::INFINITY), 1.0));
    }

    #[test]
    fn error_compatibility_is_permissive_for_division() {
        let div = ExpectedOutcome::fails_with(ErrorKind::DivisionByZero);
        assert!(div.accepts_raised(&RaisedKind::ZeroDivision));
        assert!(div.accepts_raised(&RaisedKind::ValueError));
        assert!(div.accepts_raised(&RaisedKind::ArithmeticError));
        assert!(!div.accepts_raised(&RaisedKind::TypeError));
        assert!(!div.accepts_raised(&RaisedKind::Custom("oops".into())));

        let value = ExpectedOutcome::value(1i64, EXACT);
        assert!(!value.accepts_raised(&RaisedKind::ZeroDivision));
    }

    #[test]
    fn operation_names_parse() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
        }
        assert!("modulo".parse::<Operation>().is_err());
    }
}
