//! # Builtin Functions
//!
//! Pure functions available to every calc script. None of them touch any
//! state; each takes already-evaluated arguments and returns a value or a
//! [`Raised`] error that the candidate could just as well have raised itself.
//!
//! ## Provided
//!
//! - **Arithmetic**: `+`, `-`, `*`, `/`, `mod`
//! - **Math**: `pow`, `sqrt`, `exp`, `ln`, `abs`, `floor`
//! - **Conversion**: `float`, `int`
//! - **Comparison & logic**: `=`, `<`, `>`, `<=`, `>=`, `not`
//! - **Predicates**: `nil?`, `number?`

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::numeric::Number;
use crate::runtime::{Raised, Value};

pub type BuiltinFn = fn(args: &[Value]) -> Result<Value, Raised>;

static BUILTINS: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let mut table: HashMap<&'static str, BuiltinFn> = HashMap::new();
    table.insert("+", builtin_add);
    table.insert("-", builtin_sub);
    table.insert("*", builtin_mul);
    table.insert("/", builtin_div);
    table.insert("mod", builtin_mod);
    table.insert("pow", builtin_pow);
    table.insert("sqrt", builtin_sqrt);
    table.insert("exp", builtin_exp);
    table.insert("ln", builtin_ln);
    table.insert("abs", builtin_abs);
    table.insert("floor", builtin_floor);
    table.insert("float", builtin_float);
    table.insert("int", builtin_int);
    table.insert("=", builtin_eq);
    table.insert("<", builtin_lt);
    table.insert(">", builtin_gt);
    table.insert("<=", builtin_le);
    table.insert(">=", builtin_ge);
    table.insert("not", builtin_not);
    table.insert("nil?", builtin_is_nil);
    table.insert("number?", builtin_is_number);
    table
});

/// Looks up a builtin by name.
pub fn lookup(name: &str) -> Option<BuiltinFn> {
    BUILTINS.get(name).copied()
}

// ============================================================================
// HELPERS
// ============================================================================

fn extract_number(value: &Value, name: &str) -> Result<Number, Raised> {
    value.as_number().ok_or_else(|| {
        Raised::type_error(format!(
            "{} expects numbers, got {}",
            name,
            value.type_name()
        ))
    })
}

fn expect_arity(args: &[Value], expected: usize, name: &str) -> Result<(), Raised> {
    if args.len() != expected {
        return Err(Raised::arity(name, &expected.to_string(), args.len()));
    }
    Ok(())
}

fn unary_number(args: &[Value], name: &str) -> Result<Number, Raised> {
    expect_arity(args, 1, name)?;
    extract_number(&args[0], name)
}

fn binary_numbers(args: &[Value], name: &str) -> Result<(Number, Number), Raised> {
    expect_arity(args, 2, name)?;
    Ok((extract_number(&args[0], name)?, extract_number(&args[1], name)?))
}

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Adds numbers.
///
/// Usage: (+ <a> <b> ...)
///
/// Example:
///   (+ 1 2 3) ; => 6
fn builtin_add(args: &[Value]) -> Result<Value, Raised> {
    let mut sum = Number::Int(0);
    for arg in args {
        sum = sum.checked_add(extract_number(arg, "+")?);
    }
    Ok(Value::Number(sum))
}

/// Subtracts, or negates with a single argument.
///
/// Usage: (- <a> <b> ...)
///
/// Example:
///   (- 5 2) ; => 3
///   (- 5)   ; => -5
fn builtin_sub(args: &[Value]) -> Result<Value, Raised> {
    let Some((first, rest)) = args.split_first() else {
        return Err(Raised::arity("-", "at least 1", 0));
    };
    let first = extract_number(first, "-")?;
    if rest.is_empty() {
        return Ok(Value::Number(first.negate()));
    }
    let mut result = first;
    for arg in rest {
        result = result.checked_sub(extract_number(arg, "-")?);
    }
    Ok(Value::Number(result))
}

/// Multiplies numbers.
///
/// Usage: (* <a> <b> ...)
fn builtin_mul(args: &[Value]) -> Result<Value, Raised> {
    let mut product = Number::Int(1);
    for arg in args {
        product = product.checked_mul(extract_number(arg, "*")?);
    }
    Ok(Value::Number(product))
}

/// True division. Always produces a float.
///
/// Usage: (/ <a> <b> ...)
///
/// Example:
///   (/ 7 2) ; => 3.5
/// Note: raises `zero-division` on a zero divisor.
fn builtin_div(args: &[Value]) -> Result<Value, Raised> {
    let Some((first, rest)) = args.split_first() else {
        return Err(Raised::arity("/", "at least 1", 0));
    };
    let first = extract_number(first, "/")?;
    if rest.is_empty() {
        if first.is_zero() {
            return Err(Raised::zero_division("division by zero"));
        }
        return Ok(Value::Number(Number::Float(1.0 / first.as_f64())));
    }
    let mut result = first.as_f64();
    for arg in rest {
        let divisor = extract_number(arg, "/")?;
        if divisor.is_zero() {
            return Err(Raised::zero_division("division by zero"));
        }
        result /= divisor.as_f64();
    }
    Ok(Value::Number(Number::Float(result)))
}

/// Floored modulo; the result takes the sign of the divisor.
///
/// Usage: (mod <a> <b>)
///
/// Example:
///   (mod -7 3) ; => 2
fn builtin_mod(args: &[Value]) -> Result<Value, Raised> {
    let (a, b) = binary_numbers(args, "mod")?;
    if b.is_zero() {
        return Err(Raised::zero_division("modulo by zero"));
    }
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let Some(mut r) = a.checked_rem(b) else {
                // i64::MIN % -1
                return Ok(Value::Number(Number::Int(0)));
            };
            if r != 0 && ((r < 0) != (b < 0)) {
                r += b;
            }
            Ok(Value::Number(Number::Int(r)))
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            let mut r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r += b;
            }
            Ok(Value::Number(Number::Float(r)))
        }
    }
}

// ============================================================================
// MATH FUNCTIONS
// ============================================================================

/// Raises `base` to `exponent`.
///
/// Usage: (pow <base> <exponent>)
///
/// Example:
///   (pow 2 3)   ; => 8
///   (pow 2 -1)  ; => 0.5
/// Note: `zero-division` for zero to a negative power, `value-error` for a
/// negative base with a fractional exponent.
fn builtin_pow(args: &[Value]) -> Result<Value, Raised> {
    let (base, exponent) = binary_numbers(args, "pow")?;

    if let Some(n) = exponent.as_integral() {
        if n < 0 && base.is_zero() {
            return Err(Raised::zero_division(
                "zero cannot be raised to a negative power",
            ));
        }
        if let (Number::Int(b), true) = (base, n >= 0) {
            if let Some(exact) = u32::try_from(n).ok().and_then(|e| b.checked_pow(e)) {
                return Ok(Value::Number(Number::Int(exact)));
            }
        }
        return Ok(Value::Number(Number::Float(
            base.as_f64().powf(exponent.as_f64()),
        )));
    }

    if base.is_negative() {
        return Err(Raised::value_error(
            "negative number cannot be raised to a fractional power",
        ));
    }
    if base.is_zero() && exponent.is_negative() {
        return Err(Raised::zero_division(
            "zero cannot be raised to a negative power",
        ));
    }
    Ok(Value::Number(Number::Float(
        base.as_f64().powf(exponent.as_f64()),
    )))
}

/// Usage: (sqrt <x>)
fn builtin_sqrt(args: &[Value]) -> Result<Value, Raised> {
    let x = unary_number(args, "sqrt")?;
    if x.is_negative() {
        return Err(Raised::value_error("math domain error"));
    }
    Ok(Value::Number(Number::Float(x.as_f64().sqrt())))
}

/// Usage: (exp <x>)
fn builtin_exp(args: &[Value]) -> Result<Value, Raised> {
    let x = unary_number(args, "exp")?;
    Ok(Value::Number(Number::Float(x.as_f64().exp())))
}

/// Natural logarithm.
///
/// Usage: (ln <x>)
/// Note: raises `value-error` for non-positive input.
fn builtin_ln(args: &[Value]) -> Result<Value, Raised> {
    let x = unary_number(args, "ln")?;
    if x.is_negative() || x.is_zero() {
        return Err(Raised::value_error("math domain error"));
    }
    Ok(Value::Number(Number::Float(x.as_f64().ln())))
}

/// Usage: (abs <x>)
fn builtin_abs(args: &[Value]) -> Result<Value, Raised> {
    let x = unary_number(args, "abs")?;
    Ok(Value::Number(if x.is_negative() { x.negate() } else { x }))
}

/// Usage: (floor <x>)
fn builtin_floor(args: &[Value]) -> Result<Value, Raised> {
    match unary_number(args, "floor")? {
        Number::Int(i) => Ok(Value::Number(Number::Int(i))),
        Number::Float(f) => Ok(Value::Number(
            Number::Float(f.floor())
                .as_integral()
                .map(Number::Int)
                .unwrap_or(Number::Float(f.floor())),
        )),
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Usage: (float <x>)
fn builtin_float(args: &[Value]) -> Result<Value, Raised> {
    let x = unary_number(args, "float")?;
    Ok(Value::Number(Number::Float(x.as_f64())))
}

/// Truncates toward zero.
///
/// Usage: (int <x>)
fn builtin_int(args: &[Value]) -> Result<Value, Raised> {
    match unary_number(args, "int")? {
        Number::Int(i) => Ok(Value::Number(Number::Int(i))),
        Number::Float(f) => Number::Float(f.trunc())
            .as_integral()
            .map(|i| Value::Number(Number::Int(i)))
            .ok_or_else(|| Raised::value_error(format!("cannot convert {} to an integer", f))),
    }
}

// ============================================================================
// COMPARISON AND LOGIC
// ============================================================================

/// Structural equality; numbers compare across int and float.
///
/// Usage: (= <a> <b>)
fn builtin_eq(args: &[Value]) -> Result<Value, Raised> {
    expect_arity(args, 2, "=")?;
    Ok(Value::Bool(args[0] == args[1]))
}

fn compare(args: &[Value], name: &str, test: fn(Number, Number) -> bool) -> Result<Value, Raised> {
    let (a, b) = binary_numbers(args, name)?;
    Ok(Value::Bool(test(a, b)))
}

fn builtin_lt(args: &[Value]) -> Result<Value, Raised> {
    compare(args, "<", |a, b| a < b)
}

fn builtin_gt(args: &[Value]) -> Result<Value, Raised> {
    compare(args, ">", |a, b| a > b)
}

fn builtin_le(args: &[Value]) -> Result<Value, Raised> {
    compare(args, "<=", |a, b| a <= b)
}

fn builtin_ge(args: &[Value]) -> Result<Value, Raised> {
    compare(args, ">=", |a, b| a >= b)
}

fn builtin_not(args: &[Value]) -> Result<Value, Raised> {
    expect_arity(args, 1, "not")?;
    Ok(Value::Bool(!args[0].is_truthy()))
}

fn builtin_is_nil(args: &[Value]) -> Result<Value, Raised> {
    expect_arity(args, 1, "nil?")?;
    Ok(Value::Bool(matches!(args[0], Value::Nil)))
}

fn builtin_is_number(args: &[Value]) -> Result<Value, Raised> {
    expect_arity(args, 1, "number?")?;
    Ok(Value::Bool(matches!(args[0], Value::Number(_))))
}
