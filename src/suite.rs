//! Test suites: the fixed, ordered list of cases a submission is graded on.
//!
//! The built-in suite covers the calculator contract end to end. A suite can
//! also be read from a YAML file:
//!
//! ```yaml
//! - name: divide_by_zero
//!   operation: divide
//!   inputs: [10, 0]
//!   expect: { error: division-by-zero }   # optional, the oracle fills it in
//! - name: add_floats
//!   operation: add
//!   inputs: [0.1, 0.2]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::errors::SuiteError;
use crate::numeric::Number;
use crate::oracle::{expected_outcome, ExpectedOutcome, Operation};

/// One immutable grading case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub operation: Operation,
    pub inputs: (Number, Number),
    pub expectation: ExpectedOutcome,
}

impl TestCase {
    /// A case whose expectation comes from the oracle.
    pub fn new(name: impl Into<String>, operation: Operation, a: Number, b: Number) -> Self {
        Self {
            name: name.into(),
            operation,
            inputs: (a, b),
            expectation: expected_outcome(operation, a, b),
        }
    }

    pub fn with_expectation(mut self, expectation: ExpectedOutcome) -> Self {
        self.expectation = expectation;
        self
    }
}

/// Case as written in a suite file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SuiteFileCase {
    name: String,
    operation: Operation,
    inputs: (Number, Number),
    #[serde(default)]
    expect: Option<ExpectedOutcome>,
}

/// An ordered, non-empty sequence of uniquely named cases.
#[derive(Debug, Clone, PartialEq)]
pub struct Suite {
    cases: Vec<TestCase>,
}

impl Suite {
    pub fn new(cases: Vec<TestCase>) -> Result<Self, SuiteError> {
        if cases.is_empty() {
            return Err(SuiteError::Empty);
        }
        let mut seen = HashSet::new();
        for case in &cases {
            if !seen.insert(case.name.as_str()) {
                return Err(SuiteError::DuplicateName {
                    name: case.name.clone(),
                });
            }
        }
        Ok(Self { cases })
    }

    /// Parses a YAML suite. `origin` is only used in error messages.
    pub fn from_yaml_str(text: &str, origin: &Path) -> Result<Self, SuiteError> {
        let entries: Vec<SuiteFileCase> =
            serde_yaml::from_str(text).map_err(|source| SuiteError::Format {
                path: origin.to_path_buf(),
                source,
            })?;
        let cases = entries
            .into_iter()
            .map(|entry| {
                let case = TestCase::new(
                    entry.name,
                    entry.operation,
                    entry.inputs.0,
                    entry.inputs.1,
                );
                match entry.expect {
                    Some(expectation) => case.with_expectation(expectation),
                    None => case,
                }
            })
            .collect();
        Self::new(cases)
    }

    pub fn load(path: &Path) -> Result<Self, SuiteError> {
        let text = fs::read_to_string(path).map_err(|source| SuiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text, path)
    }

    /// The built-in calculator contract.
    pub fn builtin() -> Self {
        use Operation::*;
        let int = Number::Int;
        let float = Number::Float;
        let cases = vec![
            TestCase::new("add_positive", Add, int(2), int(3)),
            TestCase::new("add_negative", Add, int(-4), int(1)),
            TestCase::new("add_floats", Add, float(0.1), float(0.2)),
            TestCase::new("subtract_positive", Subtract, int(10), int(4)),
            TestCase::new("subtract_negative_result", Subtract, int(3), int(5)),
            TestCase::new("multiply_positive", Multiply, int(4), int(3)),
            TestCase::new("multiply_negative", Multiply, int(-2), int(3)),
            TestCase::new("multiply_by_zero", Multiply, int(7), int(0)),
            TestCase::new("divide_exact", Divide, int(10), int(2)),
            TestCase::new("divide_fractional", Divide, int(7), int(2)),
            TestCase::new("divide_negative", Divide, int(-9), int(3)),
            TestCase::new("divide_by_zero", Divide, int(10), int(0)),
            TestCase::new("power_positive", Power, int(2), int(3)),
            TestCase::new("power_zero_exponent", Power, int(5), int(0)),
            TestCase::new("power_zero_base_zero_exponent", Power, int(0), int(0)),
            TestCase::new("power_negative_exponent", Power, int(2), int(-1)),
            TestCase::new("power_negative_exponent_fraction", Power, int(4), int(-2)),
            TestCase::new("power_fractional_exponent", Power, int(9), float(0.5)),
            TestCase::new("power_irrational_result", Power, int(2), float(0.5)),
        ];
        Self { cases }
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestCase> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

impl Default for Suite {
    fn default() -> Self {
        Self::builtin()
    }
}

impl<'a> IntoIterator for &'a Suite {
    type Item = &'a TestCase;
    type IntoIter = std::slice::Iter<'a, TestCase>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn builtin_suite_is_valid() {
        let builtin = Suite::builtin();
        let revalidated = Suite::new(builtin.cases().to_vec()).unwrap();
        assert_eq!(revalidated, builtin);
        for op in Operation::ALL {
            assert!(builtin.iter().any(|c| c.operation == op), "{} not covered", op);
        }
    }

    #[test]
    fn builtin_suite_covers_division_by_zero() {
        let case = Suite::builtin()
            .iter()
            .find(|c| c.name == "divide_by_zero")
            .cloned()
            .unwrap();
        assert_eq!(
            case.expectation,
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn yaml_suite_fills_missing_expectations() {
        let yaml = r#"
- name: half
  operation: divide
  inputs: [1, 2]
- name: custom
  operation: add
  inputs: [1, 1]
  expect: { value: 3 }
- name: boom
  operation: divide
  inputs: [1, 0]
  expect: { error: division-by-zero }
"#;
        let suite = Suite::from_yaml_str(yaml, Path::new("inline.yaml")).unwrap();
        assert_eq!(suite.len(), 3);
        assert_eq!(
            suite.cases()[0].expectation,
            expected_outcome(Operation::Divide, Number::Int(1), Number::Int(2))
        );
        assert_eq!(
            suite.cases()[1].expectation,
            ExpectedOutcome::value(Number::Int(3), 0.0)
        );
        assert_eq!(
            suite.cases()[2].expectation,
            ExpectedOutcome::fails_with(ErrorKind::DivisionByZero)
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_suites() {
        assert!(matches!(
            Suite::from_yaml_str("[]", Path::new("empty.yaml")),
            Err(SuiteError::Empty)
        ));
        let dup = r#"
- { name: a, operation: add, inputs: [1, 2] }
- { name: a, operation: add, inputs: [3, 4] }
"#;
        assert!(matches!(
            Suite::from_yaml_str(dup, Path::new("dup.yaml")),
            Err(SuiteError::DuplicateName { name }) if name == "a"
        ));
    }

    #[test]
    fn rejects_unknown_operations() {
        let bad = "- { name: a, operation: modulo, inputs: [1, 2] }";
        assert!(matches!(
            Suite::from_yaml_str(bad, Path::new("bad.yaml")),
            Err(SuiteError::Format { .. })
        ));
    }
}
