//! # Submission Loader
//!
//! Turns a candidate's source blob into a [`SubmissionBinding`]: one slot per
//! calculator [`Operation`], either bound to a callable or `Unbound`.
//!
//! Loading is static. The source is parsed and its top-level `define` forms
//! are collected; nothing the candidate wrote is evaluated here. Any other
//! top-level form is skipped. Each load builds its own [`Program`], so no
//! definition from one submission is ever visible to another.

use miette::NamedSource;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{LoadError, SourceArc};
use crate::numeric::Number;
use crate::oracle::Operation;
use crate::runtime::{CancelToken, EvalError, Function, Interpreter, Program, Raised, Value};
use crate::syntax::{parser, AstNode, Expr};

/// Names that can never be (re)defined by a submission.
const SPECIAL_FORMS: &[&str] = &[
    "define", "if", "cond", "let", "set!", "while", "begin", "and", "or", "raise", "else",
];

// ============================================================================
// SUBMISSIONS
// ============================================================================

/// A candidate's source, as handed to the harness.
#[derive(Debug, Clone)]
pub struct SubmissionSource {
    pub name: String,
    pub text: String,
}

impl SubmissionSource {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Reads a submission file; its name is the file name.
    pub fn read(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, text })
    }

    /// Hex SHA-256 of the source text.
    pub fn digest(&self) -> String {
        format!("{:x}", Sha256::digest(self.text.as_bytes()))
    }
}

// ============================================================================
// CALLABLES AND BINDINGS
// ============================================================================

/// One bound operation implementation.
///
/// Implementations must honour `cancel` if they can run for long; the runner
/// trips it when a case exceeds its time budget and stops waiting.
pub trait Callable: Send + Sync {
    fn invoke(&self, a: Number, b: Number, cancel: &CancelToken) -> Result<Value, EvalError>;
}

/// A function defined in a calc script.
///
/// Deep submissions need a thread with
/// [`INVOCATION_STACK_SIZE`](crate::runtime::INVOCATION_STACK_SIZE) of stack.
pub struct ScriptFunction {
    program: Arc<Program>,
    name: String,
    max_depth: usize,
}

impl Callable for ScriptFunction {
    fn invoke(&self, a: Number, b: Number, cancel: &CancelToken) -> Result<Value, EvalError> {
        Interpreter::new(&self.program, cancel, self.max_depth)
            .call(&self.name, vec![Value::Number(a), Value::Number(b)])
    }
}

/// A native Rust implementation, for embedding and tests.
struct NativeFunction<F>(F);

impl<F> Callable for NativeFunction<F>
where
    F: Fn(Number, Number) -> Result<Value, Raised> + Send + Sync,
{
    fn invoke(&self, a: Number, b: Number, _cancel: &CancelToken) -> Result<Value, EvalError> {
        (self.0)(a, b).map_err(EvalError::from)
    }
}

#[derive(Clone)]
pub enum Slot {
    Bound(Arc<dyn Callable>),
    Unbound,
}

impl Slot {
    pub fn is_bound(&self) -> bool {
        matches!(self, Slot::Bound(_))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Bound(_) => f.write_str("Bound"),
            Slot::Unbound => f.write_str("Unbound"),
        }
    }
}

/// The capability set resolved from one submission. Owned by a single
/// grading run.
#[derive(Debug, Clone)]
pub struct SubmissionBinding {
    slots: BTreeMap<Operation, Slot>,
}

impl SubmissionBinding {
    pub fn builder() -> BindingBuilder {
        BindingBuilder::default()
    }

    pub fn slot(&self, operation: Operation) -> &Slot {
        self.slots.get(&operation).unwrap_or(&Slot::Unbound)
    }

    pub fn unbound(&self) -> Vec<Operation> {
        Operation::ALL
            .into_iter()
            .filter(|op| !self.slot(*op).is_bound())
            .collect()
    }
}

/// Binds native closures into a [`SubmissionBinding`].
#[derive(Default)]
pub struct BindingBuilder {
    slots: BTreeMap<Operation, Slot>,
}

impl BindingBuilder {
    pub fn bind<F>(mut self, operation: Operation, f: F) -> Self
    where
        F: Fn(Number, Number) -> Result<Value, Raised> + Send + Sync + 'static,
    {
        self.slots
            .insert(operation, Slot::Bound(Arc::new(NativeFunction(f))));
        self
    }

    pub fn bind_callable(mut self, operation: Operation, callable: Arc<dyn Callable>) -> Self {
        self.slots.insert(operation, Slot::Bound(callable));
        self
    }

    pub fn build(self) -> SubmissionBinding {
        let mut slots = self.slots;
        for op in Operation::ALL {
            slots.entry(op).or_insert(Slot::Unbound);
        }
        SubmissionBinding { slots }
    }
}

// ============================================================================
// LOADER
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Loader {
    max_call_depth: usize,
}

impl Loader {
    pub fn new(max_call_depth: usize) -> Self {
        Self { max_call_depth }
    }

    /// Statically binds the five operations from a calc script.
    pub fn load(&self, source: &SubmissionSource) -> Result<SubmissionBinding, LoadError> {
        let src: SourceArc = Arc::new(NamedSource::new(&source.name, source.text.clone()));
        let nodes = parser::parse(&src)?;

        let mut program = Program::new(&source.name);
        for node in &nodes {
            match node.value.as_list() {
                Some([head, rest @ ..]) if head.value.as_symbol() == Some("define") => {
                    define(&mut program, node, rest, &src)?;
                }
                _ => {
                    tracing::warn!(
                        submission = %source.name,
                        form = %node.value.pretty(),
                        "skipping top-level form that is not a definition"
                    );
                }
            }
        }

        let program = Arc::new(program);
        let mut builder = SubmissionBinding::builder();
        for op in Operation::ALL {
            if program.function(op.name()).is_some() {
                let function = ScriptFunction {
                    program: Arc::clone(&program),
                    name: op.name().to_string(),
                    max_depth: self.max_call_depth,
                };
                builder = builder.bind_callable(op, Arc::new(function));
            } else if program.constant(op.name()).is_some() {
                tracing::warn!(
                    submission = %source.name,
                    operation = %op,
                    "operation is defined as a constant, not a function"
                );
            }
        }
        let binding = builder.build();

        tracing::debug!(
            submission = %source.name,
            functions = ?program.function_names(),
            unbound = ?binding.unbound(),
            "submission loaded"
        );
        Ok(binding)
    }
}

fn define(
    program: &mut Program,
    node: &AstNode,
    rest: &[AstNode],
    src: &SourceArc,
) -> Result<(), LoadError> {
    let Some((target, body)) = rest.split_first() else {
        return Err(LoadError::malformed("define needs a name", src, node.span));
    };
    if body.is_empty() {
        return Err(LoadError::malformed("define needs a body or a value", src, node.span));
    }

    let replaced = match &target.value {
        Expr::List(signature) => {
            let function = function_signature(signature, body, node, src)?;
            program.define_function(function)
        }
        Expr::Symbol(name) => {
            check_definable(name, node, src)?;
            let [value] = body else {
                return Err(LoadError::malformed(
                    "a constant takes exactly one value",
                    src,
                    node.span,
                ));
            };
            program.define_constant(name, literal(value, src)?)
        }
        _ => {
            return Err(LoadError::malformed(
                "define target must be a name or a (name params...) list",
                src,
                target.span,
            ))
        }
    };

    if replaced {
        tracing::debug!(form = %node.value.pretty(), "definition replaces an earlier one");
    }
    Ok(())
}

fn function_signature(
    signature: &[AstNode],
    body: &[AstNode],
    node: &AstNode,
    src: &SourceArc,
) -> Result<Function, LoadError> {
    let Some((name, params)) = signature.split_first() else {
        return Err(LoadError::malformed("function needs a name", src, node.span));
    };
    let Some(name) = name.value.as_symbol() else {
        return Err(LoadError::malformed("function name must be a symbol", src, name.span));
    };
    check_definable(name, node, src)?;

    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(params.len());
    for param in params {
        let Some(param_name) = param.value.as_symbol() else {
            return Err(LoadError::malformed("parameters must be symbols", src, param.span));
        };
        if !seen.insert(param_name) {
            return Err(LoadError::malformed(
                format!("duplicate parameter '{}'", param_name),
                src,
                param.span,
            ));
        }
        names.push(param_name.to_string());
    }

    Ok(Function {
        name: name.to_string(),
        params: names,
        body: body.to_vec(),
        span: node.span,
    })
}

fn check_definable(name: &str, node: &AstNode, src: &SourceArc) -> Result<(), LoadError> {
    if SPECIAL_FORMS.contains(&name) {
        return Err(LoadError::malformed(
            format!("'{}' is a special form and cannot be redefined", name),
            src,
            node.span,
        ));
    }
    Ok(())
}

fn literal(node: &AstNode, src: &SourceArc) -> Result<Value, LoadError> {
    match &node.value {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Nil => Ok(Value::Nil),
        Expr::Symbol(_) | Expr::List(_) => Err(LoadError::malformed(
            "top-level constants must be literal values",
            src,
            node.span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: &str = r#"
; Basic calculator
(define (add a b) (+ a b))
(define (subtract a b) (- a b))
(define (multiply a b) (* a b))
(define (divide a b)
  (if (= b 0) (raise value-error "Cannot divide by zero") (/ a b)))
(define (power base exponent) (pow base exponent))
"#;

    fn load(text: &str) -> Result<SubmissionBinding, LoadError> {
        Loader::new(100).load(&SubmissionSource::new("test.calc", text))
    }

    fn invoke(binding: &SubmissionBinding, op: Operation, a: i64, b: i64) -> Result<Value, EvalError> {
        match binding.slot(op) {
            Slot::Bound(f) => f.invoke(Number::Int(a), Number::Int(b), &CancelToken::new()),
            Slot::Unbound => panic!("{} is unbound", op),
        }
    }

    #[test]
    fn binds_all_operations() {
        let binding = load(COMPLETE).unwrap();
        assert!(binding.unbound().is_empty());
        assert_eq!(
            invoke(&binding, Operation::Add, 2, 3).unwrap(),
            Value::Number(Number::Int(5))
        );
    }

    #[test]
    fn missing_operations_are_unbound() {
        let binding = load("(define (add a b) (+ a b))").unwrap();
        assert_eq!(
            binding.unbound(),
            vec![
                Operation::Subtract,
                Operation::Multiply,
                Operation::Divide,
                Operation::Power
            ]
        );
    }

    #[test]
    fn top_level_expressions_are_not_executed() {
        // If this were evaluated it would never terminate.
        let binding = load("(while true nil)\n(define (add a b) (+ a b))").unwrap();
        assert!(binding.slot(Operation::Add).is_bound());
    }

    #[test]
    fn helpers_and_constants_are_available() {
        let text = r#"
(define offset 0)
(define (helper x) (+ x offset))
(define (add a b) (helper (+ a b)))
"#;
        let binding = load(text).unwrap();
        assert_eq!(
            invoke(&binding, Operation::Add, 1, 1).unwrap(),
            Value::Number(Number::Int(2))
        );
    }

    #[test]
    fn later_definitions_win() {
        let text = "(define (add a b) 0)\n(define (add a b) (+ a b))";
        let binding = load(text).unwrap();
        assert_eq!(
            invoke(&binding, Operation::Add, 4, 4).unwrap(),
            Value::Number(Number::Int(8))
        );
    }

    #[test]
    fn constant_named_like_an_operation_is_unbound() {
        let binding = load("(define add 5)").unwrap();
        assert!(!binding.slot(Operation::Add).is_bound());
    }

    #[test]
    fn syntax_errors_fail_the_load() {
        assert!(matches!(
            load("(define (add a b) (+ a b)"),
            Err(LoadError::Syntax { .. })
        ));
    }

    #[test]
    fn malformed_definitions_fail_the_load() {
        for text in [
            "(define)",
            "(define (add a b))",
            "(define (add a a) a)",
            "(define (add 1 b) b)",
            "(define (if a b) a)",
            "(define x (+ 1 2))",
            "(define 5 5)",
            "(define (\"add\" a b) a)",
        ] {
            assert!(
                matches!(load(text), Err(LoadError::MalformedDefinition { .. })),
                "expected malformed definition for {}",
                text
            );
        }
    }

    #[test]
    fn loads_are_isolated() {
        let first = load("(define (add a b) 1)").unwrap();
        let second = load("(define (add a b) 2)").unwrap();
        assert_eq!(
            invoke(&first, Operation::Add, 0, 0).unwrap(),
            Value::Number(Number::Int(1))
        );
        assert_eq!(
            invoke(&second, Operation::Add, 0, 0).unwrap(),
            Value::Number(Number::Int(2))
        );
    }

    #[test]
    fn builder_binds_native_functions() {
        let binding = SubmissionBinding::builder()
            .bind(Operation::Add, |a, b| Ok(Value::Number(a.checked_add(b))))
            .build();
        assert!(binding.slot(Operation::Add).is_bound());
        assert_eq!(binding.unbound().len(), 4);
    }

    #[test]
    fn digest_is_stable() {
        let a = SubmissionSource::new("a", COMPLETE);
        let b = SubmissionSource::new("b", COMPLETE);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
