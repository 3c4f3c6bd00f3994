//! The calc script evaluation engine.
//!
//! A small tree-walking interpreter over the AST produced by
//! [`crate::syntax::parser`]. It is the sandbox candidate code runs in:
//!
//! - there is no I/O and no global mutable state; `set!` only reaches local
//!   bindings of the current call;
//! - every evaluation step checks the [`CancelToken`] so an abandoned
//!   invocation unwinds promptly instead of spinning forever;
//! - user function calls are bounded by a maximum call depth, and expression
//!   nesting by [`MAX_EVAL_NESTING`]; both are reported to the candidate as a
//!   `recursion-error` long before the native stack runs out.
//!
//! Special forms are `if`, `cond`, `let`, `set!`, `while`, `begin`, `and`,
//! `or` and `raise`. Everything else in head position is a call: first to a
//! function defined by the submission, then to a builtin.

use std::collections::HashMap;

use crate::runtime::builtins;
use crate::runtime::{CancelToken, EvalError, Raised, RaisedKind, Value};
use crate::syntax::{AstNode, Expr, Span};

/// Native stack given to every thread that runs candidate code.
pub const INVOCATION_STACK_SIZE: usize = 128 * 1024 * 1024;

/// Stack reserved per level of expression nesting, sized for unoptimized
/// builds.
const STACK_PER_NESTING_LEVEL: usize = 8 * 1024;

/// Deepest expression nesting an interpreter evaluates, user calls included.
pub const MAX_EVAL_NESTING: usize = INVOCATION_STACK_SIZE / STACK_PER_NESTING_LEVEL;

// ============================================================================
// PROGRAM - everything a submission defined
// ============================================================================

/// A user-defined function.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<AstNode>,
    pub span: Span,
}

/// The definitions bound from one submission. Immutable once loaded.
#[derive(Debug, Default)]
pub struct Program {
    pub name: String,
    functions: HashMap<String, Function>,
    constants: HashMap<String, Value>,
}

impl Program {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a function, replacing any previous definition of the same name.
    /// Returns `true` when something was replaced.
    pub fn define_function(&mut self, function: Function) -> bool {
        let replaced_constant = self.constants.remove(&function.name).is_some();
        let replaced_function = self
            .functions
            .insert(function.name.clone(), function)
            .is_some();
        replaced_constant || replaced_function
    }

    /// Adds a constant, replacing any previous definition of the same name.
    pub fn define_constant(&mut self, name: &str, value: Value) -> bool {
        let replaced_function = self.functions.remove(name).is_some();
        let replaced_constant = self.constants.insert(name.to_string(), value).is_some();
        replaced_constant || replaced_function
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name)
    }

    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ============================================================================
// CALL FRAMES
// ============================================================================

/// Local bindings of one function call; `let` pushes a nested scope.
struct Frame {
    scopes: Vec<Vec<(String, Value)>>,
}

impl Frame {
    fn new(bindings: Vec<(String, Value)>) -> Self {
        Self {
            scopes: vec![bindings],
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn set(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.iter_mut().rev().find(|(n, _)| n == name) {
                slot.1 = value;
                return true;
            }
        }
        false
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

pub struct Interpreter<'a> {
    program: &'a Program,
    cancel: &'a CancelToken,
    max_depth: usize,
    depth: usize,
    nesting: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, cancel: &'a CancelToken, max_depth: usize) -> Self {
        Self {
            program,
            cancel,
            max_depth,
            depth: 0,
            nesting: 0,
        }
    }

    /// Calls a function defined by the program.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let program = self.program;
        let function = program.function(name).ok_or_else(|| undefined(name))?;
        self.call_function(function, args)
    }

    fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value, EvalError> {
        if args.len() != function.params.len() {
            return Err(Raised::arity(
                &function.name,
                &function.params.len().to_string(),
                args.len(),
            )
            .into());
        }
        if self.depth >= self.max_depth {
            return Err(Raised::new(
                RaisedKind::RecursionError,
                format!("maximum call depth of {} exceeded", self.max_depth),
            )
            .into());
        }

        let bindings = function.params.iter().cloned().zip(args).collect();
        let mut frame = Frame::new(bindings);

        self.depth += 1;
        let result = self.eval_body(&function.body, &mut frame);
        self.depth -= 1;
        result
    }

    fn eval_body(&mut self, body: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let mut last = Value::Nil;
        for node in body {
            last = self.eval(node, frame)?;
        }
        Ok(last)
    }

    fn eval(&mut self, node: &AstNode, frame: &mut Frame) -> Result<Value, EvalError> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::Interrupted);
        }

        match &node.value {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Nil => Ok(Value::Nil),
            Expr::Symbol(name) => self.lookup(name, frame),
            Expr::List(items) => {
                if self.nesting >= MAX_EVAL_NESTING {
                    return Err(Raised::new(
                        RaisedKind::RecursionError,
                        format!(
                            "expressions nested deeper than {} levels",
                            MAX_EVAL_NESTING
                        ),
                    )
                    .into());
                }
                self.nesting += 1;
                let result = self.eval_list(items, frame);
                self.nesting -= 1;
                result
            }
        }
    }

    fn lookup(&self, name: &str, frame: &Frame) -> Result<Value, EvalError> {
        if let Some(value) = frame.get(name).or_else(|| self.program.constant(name)) {
            return Ok(value.clone());
        }
        if self.program.function(name).is_some() || builtins::lookup(name).is_some() {
            return Err(Raised::type_error(format!(
                "'{}' is a function and cannot be used as a value",
                name
            ))
            .into());
        }
        Err(undefined(name))
    }

    fn eval_list(&mut self, items: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let Some((head, args)) = items.split_first() else {
            return Err(syntax("cannot evaluate an empty list"));
        };
        let Some(name) = head.value.as_symbol() else {
            return Err(Raised::type_error(format!(
                "{} is not callable",
                head.value.pretty()
            ))
            .into());
        };

        match name {
            "if" => self.eval_if(args, frame),
            "cond" => self.eval_cond(args, frame),
            "let" => self.eval_let(args, frame),
            "set!" => self.eval_set(args, frame),
            "while" => self.eval_while(args, frame),
            "begin" => self.eval_body(args, frame),
            "and" => self.eval_and(args, frame),
            "or" => self.eval_or(args, frame),
            "raise" => self.eval_raise(args, frame),
            "define" => Err(syntax("define is only allowed at the top level")),
            _ => self.eval_call(name, args, frame),
        }
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[AstNode],
        frame: &mut Frame,
    ) -> Result<Value, EvalError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, frame)?);
        }

        let program = self.program;
        if let Some(function) = program.function(name) {
            return self.call_function(function, values);
        }
        match builtins::lookup(name) {
            Some(builtin) => builtin(&values).map_err(EvalError::from),
            None => Err(undefined(name)),
        }
    }

    // ------------------------------------------------------------------------
    // Special forms
    // ------------------------------------------------------------------------

    /// (if <cond> <then> [<else>])
    fn eval_if(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let (condition, then_branch, else_branch) = match args {
            [c, t] => (c, t, None),
            [c, t, e] => (c, t, Some(e)),
            _ => return Err(syntax("if expects a condition, a then branch and an optional else branch")),
        };
        if self.eval(condition, frame)?.is_truthy() {
            self.eval(then_branch, frame)
        } else if let Some(else_branch) = else_branch {
            self.eval(else_branch, frame)
        } else {
            Ok(Value::Nil)
        }
    }

    /// (cond (<test> <body>...) ... (else <body>...))
    fn eval_cond(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        for clause in args {
            let Some((test, body)) = clause.value.as_list().and_then(|c| c.split_first()) else {
                return Err(syntax("cond clauses look like (<test> <body>...)"));
            };
            let matched = match test.value.as_symbol() {
                Some("else") => true,
                _ => self.eval(test, frame)?.is_truthy(),
            };
            if matched {
                return self.eval_body(body, frame);
            }
        }
        Ok(Value::Nil)
    }

    /// (let ((<name> <init>) ...) <body>...)
    ///
    /// Bindings are sequential: each init sees the bindings before it.
    fn eval_let(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let Some((bindings, body)) = args.split_first() else {
            return Err(syntax("let expects a binding list and a body"));
        };
        let Some(bindings) = bindings.value.as_list() else {
            return Err(syntax("let bindings must be a list"));
        };

        frame.scopes.push(Vec::with_capacity(bindings.len()));
        let result = self.eval_let_scope(bindings, body, frame);
        frame.scopes.pop();
        result
    }

    fn eval_let_scope(
        &mut self,
        bindings: &[AstNode],
        body: &[AstNode],
        frame: &mut Frame,
    ) -> Result<Value, EvalError> {
        for binding in bindings {
            let (name, init) = match binding.value.as_list() {
                Some([name, init]) => match name.value.as_symbol() {
                    Some(name) => (name, init),
                    None => return Err(syntax("let binding names must be symbols")),
                },
                _ => return Err(syntax("let bindings look like (<name> <init>)")),
            };
            let value = self.eval(init, frame)?;
            if let Some(scope) = frame.scopes.last_mut() {
                scope.push((name.to_string(), value));
            }
        }
        self.eval_body(body, frame)
    }

    /// (set! <name> <value>)
    fn eval_set(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let [target, expr] = args else {
            return Err(syntax("set! expects a name and a value"));
        };
        let Some(name) = target.value.as_symbol() else {
            return Err(syntax("set! target must be a symbol"));
        };
        let value = self.eval(expr, frame)?;
        if frame.set(name, value.clone()) {
            Ok(value)
        } else {
            Err(Raised::new(
                RaisedKind::NameError,
                format!("cannot assign to '{}': not a local variable", name),
            )
            .into())
        }
    }

    /// (while <cond> <body>...)
    fn eval_while(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let Some((condition, body)) = args.split_first() else {
            return Err(syntax("while expects a condition"));
        };
        while self.eval(condition, frame)?.is_truthy() {
            self.eval_body(body, frame)?;
        }
        Ok(Value::Nil)
    }

    fn eval_and(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let mut last = Value::Bool(true);
        for arg in args {
            last = self.eval(arg, frame)?;
            if !last.is_truthy() {
                break;
            }
        }
        Ok(last)
    }

    fn eval_or(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let mut last = Value::Bool(false);
        for arg in args {
            last = self.eval(arg, frame)?;
            if last.is_truthy() {
                break;
            }
        }
        Ok(last)
    }

    /// (raise <kind> [<message>])
    fn eval_raise(&mut self, args: &[AstNode], frame: &mut Frame) -> Result<Value, EvalError> {
        let (kind, message) = match args {
            [kind] => (kind, None),
            [kind, message] => (kind, Some(message)),
            _ => return Err(syntax("raise expects an error kind and an optional message")),
        };
        let Some(kind) = kind.value.as_symbol() else {
            return Err(syntax("raise kind must be a symbol such as value-error"));
        };
        let message = match message {
            Some(expr) => match self.eval(expr, frame)? {
                Value::String(s) => s,
                other => other.to_string(),
            },
            None => String::new(),
        };
        Err(Raised::new(RaisedKind::from_symbol(kind), message).into())
    }
}

fn undefined(name: &str) -> EvalError {
    Raised::new(RaisedKind::NameError, format!("name '{}' is not defined", name)).into()
}

fn syntax(message: &str) -> EvalError {
    Raised::new(RaisedKind::SyntaxError, message).into()
}
