//! Syntax module for calc scripts
//!
//! Core Abstract Syntax Tree types for candidate submissions, with source
//! location tracking. The parser in [`parser`] produces these; the loader and
//! the interpreter consume them.

use crate::numeric::Number;

pub mod parser;

/// Represents a span in the source code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Wrapper for carrying source span information with any value
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

pub type AstNode = Spanned<Expr>;

/// The core AST node for calc script expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    List(Vec<AstNode>),
    Symbol(String),
    String(String),
    Number(Number),
    Bool(bool),
    Nil,
}

impl Expr {
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AstNode]> {
        match self {
            Expr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Compact, single-line rendering used in logs and error messages.
    pub fn pretty(&self) -> String {
        match self {
            Expr::List(items) => {
                let inner: Vec<String> = items.iter().map(|i| i.value.pretty()).collect();
                format!("({})", inner.join(" "))
            }
            Expr::Symbol(s) => s.clone(),
            Expr::String(s) => format!("{:?}", s),
            Expr::Number(n) => n.to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Nil => "nil".to_string(),
        }
    }
}
