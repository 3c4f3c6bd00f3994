//! calc script parser
//!
//! Converts submission source text into AST nodes with source location
//! tracking. Purely syntactic: nothing here knows which forms are special or
//! which names a submission is expected to define.

use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::errors::{LoadError, SourceArc};
use crate::numeric::Number;
use crate::syntax::{AstNode, Expr, Span, Spanned};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct CalcParser;

/// Deepest list nesting accepted. The grammar recurses per level.
pub const MAX_NESTING: usize = 256;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse calc script source into top-level AST nodes.
pub fn parse(source: &SourceArc) -> Result<Vec<AstNode>, LoadError> {
    let text = source.inner().as_str();
    if text.trim().is_empty() {
        return Ok(vec![]);
    }
    check_nesting(text, source)?;

    let mut pairs =
        CalcParser::parse(Rule::program, text).map_err(|e| convert_parse_error(e, source))?;

    let Some(program) = pairs.next() else {
        return Ok(vec![]);
    };

    program
        .into_inner()
        .filter(|p| p.as_rule() != Rule::EOI)
        .map(|p| build_ast_node(p, source))
        .collect()
}

/// Rejects sources nested deeper than [`MAX_NESTING`] before pest sees them.
/// Parens inside strings and comments are ignored.
fn check_nesting(text: &str, source: &SourceArc) -> Result<(), LoadError> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaped = false;

    for (pos, ch) in text.char_indices() {
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            ';' => in_comment = true,
            '"' => in_string = true,
            '(' => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(LoadError::syntax(
                        format!("expressions nested deeper than {} levels", MAX_NESTING),
                        source,
                        Span {
                            start: pos,
                            end: pos + 1,
                        },
                    ));
                }
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_ast_node(pair: Pair<Rule>, source: &SourceArc) -> Result<AstNode, LoadError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::expr | Rule::atom => {
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| LoadError::syntax("empty expression", source, span))?;
            build_ast_node(inner, source)
        }

        Rule::list => {
            let children: Result<Vec<_>, _> = pair
                .into_inner()
                .map(|p| build_ast_node(p, source))
                .collect();
            Ok(make(Expr::List(children?), span))
        }

        Rule::number => {
            let number = parse_number(pair.as_str())
                .ok_or_else(|| LoadError::syntax("invalid number literal", source, span))?;
            Ok(make(Expr::Number(number), span))
        }

        Rule::boolean => Ok(make(Expr::Bool(pair.as_str() == "true"), span)),

        Rule::nil => Ok(make(Expr::Nil, span)),

        Rule::string => Ok(make(Expr::String(unescape_string(pair.as_str())), span)),

        Rule::symbol => Ok(make(Expr::Symbol(pair.as_str().to_string()), span)),

        rule => Err(LoadError::syntax(
            format!("unsupported rule: {:?}", rule),
            source,
            span,
        )),
    }
}

/// Integers stay exact unless they overflow `i64`; anything with a fraction
/// or exponent is a float.
fn parse_number(text: &str) -> Option<Number> {
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::Int(i));
        }
    }
    text.parse::<f64>().ok().map(Number::Float)
}

fn make(expr: Expr, span: Span) -> AstNode {
    Spanned { value: expr, span }
}

// ============================================================================
// UTILITIES
// ============================================================================

fn get_span(pair: &Pair<Rule>) -> Span {
    Span {
        start: pair.as_span().start(),
        end: pair.as_span().end(),
    }
}

fn unescape_string(text: &str) -> String {
    // Remove surrounding quotes
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn convert_parse_error(error: Error<Rule>, source: &SourceArc) -> LoadError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span {
            start: pos,
            end: pos,
        },
        pest::error::InputLocation::Span((start, end)) => Span { start, end },
    };

    let rendered = error.variant.message();
    let message = if rendered.contains("EOI") || rendered.contains("expr") {
        "unbalanced parentheses or unexpected token"
    } else {
        "unrecognised input"
    };

    LoadError::syntax(message, source, span)
}
