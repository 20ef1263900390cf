//! Expression parser for the Soy template language.
//!
//! Parses the expression text between command braces — `$var.field`,
//! `foo($x)`, arithmetic, globals, list and map literals, proto inits —
//! into the [`ExprNode`] AST, with a precise [`SourceLocation`] on every
//! node. Inputs arrive already bracket-trimmed from the outer file parser.
//!
//! # Error handling
//!
//! The entry points never panic and never return `Err`. A syntactic
//! failure is reported once through the [`ErrorReporter`] and the result
//! degrades to the error-sentinel node (or, for
//! [`parse_expression_list`], to an empty list). Recoverable diagnostics —
//! out-of-range integers, duplicate proto fields, a bare `$ij` — are
//! reported and parsing continues, so one bad literal does not hide later
//! problems in the same expression.
//!
//! # Grammar
//!
//! Operator precedence, loosest to tightest: `?:`/`? :` (right), `or`,
//! `and`, `==`/`!=`, `<`/`>`/`<=`/`>=`, `+`/`-`, `*`/`/`/`%`, unary
//! `-`/`not` (right), then `.`/`?.`/`[ ]`/`?[ ]`. Parentheses override.
//! The parser is a classical precedence cascade: one function per level,
//! which keeps the asymmetric unary level and the right-associative
//! conditional straightforward.
//!
//! # Example
//!
//! ```
//! use soy_error::ErrorReporter;
//! use soy_expr_parser::parse_expression;
//! use soy_position_tracking::{Point, SourceLocation};
//!
//! let mut errs = ErrorReporter::new();
//! let base = SourceLocation::point("greeting.soy", Point::new(4, 10));
//! let expr = parse_expression("$name ?: 'world'", &base, &mut errs);
//! assert!(!errs.has_errors());
//! assert_eq!(expr.to_source_string(), "$name ?: 'world'");
//! ```

mod lexer;
mod parser;
mod token;

use parser::Parser;
use soy_ast::ExprNode;
use soy_error::ErrorReporter;
use soy_position_tracking::SourceLocation;

/// Parses one expression.
///
/// Returns the error-sentinel node if (and only if) the input failed
/// syntactically; the diagnostic carries the offending token's location.
pub fn parse_expression(
    src: &str,
    base_loc: &SourceLocation,
    errs: &mut ErrorReporter,
) -> ExprNode {
    let mut parser = Parser::new(src, base_loc.clone(), errs);
    let expr = parser.parse_expr();
    parser.finish(expr)
}

/// Parses a comma-separated list of expressions.
///
/// Returns an empty list if (and only if) the input failed syntactically;
/// a non-empty result means no syntactic error was reported.
pub fn parse_expression_list(
    src: &str,
    base_loc: &SourceLocation,
    errs: &mut ErrorReporter,
) -> Vec<ExprNode> {
    let mut parser = Parser::new(src, base_loc.clone(), errs);
    let mut list = vec![parser.parse_expr()];
    while parser.at_comma() {
        parser.bump_comma();
        list.push(parser.parse_expr());
    }
    parser.finish_list(list)
}

/// Parses exactly a `$name` variable reference.
///
/// The `$ij` form is rejected with `INVALID_VAR_NAME_IJ`; anything else
/// that is not a plain variable degrades to the error-sentinel node with
/// a diagnostic.
pub fn parse_variable(
    src: &str,
    base_loc: &SourceLocation,
    errs: &mut ErrorReporter,
) -> ExprNode {
    let mut parser = Parser::new(src, base_loc.clone(), errs);
    let var = parser.parse_variable_only();
    parser.finish(var)
}
