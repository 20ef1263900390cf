//! The expression AST.

use indexmap::IndexMap;
use soy_position_tracking::SourceLocation;
use std::fmt;
use std::fmt::Write as _;

/// A named identifier with its location, used for callees and proto-init
/// names (possibly dotted, e.g. `my.Pb`).
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    /// The identifier text.
    pub name: String,
    /// Where it was written.
    pub location: SourceLocation,
}

impl Identifier {
    /// Creates an identifier.
    pub fn new(name: impl Into<String>, location: SourceLocation) -> Self {
        Self { name: name.into(), location }
    }
}

/// Operators, with the precedence table baked in.
///
/// Field and item access are not operators here; they have their own
/// [`ExprKind`] variants and bind tighter than everything in this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Unary `-`.
    Negative,
    /// Unary `not`.
    Not,
    /// `*`
    Times,
    /// `/`
    DividedBy,
    /// `%`
    Mod,
    /// Binary `+`.
    Plus,
    /// Binary `-`.
    Minus,
    /// `<`
    Less,
    /// `>`
    Greater,
    /// `<=`
    LessOrEqual,
    /// `>=`
    GreaterOrEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `and`
    And,
    /// `or`
    Or,
    /// `?:`
    NullCoalescing,
    /// `? :`
    Conditional,
}

impl OpKind {
    /// Precedence level, 1 (loosest) to 8 (tightest); access chains are
    /// effectively level 9.
    pub fn precedence(&self) -> u8 {
        match self {
            OpKind::Conditional | OpKind::NullCoalescing => 1,
            OpKind::Or => 2,
            OpKind::And => 3,
            OpKind::Equal | OpKind::NotEqual => 4,
            OpKind::Less | OpKind::Greater | OpKind::LessOrEqual | OpKind::GreaterOrEqual => 5,
            OpKind::Plus | OpKind::Minus => 6,
            OpKind::Times | OpKind::DividedBy | OpKind::Mod => 7,
            OpKind::Negative | OpKind::Not => 8,
        }
    }

    /// Number of operands.
    pub fn arity(&self) -> usize {
        match self {
            OpKind::Negative | OpKind::Not => 1,
            OpKind::Conditional => 3,
            _ => 2,
        }
    }

    /// True for the right-associative levels (1 and 8).
    pub fn is_right_associative(&self) -> bool {
        matches!(
            self,
            OpKind::Conditional | OpKind::NullCoalescing | OpKind::Negative | OpKind::Not
        )
    }

    /// Source token for binary operators; unary and ternary spellings are
    /// handled by the printer.
    fn token(&self) -> &'static str {
        match self {
            OpKind::Negative => "-",
            OpKind::Not => "not",
            OpKind::Times => "*",
            OpKind::DividedBy => "/",
            OpKind::Mod => "%",
            OpKind::Plus => "+",
            OpKind::Minus => "-",
            OpKind::Less => "<",
            OpKind::Greater => ">",
            OpKind::LessOrEqual => "<=",
            OpKind::GreaterOrEqual => ">=",
            OpKind::Equal => "==",
            OpKind::NotEqual => "!=",
            OpKind::And => "and",
            OpKind::Or => "or",
            OpKind::NullCoalescing => "?:",
            OpKind::Conditional => "?",
        }
    }
}

/// An expression tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct ExprNode {
    /// What the node is.
    pub kind: ExprKind,
    /// Where it was written.
    pub location: SourceLocation,
}

/// The expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Sentinel kept in the tree after a reported error.
    Error,
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Decimal or hex integer; always within ±(2⁵³−1).
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Single-quoted string literal, unescaped.
    Str(String),
    /// `$name`, or `$ij.name` when `injected`.
    VarRef {
        /// Variable name without the `$` (or `$ij.`) prefix.
        name: String,
        /// True for `$ij.name` references.
        injected: bool,
    },
    /// Dotted identifier that is not a variable, e.g. `a.b.C`.
    Global {
        /// The full dotted name.
        name: String,
    },
    /// `base.field` / `base?.field`.
    FieldAccess {
        /// The expression being accessed; chains are left-deep.
        base: Box<ExprNode>,
        /// The field name.
        field: String,
        /// True for `?.`.
        nullsafe: bool,
    },
    /// `base[key]` / `base?[key]`.
    ItemAccess {
        /// The expression being indexed; chains are left-deep.
        base: Box<ExprNode>,
        /// The key expression.
        key: Box<ExprNode>,
        /// True for `?[`.
        nullsafe: bool,
    },
    /// A unary, binary or ternary operator application.
    Operator {
        /// Which operator.
        op: OpKind,
        /// Exactly `op.arity()` operands.
        operands: Vec<ExprNode>,
    },
    /// `name(arg, …)` over positional arguments.
    FunctionCall {
        /// The callee, possibly dotted.
        name: Identifier,
        /// Positional arguments.
        args: Vec<ExprNode>,
    },
    /// `name(field: expr, …)` — a proto construction by named field.
    ProtoInit {
        /// The message name, possibly dotted.
        name: Identifier,
        /// Fields in written order; duplicates are rejected by the parser.
        fields: IndexMap<String, ExprNode>,
    },
    /// `[a, b, c]`
    ListLiteral(Vec<ExprNode>),
    /// `['k': v, …]`; zero pairs print as `[:]`.
    MapLiteral(Vec<(ExprNode, ExprNode)>),
}

impl ExprNode {
    /// Creates a node.
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// The error sentinel.
    pub fn error(location: SourceLocation) -> Self {
        Self::new(ExprKind::Error, location)
    }

    /// True for the error sentinel.
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }

    /// Binding tightness for the printer: operator levels 1–8, access
    /// chains 9, everything atomic 10.
    fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Operator { op, .. } => op.precedence(),
            ExprKind::FieldAccess { .. } | ExprKind::ItemAccess { .. } => 9,
            _ => 10,
        }
    }

    /// Reprints the expression as parseable source.
    ///
    /// For any tree the parser produced without errors, reparsing the
    /// result yields a structurally equal tree. Parentheses are inserted
    /// only where precedence or associativity requires them.
    pub fn to_source_string(&self) -> String {
        let mut out = String::new();
        self.print(&mut out, 0);
        out
    }

    fn print(&self, out: &mut String, min_prec: u8) {
        let parens = self.precedence() < min_prec;
        if parens {
            out.push('(');
        }
        self.print_inner(out);
        if parens {
            out.push(')');
        }
    }

    fn print_inner(&self, out: &mut String) {
        match &self.kind {
            ExprKind::Error => out.push_str("<<error>>"),
            ExprKind::Null => out.push_str("null"),
            ExprKind::Bool(b) => {
                let _ = write!(out, "{b}");
            }
            ExprKind::Int(i) => {
                let _ = write!(out, "{i}");
            }
            ExprKind::Float(f) => print_float(out, *f),
            ExprKind::Str(s) => print_quoted(out, s),
            ExprKind::VarRef { name, injected } => {
                if *injected {
                    let _ = write!(out, "$ij.{name}");
                } else {
                    let _ = write!(out, "${name}");
                }
            }
            ExprKind::Global { name } => out.push_str(name),
            ExprKind::FieldAccess { base, field, nullsafe } => {
                // a bare global base would fuse with the field into one
                // longer dotted global on reparse; parens keep it an access
                if matches!(base.kind, ExprKind::Global { .. }) {
                    out.push('(');
                    base.print(out, 0);
                    out.push(')');
                } else {
                    base.print(out, 9);
                }
                out.push_str(if *nullsafe { "?." } else { "." });
                out.push_str(field);
            }
            ExprKind::ItemAccess { base, key, nullsafe } => {
                base.print(out, 9);
                out.push_str(if *nullsafe { "?[" } else { "[" });
                key.print(out, 0);
                out.push(']');
            }
            ExprKind::Operator { op, operands } => print_operator(out, *op, operands),
            ExprKind::FunctionCall { name, args } => {
                out.push_str(&name.name);
                out.push('(');
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.print(out, 0);
                }
                out.push(')');
            }
            ExprKind::ProtoInit { name, fields } => {
                out.push_str(&name.name);
                out.push('(');
                for (i, (field, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(field);
                    out.push_str(": ");
                    value.print(out, 0);
                }
                out.push(')');
            }
            ExprKind::ListLiteral(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.print(out, 0);
                }
                out.push(']');
            }
            ExprKind::MapLiteral(entries) => {
                if entries.is_empty() {
                    out.push_str("[:]");
                    return;
                }
                out.push('[');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    key.print(out, 0);
                    out.push_str(": ");
                    value.print(out, 0);
                }
                out.push(']');
            }
        }
    }
}

impl fmt::Display for ExprNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_source_string())
    }
}

fn print_operator(out: &mut String, op: OpKind, operands: &[ExprNode]) {
    let prec = op.precedence();
    match op {
        OpKind::Negative => {
            out.push('-');
            // keep `- -$x` from collapsing into a decrement-looking `--$x`
            let mut rendered = String::new();
            operands[0].print(&mut rendered, prec);
            if rendered.starts_with('-') {
                out.push(' ');
            }
            out.push_str(&rendered);
        }
        OpKind::Not => {
            out.push_str("not ");
            operands[0].print(out, prec);
        }
        OpKind::Conditional => {
            // right-associative: the condition needs the tighter bound
            operands[0].print(out, prec + 1);
            out.push_str(" ? ");
            operands[1].print(out, prec);
            out.push_str(" : ");
            operands[2].print(out, prec);
        }
        OpKind::NullCoalescing => {
            operands[0].print(out, prec + 1);
            out.push_str(" ?: ");
            operands[1].print(out, prec);
        }
        _ => {
            // left-associative binary operators
            operands[0].print(out, prec);
            let _ = write!(out, " {} ", op.token());
            operands[1].print(out, prec + 1);
        }
    }
}

fn print_float(out: &mut String, f: f64) {
    if f.is_finite() && f == f.trunc() {
        // keep a dot or an exponent in the literal so it reparses as a
        // float, not as an (out-of-range) integer
        if f.abs() < 1e17 {
            let _ = write!(out, "{f:.1}");
        } else {
            let _ = write!(out, "{f:e}");
        }
    } else {
        let _ = write!(out, "{f}");
    }
}

fn print_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(kind: ExprKind) -> ExprNode {
        ExprNode::new(kind, SourceLocation::unknown())
    }

    fn int(i: i64) -> ExprNode {
        node(ExprKind::Int(i))
    }

    fn binary(op: OpKind, l: ExprNode, r: ExprNode) -> ExprNode {
        node(ExprKind::Operator { op, operands: vec![l, r] })
    }

    #[test]
    fn precedence_drives_parens() {
        // (1 + 2) * 3 keeps its parens; 1 + 2 * 3 does not gain any
        let grouped = binary(OpKind::Times, binary(OpKind::Plus, int(1), int(2)), int(3));
        assert_eq!(grouped.to_source_string(), "(1 + 2) * 3");

        let natural = binary(OpKind::Plus, int(1), binary(OpKind::Times, int(2), int(3)));
        assert_eq!(natural.to_source_string(), "1 + 2 * 3");
    }

    #[test]
    fn left_associative_right_operand_is_parenthesized() {
        // 1 - (2 - 3) must not print as 1 - 2 - 3
        let tree = binary(OpKind::Minus, int(1), binary(OpKind::Minus, int(2), int(3)));
        assert_eq!(tree.to_source_string(), "1 - (2 - 3)");

        let flat = binary(OpKind::Minus, binary(OpKind::Minus, int(1), int(2)), int(3));
        assert_eq!(flat.to_source_string(), "1 - 2 - 3");
    }

    #[test]
    fn ternary_condition_is_parenthesized() {
        let inner = node(ExprKind::Operator {
            op: OpKind::Conditional,
            operands: vec![int(1), int(2), int(3)],
        });
        let outer = node(ExprKind::Operator {
            op: OpKind::Conditional,
            operands: vec![inner, int(4), int(5)],
        });
        assert_eq!(outer.to_source_string(), "(1 ? 2 : 3) ? 4 : 5");
    }

    #[test]
    fn whole_floats_keep_their_dot() {
        assert_eq!(node(ExprKind::Float(1.0)).to_source_string(), "1.0");
        assert_eq!(node(ExprKind::Float(3.14)).to_source_string(), "3.14");
    }

    #[test]
    fn strings_escape_specials() {
        assert_eq!(
            node(ExprKind::Str("a'b\\c\nd".into())).to_source_string(),
            "'a\\'b\\\\c\\nd'"
        );
    }

    #[test]
    fn empty_map_prints_distinctly_from_empty_list() {
        assert_eq!(node(ExprKind::MapLiteral(vec![])).to_source_string(), "[:]");
        assert_eq!(node(ExprKind::ListLiteral(vec![])).to_source_string(), "[]");
    }

    #[test]
    fn double_negation_keeps_a_space() {
        let tree = node(ExprKind::Operator {
            op: OpKind::Negative,
            operands: vec![node(ExprKind::Operator {
                op: OpKind::Negative,
                operands: vec![node(ExprKind::VarRef { name: "x".into(), injected: false })],
            })],
        });
        assert_eq!(tree.to_source_string(), "- -$x");
    }
}
