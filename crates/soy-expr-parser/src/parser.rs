//! The precedence-cascade parser.
//!
//! One method per precedence level, loosest first. Each method parses its
//! tighter sub-level, then folds operators at its own level; the two
//! right-associative levels (conditional, unary) recurse into themselves
//! instead of looping.

use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use indexmap::IndexMap;
use soy_ast::{ExprKind, ExprNode, Identifier, OpKind};
use soy_diagnostics_codes::SoyErrorKind;
use soy_error::ErrorReporter;
use soy_position_tracking::SourceLocation;

/// Largest integer magnitude exactly representable in an IEEE-754 double.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Nesting bound; deeper input gets a dedicated diagnostic instead of a
/// blown stack.
const MAX_NESTING_DEPTH: usize = 1024;

pub(crate) struct Parser<'a, 'e> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    base: SourceLocation,
    errs: &'e mut ErrorReporter,
    failed: bool,
    depth: usize,
}

impl<'a, 'e> Parser<'a, 'e> {
    pub(crate) fn new(src: &'a str, base: SourceLocation, errs: &'e mut ErrorReporter) -> Self {
        let (tokens, lex_failed) = Lexer::new(src, &base, errs).lex_all();
        Parser { src, tokens, pos: 0, base, errs, failed: lex_failed, depth: 0 }
    }

    // ----- token plumbing -----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek2(&self) -> &Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn token_loc(&self, token: &Token) -> SourceLocation {
        self.base.with_span(token.begin, token.last)
    }

    fn whole_loc(&self) -> SourceLocation {
        match self.tokens.len() {
            0 | 1 => self.base.at_point(self.base.begin),
            n => self.base.with_span(self.base.begin, self.tokens[n - 2].last),
        }
    }

    /// Reports a syntactic error (first one only) and yields the sentinel.
    fn error_at(&mut self, token: &Token, kind: SoyErrorKind) -> ExprNode {
        let loc = self.token_loc(token);
        if !self.failed {
            self.errs.report(loc.clone(), kind);
        }
        self.failed = true;
        ExprNode::error(loc)
    }

    fn unexpected(&mut self) -> ExprNode {
        let token = self.peek().clone();
        let described = token.describe(self.src);
        self.error_at(&token, SoyErrorKind::UnexpectedToken { token: described })
    }

    fn expect(&mut self, kind: &TokenKind) -> Option<Token> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind) {
            Some(self.advance())
        } else {
            self.unexpected();
            None
        }
    }

    fn legacy_operator(&mut self, token: &Token, replacement: &str) {
        let loc = self.token_loc(token);
        if !self.failed {
            self.errs.report(
                loc,
                SoyErrorKind::LegacyLogicalOperator {
                    found: token.text(self.src).to_string(),
                    replacement: replacement.to_string(),
                },
            );
        }
        self.failed = true;
    }

    fn binary(op: OpKind, left: ExprNode, right: ExprNode) -> ExprNode {
        let loc = left.location.extend(&right.location);
        ExprNode::new(ExprKind::Operator { op, operands: vec![left, right] }, loc)
    }

    // ----- the cascade, loosest level first -----

    /// Level 1: `?:` and `? :`, right-associative. Also the recursion
    /// entry for every nested expression, so the depth bound lives here.
    pub(crate) fn parse_expr(&mut self) -> ExprNode {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek().clone();
            return self.error_at(
                &token,
                SoyErrorKind::ExpressionNestingTooDeep { limit: MAX_NESTING_DEPTH },
            );
        }
        self.depth += 1;
        let expr = self.parse_ternary();
        self.depth -= 1;
        expr
    }

    fn parse_ternary(&mut self) -> ExprNode {
        let cond = self.parse_or();
        match &self.peek().kind {
            TokenKind::QuestionColon => {
                self.advance();
                let rhs = self.parse_expr();
                let loc = cond.location.extend(&rhs.location);
                ExprNode::new(
                    ExprKind::Operator {
                        op: OpKind::NullCoalescing,
                        operands: vec![cond, rhs],
                    },
                    loc,
                )
            }
            TokenKind::Question => {
                self.advance();
                let then = self.parse_expr();
                if self.expect(&TokenKind::Colon).is_none() {
                    return ExprNode::error(cond.location.extend(&then.location));
                }
                let otherwise = self.parse_expr();
                let loc = cond.location.extend(&otherwise.location);
                ExprNode::new(
                    ExprKind::Operator {
                        op: OpKind::Conditional,
                        operands: vec![cond, then, otherwise],
                    },
                    loc,
                )
            }
            _ => cond,
        }
    }

    /// Level 2: `or`.
    fn parse_or(&mut self) -> ExprNode {
        let mut expr = self.parse_and();
        loop {
            match &self.peek().kind {
                TokenKind::Or => {
                    self.advance();
                }
                TokenKind::PipePipe => {
                    let token = self.advance();
                    self.legacy_operator(&token, "or");
                }
                _ => break,
            }
            let rhs = self.parse_and();
            expr = Self::binary(OpKind::Or, expr, rhs);
        }
        expr
    }

    /// Level 3: `and`.
    fn parse_and(&mut self) -> ExprNode {
        let mut expr = self.parse_equality();
        loop {
            match &self.peek().kind {
                TokenKind::And => {
                    self.advance();
                }
                TokenKind::AmpAmp => {
                    let token = self.advance();
                    self.legacy_operator(&token, "and");
                }
                _ => break,
            }
            let rhs = self.parse_equality();
            expr = Self::binary(OpKind::And, expr, rhs);
        }
        expr
    }

    /// Level 4: `==` `!=`.
    fn parse_equality(&mut self) -> ExprNode {
        let mut expr = self.parse_comparison();
        loop {
            let op = match &self.peek().kind {
                TokenKind::EqEq => OpKind::Equal,
                TokenKind::NotEq => OpKind::NotEqual,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_comparison();
            expr = Self::binary(op, expr, rhs);
        }
        expr
    }

    /// Level 5: `<` `>` `<=` `>=`.
    fn parse_comparison(&mut self) -> ExprNode {
        let mut expr = self.parse_additive();
        loop {
            let op = match &self.peek().kind {
                TokenKind::Lt => OpKind::Less,
                TokenKind::Gt => OpKind::Greater,
                TokenKind::LtEq => OpKind::LessOrEqual,
                TokenKind::GtEq => OpKind::GreaterOrEqual,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive();
            expr = Self::binary(op, expr, rhs);
        }
        expr
    }

    /// Level 6: binary `+` `-`.
    fn parse_additive(&mut self) -> ExprNode {
        let mut expr = self.parse_multiplicative();
        loop {
            let op = match &self.peek().kind {
                TokenKind::Plus => OpKind::Plus,
                TokenKind::Minus => OpKind::Minus,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative();
            expr = Self::binary(op, expr, rhs);
        }
        expr
    }

    /// Level 7: `*` `/` `%`.
    fn parse_multiplicative(&mut self) -> ExprNode {
        let mut expr = self.parse_unary();
        loop {
            let op = match &self.peek().kind {
                TokenKind::Star => OpKind::Times,
                TokenKind::Slash => OpKind::DividedBy,
                TokenKind::Percent => OpKind::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary();
            expr = Self::binary(op, expr, rhs);
        }
        expr
    }

    /// Level 8: unary `-` and `not`, right-associative.
    fn parse_unary(&mut self) -> ExprNode {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek().clone();
            return self.error_at(
                &token,
                SoyErrorKind::ExpressionNestingTooDeep { limit: MAX_NESTING_DEPTH },
            );
        }
        let op = match &self.peek().kind {
            TokenKind::Minus => Some(OpKind::Negative),
            TokenKind::Not => Some(OpKind::Not),
            TokenKind::Bang => {
                let token = self.advance();
                self.legacy_operator(&token, "not");
                self.depth += 1;
                let operand = self.parse_unary();
                self.depth -= 1;
                let loc = self.token_loc(&token).extend(&operand.location);
                return ExprNode::new(
                    ExprKind::Operator { op: OpKind::Not, operands: vec![operand] },
                    loc,
                );
            }
            _ => None,
        };
        match op {
            Some(op) => {
                let token = self.advance();
                self.depth += 1;
                let operand = self.parse_unary();
                self.depth -= 1;
                let loc = self.token_loc(&token).extend(&operand.location);
                ExprNode::new(ExprKind::Operator { op, operands: vec![operand] }, loc)
            }
            None => self.parse_postfix(),
        }
    }

    /// Level 9: `.` `?.` `[ ]` `?[ ]`, left-associative.
    fn parse_postfix(&mut self) -> ExprNode {
        let mut expr = self.parse_primary();
        loop {
            match &self.peek().kind {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let nullsafe = matches!(&self.peek().kind, TokenKind::QuestionDot);
                    self.advance();
                    let Some(field) = self.expect(&TokenKind::Ident) else {
                        return ExprNode::error(expr.location.clone());
                    };
                    let loc = expr.location.extend(&self.token_loc(&field));
                    expr = ExprNode::new(
                        ExprKind::FieldAccess {
                            base: Box::new(expr),
                            field: field.text(self.src).to_string(),
                            nullsafe,
                        },
                        loc,
                    );
                }
                TokenKind::LBracket | TokenKind::QuestionLBracket => {
                    let nullsafe = matches!(&self.peek().kind, TokenKind::QuestionLBracket);
                    self.advance();
                    let key = self.parse_expr();
                    let Some(close) = self.expect(&TokenKind::RBracket) else {
                        return ExprNode::error(expr.location.clone());
                    };
                    let loc = expr.location.extend(&self.token_loc(&close));
                    expr = ExprNode::new(
                        ExprKind::ItemAccess {
                            base: Box::new(expr),
                            key: Box::new(key),
                            nullsafe,
                        },
                        loc,
                    );
                }
                _ => break,
            }
        }
        expr
    }

    // ----- primaries -----

    fn parse_primary(&mut self) -> ExprNode {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr();
                let Some(close) = self.expect(&TokenKind::RParen) else {
                    return ExprNode::error(inner.location.clone());
                };
                let loc = self.token_loc(&token).extend(&self.token_loc(&close));
                ExprNode::new(inner.kind, loc)
            }
            TokenKind::DollarIdent => {
                self.advance();
                ExprNode::new(
                    ExprKind::VarRef {
                        name: token.text(self.src)[1..].to_string(),
                        injected: false,
                    },
                    self.token_loc(&token),
                )
            }
            TokenKind::DollarIj => {
                self.advance();
                if matches!(&self.peek().kind, TokenKind::Dot)
                    && matches!(&self.peek2().kind, TokenKind::Ident)
                {
                    self.advance();
                    let name = self.advance();
                    let loc = self.token_loc(&token).extend(&self.token_loc(&name));
                    ExprNode::new(
                        ExprKind::VarRef {
                            name: name.text(self.src).to_string(),
                            injected: true,
                        },
                        loc,
                    )
                } else {
                    // recoverable: report and keep parsing around the hole
                    let loc = self.token_loc(&token);
                    self.errs.report(loc.clone(), SoyErrorKind::UnexpectedIjDataReference);
                    ExprNode::error(loc)
                }
            }
            TokenKind::Ident => self.parse_ident_prefixed(),
            TokenKind::LBracket => self.parse_collection(),
            TokenKind::Null => {
                self.advance();
                ExprNode::new(ExprKind::Null, self.token_loc(&token))
            }
            TokenKind::True => {
                self.advance();
                ExprNode::new(ExprKind::Bool(true), self.token_loc(&token))
            }
            TokenKind::False => {
                self.advance();
                ExprNode::new(ExprKind::Bool(false), self.token_loc(&token))
            }
            TokenKind::DecInt => {
                self.advance();
                self.int_literal(&token, token.text(self.src), 10)
            }
            TokenKind::HexInt => {
                self.advance();
                let digits = token.text(self.src).trim_start_matches("0x");
                self.int_literal(&token, digits, 16)
            }
            TokenKind::Float => {
                self.advance();
                let value = match token.text(self.src).parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => unreachable!("lexer produced an unparseable float"),
                };
                ExprNode::new(ExprKind::Float(value), self.token_loc(&token))
            }
            TokenKind::Str(value) => {
                let value = value.clone();
                self.advance();
                ExprNode::new(ExprKind::Str(value), self.token_loc(&token))
            }
            TokenKind::DoubleQuote => {
                self.advance();
                self.error_at(&token, SoyErrorKind::DoubleQuotedString)
            }
            _ => {
                self.advance();
                let described = token.describe(self.src);
                self.error_at(&token, SoyErrorKind::UnexpectedToken { token: described })
            }
        }
    }

    /// A primary starting with a bare identifier: a dotted global, or a
    /// call-like form once a `(` follows the dotted name.
    fn parse_ident_prefixed(&mut self) -> ExprNode {
        let first = self.advance();
        let mut name = first.text(self.src).to_string();
        let mut last = first.clone();
        while matches!(&self.peek().kind, TokenKind::Dot)
            && matches!(&self.peek2().kind, TokenKind::Ident)
        {
            self.advance();
            let part = self.advance();
            name.push('.');
            name.push_str(part.text(self.src));
            last = part;
        }
        let name_loc = self.token_loc(&first).extend(&self.token_loc(&last));

        if matches!(&self.peek().kind, TokenKind::LParen) {
            self.advance();
            self.parse_call_like(Identifier::new(name, name_loc))
        } else {
            ExprNode::new(ExprKind::Global { name }, name_loc)
        }
    }

    /// After `name(`: a proto init when the first argument is `IDENT :`,
    /// a positional function call otherwise. `name()` stays a function
    /// call; later passes own the proto-vs-function decision.
    fn parse_call_like(&mut self, name: Identifier) -> ExprNode {
        if matches!(&self.peek().kind, TokenKind::RParen) {
            let close = self.advance();
            self.check_callee_name(&name);
            let loc = name.location.extend(&self.token_loc(&close));
            return ExprNode::new(ExprKind::FunctionCall { name, args: Vec::new() }, loc);
        }

        if matches!(&self.peek().kind, TokenKind::Ident)
            && matches!(&self.peek2().kind, TokenKind::Colon)
        {
            return self.parse_proto_init(name);
        }

        self.check_callee_name(&name);
        let mut args = vec![self.parse_expr()];
        while matches!(&self.peek().kind, TokenKind::Comma) {
            self.advance();
            args.push(self.parse_expr());
        }
        let Some(close) = self.expect(&TokenKind::RParen) else {
            return ExprNode::error(name.location.clone());
        };
        let loc = name.location.extend(&self.token_loc(&close));
        ExprNode::new(ExprKind::FunctionCall { name, args }, loc)
    }

    fn parse_proto_init(&mut self, name: Identifier) -> ExprNode {
        self.check_callee_name(&name);
        let mut fields: IndexMap<String, ExprNode> = IndexMap::new();
        loop {
            let Some(field_tok) = self.expect(&TokenKind::Ident) else {
                return ExprNode::error(name.location.clone());
            };
            if self.expect(&TokenKind::Colon).is_none() {
                return ExprNode::error(name.location.clone());
            }
            let value = self.parse_expr();
            let field = field_tok.text(self.src).to_string();
            if field.starts_with("__") {
                self.errs.report(
                    self.token_loc(&field_tok),
                    SoyErrorKind::InvalidParamName { name: field.clone() },
                );
            }
            if fields.contains_key(&field) {
                self.errs.report(
                    self.token_loc(&field_tok),
                    SoyErrorKind::DuplicateParamName { name: field },
                );
            } else {
                fields.insert(field, value);
            }
            match &self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => break,
                _ => return self.unexpected(),
            }
        }
        let close = self.advance();
        let loc = name.location.extend(&self.token_loc(&close));
        ExprNode::new(ExprKind::ProtoInit { name, fields }, loc)
    }

    fn check_callee_name(&mut self, name: &Identifier) {
        if name.name.split('.').any(|segment| segment.starts_with("__")) {
            self.errs.report(
                name.location.clone(),
                SoyErrorKind::InvalidFunctionName { name: name.name.clone() },
            );
        }
    }

    // ----- collection literals -----

    fn parse_collection(&mut self) -> ExprNode {
        let open = self.advance();
        match &self.peek().kind {
            TokenKind::Colon => {
                self.advance();
                let Some(close) = self.expect(&TokenKind::RBracket) else {
                    return ExprNode::error(self.token_loc(&open));
                };
                let loc = self.token_loc(&open).extend(&self.token_loc(&close));
                ExprNode::new(ExprKind::MapLiteral(Vec::new()), loc)
            }
            TokenKind::RBracket => {
                let close = self.advance();
                let loc = self.token_loc(&open).extend(&self.token_loc(&close));
                ExprNode::new(ExprKind::ListLiteral(Vec::new()), loc)
            }
            _ => {
                let first = self.parse_entry_expr();
                if matches!(&self.peek().kind, TokenKind::Colon) {
                    self.parse_map_tail(open, first)
                } else {
                    self.parse_list_tail(open, first)
                }
            }
        }
    }

    /// Parses a collection element, rejecting the bare-identifier map key
    /// (`[foo: 1]`) before it would otherwise parse as a global.
    fn parse_entry_expr(&mut self) -> ExprNode {
        if matches!(&self.peek().kind, TokenKind::Ident)
            && matches!(&self.peek2().kind, TokenKind::Colon)
        {
            let token = self.advance();
            let key = token.text(self.src).to_string();
            return self.error_at(&token, SoyErrorKind::SingleIdentifierKeyInMapLiteral { key });
        }
        self.parse_expr()
    }

    fn parse_map_tail(&mut self, open: Token, first_key: ExprNode) -> ExprNode {
        self.advance(); // the ':'
        let first_value = self.parse_expr();
        let mut entries = vec![(first_key, first_value)];
        loop {
            match &self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                    // trailing comma: `,` directly before `]` closes the map
                    if matches!(&self.peek().kind, TokenKind::RBracket) {
                        break;
                    }
                    let key = self.parse_entry_expr();
                    if self.expect(&TokenKind::Colon).is_none() {
                        return ExprNode::error(self.token_loc(&open));
                    }
                    let value = self.parse_expr();
                    entries.push((key, value));
                }
                TokenKind::RBracket => break,
                _ => return self.unexpected(),
            }
        }
        let close = self.advance();
        let loc = self.token_loc(&open).extend(&self.token_loc(&close));
        ExprNode::new(ExprKind::MapLiteral(entries), loc)
    }

    fn parse_list_tail(&mut self, open: Token, first: ExprNode) -> ExprNode {
        let mut items = vec![first];
        loop {
            match &self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                    // trailing comma: `,` directly before `]` closes the list
                    if matches!(&self.peek().kind, TokenKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr());
                }
                TokenKind::RBracket => break,
                _ => return self.unexpected(),
            }
        }
        let close = self.advance();
        let loc = self.token_loc(&open).extend(&self.token_loc(&close));
        ExprNode::new(ExprKind::ListLiteral(items), loc)
    }

    // ----- literals -----

    fn int_literal(&mut self, token: &Token, digits: &str, radix: u32) -> ExprNode {
        let loc = self.token_loc(token);
        let value = match u64::from_str_radix(digits, radix) {
            Ok(v) if v <= MAX_SAFE_INTEGER => v as i64,
            _ => {
                self.errs.report(
                    loc.clone(),
                    SoyErrorKind::IntegerOutOfRange {
                        literal: token.text(self.src).to_string(),
                    },
                );
                0
            }
        };
        ExprNode::new(ExprKind::Int(value), loc)
    }

    // ----- entry-point support -----

    /// Consumes trailing input and applies the syntactic-failure contract.
    pub(crate) fn finish(mut self, expr: ExprNode) -> ExprNode {
        if !matches!(&self.peek().kind, TokenKind::Eof) {
            self.unexpected();
        }
        if self.failed { ExprNode::error(self.whole_loc()) } else { expr }
    }

    pub(crate) fn finish_list(mut self, list: Vec<ExprNode>) -> Vec<ExprNode> {
        if !matches!(&self.peek().kind, TokenKind::Eof) {
            self.unexpected();
        }
        if self.failed { Vec::new() } else { list }
    }

    pub(crate) fn at_comma(&self) -> bool {
        matches!(&self.peek().kind, TokenKind::Comma)
    }

    pub(crate) fn bump_comma(&mut self) {
        self.advance();
    }

    /// Parses exactly a `$name` reference, for `parse_variable`.
    pub(crate) fn parse_variable_only(&mut self) -> ExprNode {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::DollarIdent => {
                self.advance();
                ExprNode::new(
                    ExprKind::VarRef {
                        name: token.text(self.src)[1..].to_string(),
                        injected: false,
                    },
                    self.token_loc(&token),
                )
            }
            TokenKind::DollarIj => {
                self.advance();
                // swallow a `.name` so the trailing-input check doesn't
                // pile a second diagnostic on top
                if matches!(&self.peek().kind, TokenKind::Dot)
                    && matches!(&self.peek2().kind, TokenKind::Ident)
                {
                    self.advance();
                    self.advance();
                }
                self.error_at(&token, SoyErrorKind::InvalidVarNameIj)
            }
            _ => {
                self.advance();
                let described = token.describe(self.src);
                self.error_at(&token, SoyErrorKind::ExpectedVariable { found: described })
            }
        }
    }
}
