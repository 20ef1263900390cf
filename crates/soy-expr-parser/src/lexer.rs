//! Longest-match tokenizer for expression source.

use crate::token::{Token, TokenKind};
use soy_diagnostics_codes::SoyErrorKind;
use soy_error::ErrorReporter;
use soy_position_tracking::{Point, SourceLocation};
use std::sync::Arc;

pub(crate) struct Lexer<'a, 'e> {
    src: &'a str,
    file: Arc<str>,
    pos: usize,
    point: Point,
    last_point: Point,
    errs: &'e mut ErrorReporter,
    had_error: bool,
}

impl<'a, 'e> Lexer<'a, 'e> {
    pub(crate) fn new(src: &'a str, base: &SourceLocation, errs: &'e mut ErrorReporter) -> Self {
        Self {
            src,
            file: Arc::clone(&base.file_path),
            pos: 0,
            point: base.begin,
            last_point: base.begin,
            errs,
            had_error: false,
        }
    }

    /// Tokenizes the whole input, ending with an `Eof` token.
    ///
    /// The boolean is true if the lexer itself reported an error
    /// (unclosed string, bad escape).
    pub(crate) fn lex_all(mut self) -> (Vec<Token>, bool) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return (tokens, self.had_error);
            }
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.last_point = self.point;
        self.point = self.point.advanced_by(ch);
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn bump_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    fn report(&mut self, begin: Point, last: Point, kind: SoyErrorKind) {
        self.errs.report(SourceLocation::new(Arc::clone(&self.file), begin, last), kind);
        self.had_error = true;
    }

    fn token(&self, kind: TokenKind, start: usize, begin: Point) -> Token {
        Token { kind, start, end: self.pos, begin, last: self.last_point }
    }

    fn next_token(&mut self) -> Token {
        self.bump_while(|c| matches!(c, ' ' | '\t' | '\n' | '\r'));
        let start = self.pos;
        let begin = self.point;

        let Some(c) = self.bump() else {
            return Token { kind: TokenKind::Eof, start, end: start, begin, last: begin };
        };

        let kind = match c {
            '?' => match self.peek() {
                Some(':') => {
                    self.bump();
                    TokenKind::QuestionColon
                }
                Some('.') => {
                    self.bump();
                    TokenKind::QuestionDot
                }
                Some('[') => {
                    self.bump();
                    TokenKind::QuestionLBracket
                }
                _ => TokenKind::Question,
            },
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '.' => TokenKind::Dot,
            '=' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::EqEq
            }
            '=' => TokenKind::Unexpected('='),
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::NotEq
            }
            '!' => TokenKind::Bang,
            '<' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::LtEq
            }
            '<' => TokenKind::Lt,
            '>' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::GtEq
            }
            '>' => TokenKind::Gt,
            '&' if self.peek() == Some('&') => {
                self.bump();
                TokenKind::AmpAmp
            }
            '&' => TokenKind::Unexpected('&'),
            '|' if self.peek() == Some('|') => {
                self.bump();
                TokenKind::PipePipe
            }
            '|' => TokenKind::Unexpected('|'),
            '"' => TokenKind::DoubleQuote,
            '\'' => self.lex_string(begin),
            '$' => {
                if self.peek().is_some_and(is_ident_start) {
                    let name_start = self.pos;
                    self.bump_while(is_ident_continue);
                    if &self.src[name_start..self.pos] == "ij" {
                        TokenKind::DollarIj
                    } else {
                        TokenKind::DollarIdent
                    }
                } else {
                    TokenKind::Unexpected('$')
                }
            }
            c if c.is_ascii_digit() => self.lex_number(c),
            c if is_ident_start(c) => {
                self.bump_while(is_ident_continue);
                match &self.src[start..self.pos] {
                    "null" => TokenKind::Null,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "and" => TokenKind::And,
                    "or" => TokenKind::Or,
                    "not" => TokenKind::Not,
                    _ => TokenKind::Ident,
                }
            }
            other => TokenKind::Unexpected(other),
        };
        self.token(kind, start, begin)
    }

    fn lex_number(&mut self, first: char) -> TokenKind {
        // `0x` wins only when a hex digit follows; otherwise the `x` is a
        // separate identifier (longest match on the numeric rule alone)
        if first == '0'
            && self.peek() == Some('x')
            && self.peek_at(1).is_some_and(|c| c.is_ascii_hexdigit())
        {
            self.bump();
            self.bump_while(|c| c.is_ascii_hexdigit());
            return TokenKind::HexInt;
        }

        self.bump_while(|c| c.is_ascii_digit());
        let mut is_float = false;

        // a fraction needs digits on both sides of the dot
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            self.bump_while(|c| c.is_ascii_digit());
            is_float = true;
        }

        // a lowercase-e exponent, optionally signed
        if self.peek() == Some('e') {
            let signed = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digits_at = if signed { 2 } else { 1 };
            if self.peek_at(digits_at).is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
                if signed {
                    self.bump();
                }
                self.bump_while(|c| c.is_ascii_digit());
                is_float = true;
            }
        }

        if is_float { TokenKind::Float } else { TokenKind::DecInt }
    }

    fn lex_string(&mut self, begin: Point) -> TokenKind {
        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                self.report(begin, self.last_point, SoyErrorKind::UnclosedStringLiteral);
                return TokenKind::Str(value);
            };
            match c {
                '\'' => return TokenKind::Str(value),
                '\\' => {
                    let esc_begin = self.last_point;
                    match self.bump() {
                        Some('\\') => value.push('\\'),
                        Some('\'') => value.push('\''),
                        Some('"') => value.push('"'),
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some('b') => value.push('\u{0008}'),
                        Some('f') => value.push('\u{000C}'),
                        Some('u') => match self.lex_unicode_escape() {
                            Some(decoded) => value.push(decoded),
                            None => {
                                self.report(
                                    esc_begin,
                                    self.last_point,
                                    SoyErrorKind::InvalidEscapeSequence {
                                        sequence: "\\u".to_string(),
                                    },
                                );
                            }
                        },
                        Some(other) => {
                            self.report(
                                esc_begin,
                                self.last_point,
                                SoyErrorKind::InvalidEscapeSequence {
                                    sequence: format!("\\{other}"),
                                },
                            );
                            value.push(other);
                        }
                        None => {
                            self.report(begin, self.last_point, SoyErrorKind::UnclosedStringLiteral);
                            return TokenKind::Str(value);
                        }
                    }
                }
                other => value.push(other),
            }
        }
    }

    fn lex_unicode_escape(&mut self) -> Option<char> {
        let mut code: u32 = 0;
        for _ in 0..4 {
            let digit = self.peek()?.to_digit(16)?;
            self.bump();
            code = code * 16 + digit;
        }
        char::from_u32(code)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lex(src: &str) -> Vec<TokenKind> {
        let mut errs = ErrorReporter::new();
        let base = SourceLocation::point("t.soy", Point::FIRST);
        let (tokens, _) = Lexer::new(src, &base, &mut errs).lex_all();
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn longest_match_on_question_forms() {
        assert_eq!(
            lex("? ?: ?. ?["),
            vec![
                TokenKind::Question,
                TokenKind::QuestionColon,
                TokenKind::QuestionDot,
                TokenKind::QuestionLBracket,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn dollar_ij_outranks_dollar_ident() {
        assert_eq!(lex("$ij"), vec![TokenKind::DollarIj, TokenKind::Eof]);
        assert_eq!(lex("$ijk"), vec![TokenKind::DollarIdent, TokenKind::Eof]);
        assert_eq!(lex("$i"), vec![TokenKind::DollarIdent, TokenKind::Eof]);
    }

    #[test]
    fn numbers_need_digits_around_the_dot() {
        assert_eq!(lex("3.14"), vec![TokenKind::Float, TokenKind::Eof]);
        assert_eq!(lex("3."), vec![TokenKind::DecInt, TokenKind::Dot, TokenKind::Eof]);
        assert_eq!(lex("1e3"), vec![TokenKind::Float, TokenKind::Eof]);
        assert_eq!(lex("1e-3"), vec![TokenKind::Float, TokenKind::Eof]);
        assert_eq!(lex("1e"), vec![TokenKind::DecInt, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn hex_needs_lowercase_x_and_a_digit() {
        assert_eq!(lex("0xff"), vec![TokenKind::HexInt, TokenKind::Eof]);
        assert_eq!(lex("0Xff"), vec![TokenKind::DecInt, TokenKind::Ident, TokenKind::Eof]);
        assert_eq!(lex("0x"), vec![TokenKind::DecInt, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn string_escapes_decode() {
        let kinds = lex(r"'a\'b\nA'");
        assert_eq!(kinds, vec![TokenKind::Str("a'b\nA".to_string()), TokenKind::Eof]);
    }

    #[test]
    fn unclosed_string_reports() {
        let mut errs = ErrorReporter::new();
        let base = SourceLocation::point("t.soy", Point::FIRST);
        let (_, had_error) = Lexer::new("'abc", &base, &mut errs).lex_all();
        assert!(had_error);
        assert_eq!(errs.reports()[0].code(), "UNCLOSED_STRING_LITERAL");
    }

    #[test]
    fn legacy_tokens_are_recognized() {
        assert_eq!(
            lex("&& || !"),
            vec![TokenKind::AmpAmp, TokenKind::PipePipe, TokenKind::Bang, TokenKind::Eof]
        );
    }

    #[test]
    fn points_track_lines() {
        let mut errs = ErrorReporter::new();
        let base = SourceLocation::point("t.soy", Point::new(7, 3));
        let (tokens, _) = Lexer::new("a +\nb", &base, &mut errs).lex_all();
        assert_eq!(tokens[0].begin, Point::new(7, 3));
        assert_eq!(tokens[1].begin, Point::new(7, 5));
        assert_eq!(tokens[2].begin, Point::new(8, 1));
    }
}
