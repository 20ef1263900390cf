//! Stable diagnostic codes for the Soy compiler.
//!
//! This crate is the canonical list of diagnostics the front-end can emit.
//! Each variant carries the data its message interpolates; the code string
//! returned by [`SoyErrorKind::code`] is stable and may be referenced from
//! documentation, test expectations and suppression lists.
//!
//! # Example
//!
//! ```
//! use soy_diagnostics_codes::{Severity, SoyErrorKind};
//!
//! let kind = SoyErrorKind::IntegerOutOfRange { literal: "9007199254740993".into() };
//! assert_eq!(kind.code(), "INTEGER_OUT_OF_RANGE");
//! assert_eq!(kind.severity(), Severity::Error);
//! ```

use std::fmt;
use thiserror::Error;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Prevents the file from compiling.
    Error,
    /// Suspicious but accepted; compilation proceeds.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Every diagnostic the expression parser and HTML rewriter can report.
///
/// The `Display` impl renders the user-facing message; [`code`](Self::code)
/// returns the stable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoyErrorKind {
    // ----- Expression parser -----
    /// Integer literal outside the 53-bit mantissa range.
    #[error("integer literal '{literal}' is out of range; integers must fit in 53 bits")]
    IntegerOutOfRange {
        /// The literal as written.
        literal: String,
    },

    /// Function name using the reserved `__` prefix.
    #[error("'{name}' is not a valid function name; names starting with '__' are reserved")]
    InvalidFunctionName {
        /// The offending callee name.
        name: String,
    },

    /// Proto-init field name using the reserved `__` prefix.
    #[error("'{name}' is not a valid parameter name; names starting with '__' are reserved")]
    InvalidParamName {
        /// The offending field name.
        name: String,
    },

    /// `$ij` used where a plain variable is required.
    #[error("'ij' is not a valid variable name; injected data must be accessed as '$ij.name'")]
    InvalidVarNameIj,

    /// The same field named twice in a proto init.
    #[error("duplicate parameter '{name}'")]
    DuplicateParamName {
        /// The repeated field name.
        name: String,
    },

    /// Bare `$ij` without a following `.name`.
    #[error("'$ij' must be followed by an identifier naming the injected value")]
    UnexpectedIjDataReference,

    /// A bare identifier in map-key position.
    #[error(
        "map literal keys must be expressions; quote '{key}' to use it as a string, \
         or parenthesize it to reference a global"
    )]
    SingleIdentifierKeyInMapLiteral {
        /// The bare identifier.
        key: String,
    },

    /// Catch-all for a token that fits no production.
    #[error("unexpected '{token}'")]
    UnexpectedToken {
        /// Text of the offending token.
        token: String,
    },

    /// String literal with no closing quote.
    #[error("unclosed string literal")]
    UnclosedStringLiteral,

    /// Double-quoted string; the language only has single-quoted strings.
    #[error("found a double-quoted string; string literals use single quotes")]
    DoubleQuotedString,

    /// `&&`, `||` or `!` from other languages.
    #[error("unsupported operator '{found}'; use '{replacement}' instead")]
    LegacyLogicalOperator {
        /// The operator as written.
        found: String,
        /// The keyword operator to use.
        replacement: String,
    },

    /// Unknown backslash escape inside a string literal.
    #[error("invalid escape sequence '{sequence}' in string literal")]
    InvalidEscapeSequence {
        /// The escape as written, including the backslash.
        sequence: String,
    },

    /// Parenthesization nested beyond the supported depth.
    #[error("expression is nested too deeply (limit is {limit} levels)")]
    ExpressionNestingTooDeep {
        /// The enforced bound.
        limit: usize,
    },

    /// `parse_variable` input that is not `$name`.
    #[error("expected a variable reference such as '$name', found '{found}'")]
    ExpectedVariable {
        /// Text of the offending token.
        found: String,
    },

    // ----- HTML rewriter -----
    /// Branches of a control-flow block end in irreconcilable HTML contexts.
    #[error("{block} changes HTML context from '{start}' to '{end}'.{hint}")]
    BlockChangesContext {
        /// Description of the construct, e.g. "{if}".
        block: String,
        /// State at block entry.
        start: String,
        /// Irreconcilable ending state.
        end: String,
        /// Follow-up hint derived from the ending state (may be empty).
        hint: String,
    },

    /// A block ends with an attribute name and `=` but no value.
    #[error("block ends in an invalid state '{state}'")]
    BlockEndsInInvalidState {
        /// Name of the offending state.
        state: String,
    },

    /// An HTML transition that is not allowed from the block's context.
    #[error("transition to {transition} is not allowed here")]
    BlockTransitionDisallowed {
        /// Description of the attempted transition.
        transition: String,
    },

    /// `=` was seen but no attribute value followed.
    #[error("expected an attribute value")]
    ExpectedAttributeValue,

    /// Junk directly after an attribute name.
    #[error("expected whitespace, '=' or tag close after an attribute name, found '{found}'")]
    ExpectedWsEqOrCloseAfterAttributeName {
        /// The offending character.
        found: char,
    },

    /// Junk directly after a tag name or attribute.
    #[error("expected whitespace or tag close after a tag name or attribute, found '{found}'")]
    ExpectedWsOrCloseAfterTagOrAttribute {
        /// The offending character.
        found: char,
    },

    /// Closing quote for an attribute value opened in another block.
    #[error(
        "found the end of an attribute value that was started in another block; \
         attribute values must be opened and closed in the same block"
    )]
    FoundEndOfAttributeStartedInAnotherBlock,

    /// `>` for a tag opened in another block.
    #[error(
        "found the end of a tag that was started in another block; \
         HTML tags must be opened and closed in the same block"
    )]
    FoundEndTagStartedInAnotherBlock,

    /// `=` for an attribute whose name was parsed in another block.
    #[error(
        "found '=' for an attribute that was started in another block; \
         attributes must be defined in a single block"
    )]
    FoundEqWithAttributeInAnotherBlock,

    /// Fallback for a character that fits no rule.
    #[error("unexpected character '{found}'")]
    GenericUnexpectedChar {
        /// The offending character.
        found: char,
    },

    /// Character not allowed in an unquoted attribute value.
    #[error("illegal character '{found}' in an unquoted attribute value; quote the value")]
    IllegalHtmlAttributeCharacter {
        /// The offending character.
        found: char,
    },

    /// Character not allowed in an HTML identifier.
    #[error("illegal character '{found}' in an HTML identifier")]
    InvalidIdentifier {
        /// The offending character.
        found: char,
    },

    /// Control flow where only a print is allowed (dynamic tag name).
    #[error("'{command}' commands are not allowed in HTML tag names")]
    InvalidLocationForControlFlow {
        /// The command, e.g. "{if}".
        command: String,
    },

    /// Non-printable command inside a tag or attribute value.
    #[error("'{command}' commands are not allowed here")]
    InvalidLocationForNonprintable {
        /// The command, e.g. "{let}".
        command: String,
    },

    /// `<` followed by something that cannot start a tag name.
    #[error("expected an HTML tag name")]
    InvalidTagName,

    /// `</...//>`.
    #[error("close tags may not be self-closing")]
    SelfClosingCloseTag,

    /// Attributes or other content inside a close tag.
    #[error("unexpected content in a close tag; close tags carry only a tag name")]
    UnexpectedCloseTagContent,

    /// Whitespace immediately after `<`.
    #[error("unexpected whitespace after '<'; tag names must follow '<' directly")]
    UnexpectedWsAfterLt,

    /// A conditional in value position that may produce no value at all.
    #[error(
        "'{command}' does not guarantee that exactly one branch runs, so the attribute \
         is not guaranteed to get a value; add the exhaustive branch"
    )]
    ConditionalBlockIsntGuaranteedToProduceOneAttributeValue {
        /// The command, e.g. "{if}".
        command: String,
    },
}

impl SoyErrorKind {
    /// The stable code string for this diagnostic.
    pub fn code(&self) -> &'static str {
        match self {
            SoyErrorKind::IntegerOutOfRange { .. } => "INTEGER_OUT_OF_RANGE",
            SoyErrorKind::InvalidFunctionName { .. } => "INVALID_FUNCTION_NAME",
            SoyErrorKind::InvalidParamName { .. } => "INVALID_PARAM_NAME",
            SoyErrorKind::InvalidVarNameIj => "INVALID_VAR_NAME_IJ",
            SoyErrorKind::DuplicateParamName { .. } => "DUPLICATE_PARAM_NAME",
            SoyErrorKind::UnexpectedIjDataReference => "UNEXPECTED_IJ_DATA_REFERENCE",
            SoyErrorKind::SingleIdentifierKeyInMapLiteral { .. } => {
                "SINGLE_IDENTIFIER_KEY_IN_MAP_LITERAL"
            }
            SoyErrorKind::UnexpectedToken { .. } => "UNEXPECTED_TOKEN",
            SoyErrorKind::UnclosedStringLiteral => "UNCLOSED_STRING_LITERAL",
            SoyErrorKind::DoubleQuotedString => "DOUBLE_QUOTED_STRING",
            SoyErrorKind::LegacyLogicalOperator { .. } => "LEGACY_LOGICAL_OPERATOR",
            SoyErrorKind::InvalidEscapeSequence { .. } => "INVALID_ESCAPE_SEQUENCE",
            SoyErrorKind::ExpressionNestingTooDeep { .. } => "EXPRESSION_NESTING_TOO_DEEP",
            SoyErrorKind::ExpectedVariable { .. } => "EXPECTED_VARIABLE",
            SoyErrorKind::BlockChangesContext { .. } => "BLOCK_CHANGES_CONTEXT",
            SoyErrorKind::BlockEndsInInvalidState { .. } => "BLOCK_ENDS_IN_INVALID_STATE",
            SoyErrorKind::BlockTransitionDisallowed { .. } => "BLOCK_TRANSITION_DISALLOWED",
            SoyErrorKind::ExpectedAttributeValue => "EXPECTED_ATTRIBUTE_VALUE",
            SoyErrorKind::ExpectedWsEqOrCloseAfterAttributeName { .. } => {
                "EXPECTED_WS_EQ_OR_CLOSE_AFTER_ATTRIBUTE_NAME"
            }
            SoyErrorKind::ExpectedWsOrCloseAfterTagOrAttribute { .. } => {
                "EXPECTED_WS_OR_CLOSE_AFTER_TAG_OR_ATTRIBUTE"
            }
            SoyErrorKind::FoundEndOfAttributeStartedInAnotherBlock => {
                "FOUND_END_OF_ATTRIBUTE_STARTED_IN_ANOTHER_BLOCK"
            }
            SoyErrorKind::FoundEndTagStartedInAnotherBlock => {
                "FOUND_END_TAG_STARTED_IN_ANOTHER_BLOCK"
            }
            SoyErrorKind::FoundEqWithAttributeInAnotherBlock => {
                "FOUND_EQ_WITH_ATTRIBUTE_IN_ANOTHER_BLOCK"
            }
            SoyErrorKind::GenericUnexpectedChar { .. } => "GENERIC_UNEXPECTED_CHAR",
            SoyErrorKind::IllegalHtmlAttributeCharacter { .. } => {
                "ILLEGAL_HTML_ATTRIBUTE_CHARACTER"
            }
            SoyErrorKind::InvalidIdentifier { .. } => "INVALID_IDENTIFIER",
            SoyErrorKind::InvalidLocationForControlFlow { .. } => {
                "INVALID_LOCATION_FOR_CONTROL_FLOW"
            }
            SoyErrorKind::InvalidLocationForNonprintable { .. } => {
                "INVALID_LOCATION_FOR_NONPRINTABLE"
            }
            SoyErrorKind::InvalidTagName => "INVALID_TAG_NAME",
            SoyErrorKind::SelfClosingCloseTag => "SELF_CLOSING_CLOSE_TAG",
            SoyErrorKind::UnexpectedCloseTagContent => "UNEXPECTED_CLOSE_TAG_CONTENT",
            SoyErrorKind::UnexpectedWsAfterLt => "UNEXPECTED_WS_AFTER_LT",
            SoyErrorKind::ConditionalBlockIsntGuaranteedToProduceOneAttributeValue { .. } => {
                "CONDITIONAL_BLOCK_ISNT_GUARANTEED_TO_PRODUCE_ONE_ATTRIBUTE_VALUE"
            }
        }
    }

    /// The default severity of this diagnostic.
    pub fn severity(&self) -> Severity {
        match self {
            SoyErrorKind::ConditionalBlockIsntGuaranteedToProduceOneAttributeValue { .. } => {
                Severity::Warning
            }
            _ => Severity::Error,
        }
    }
}
