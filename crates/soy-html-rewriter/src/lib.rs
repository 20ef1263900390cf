//! Contextual HTML rewriting for Soy templates.
//!
//! Templates arrive from the file parser with their HTML as flat raw text
//! interleaved with command nodes. This pass scans that text with a
//! tag-lexing state machine and rebuilds it as structured nodes — open
//! tags with their attributes, close tags, attribute values with their
//! quoting — while checking the property that makes contextual escaping
//! tractable: every HTML construct begun inside a control-flow block is
//! finished inside the same block.
//!
//! # How blocks interact
//!
//! The FSM [`State`] flows across block boundaries; in-progress tags and
//! attributes do not. Each branch of an `{if}`, `{switch}`, `{foreach}`,
//! `{for}` or `{msg}` group is parsed in a fresh context seeded with the
//! construct's starting state, and the branches' ending states are
//! reconciled into a single outcome (equal states; any mix of in-tag
//! states; or an attribute value supplied by branches). Irreconcilable
//! branches report `BLOCK_CHANGES_CONTEXT`; constructs that only supply a
//! value on some paths get
//! `CONDITIONAL_BLOCK_ISNT_GUARANTEED_TO_PRODUCE_ONE_ATTRIBUTE_VALUE`.
//!
//! # Transactionality
//!
//! Rewrites are recorded in a deferred [`EditBuffer`] and applied per
//! template only when the template reported no errors, so the pass is
//! idempotent and never leaves a template half-rewritten. Without the
//! `"stricthtml"` experimental feature the pass runs against a throwaway
//! clone: diagnostics are produced, the tree is untouched.

mod context;
mod edits;
mod rewriter;
mod state;

pub use edits::EditBuffer;
pub use rewriter::HtmlRewriter;
pub use state::State;
