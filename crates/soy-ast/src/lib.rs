//! Abstract syntax trees for the Soy compiler front-end.
//!
//! Two tree families live here:
//!
//! - **Expression AST** ([`ExprNode`]/[`ExprKind`]): the typed tree the
//!   expression parser produces for `$var.field`, `foo($x)`, arithmetic,
//!   globals and collection literals. Expressions own their children
//!   directly (`Box`/`Vec`), carry a [`SourceLocation`] per node, and can
//!   reprint themselves with [`ExprNode::to_source_string`].
//!
//! - **Template AST** ([`SoyTree`]/[`SoyNodeKind`]): the command/HTML node
//!   tree for a single file. Template nodes need parent back-pointers (the
//!   HTML rewriter reparents nodes into tags and attribute values), so they
//!   live in an arena keyed by [`NodeId`]s drawn from the per-file
//!   [`IdGenerator`], and refer to each other by id rather than by
//!   ownership. Rewrite passes mutate the arena through the primitives on
//!   [`SoyTree`] (`child_index`, `remove_child`, `add_children`, …), never
//!   by hand.
//!
//! Raw template text keeps a per-byte-boundary mapping back to source
//! points ([`RawTextData`]), so substrings cut out by the rewriter carry
//! exact locations even after whitespace joining.
//!
//! Nodes are never shared across files; cloning a [`SoyTree`] clones every
//! node, which is what the rewriter's dry-run mode does.

mod expr;
mod raw_text;
mod tree;

pub use expr::{ExprKind, ExprNode, Identifier, OpKind};
pub use raw_text::RawTextData;
pub use soy_position_tracking::{Point, SourceLocation};
pub use tree::{
    ContentKind, IdGenerator, NodeId, Quotes, SoyNodeData, SoyNodeKind, SoyTree, TagName,
};
