//! The template AST arena.
//!
//! Template nodes refer to their parents and are reparented by rewrite
//! passes, so they live in a [`SoyTree`] arena and address each other with
//! [`NodeId`]s. Ids come from the per-file [`IdGenerator`]; the generator
//! is shared with throwaway clones (dry runs), so the arena tolerates
//! gaps in its id space.

use crate::{ExprNode, RawTextData};
use soy_position_tracking::SourceLocation;
use std::fmt;
use std::sync::Arc;

/// Identity of a node within one file's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic node-id source, one per file.
#[derive(Debug, Default)]
pub struct IdGenerator {
    next: u32,
}

impl IdGenerator {
    /// A generator starting at id 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands out the next id.
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// The declared kind of a template or content block, from `kind="…"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// HTML markup; the rewriter scans it.
    Html,
    /// A run of HTML attributes; the rewriter scans it.
    Attributes,
    /// Plain text, untouched.
    Text,
    /// CSS, untouched here.
    Css,
    /// JavaScript, untouched here.
    Js,
    /// A URI, untouched here.
    Uri,
    /// A trusted resource URI, untouched here.
    TrustedResourceUri,
}

impl ContentKind {
    /// Parses the `kind="…"` attribute value.
    pub fn from_attribute_value(value: &str) -> Option<ContentKind> {
        match value {
            "html" => Some(ContentKind::Html),
            "attributes" => Some(ContentKind::Attributes),
            "text" => Some(ContentKind::Text),
            "css" => Some(ContentKind::Css),
            "js" => Some(ContentKind::Js),
            "uri" => Some(ContentKind::Uri),
            "trusted_resource_uri" => Some(ContentKind::TrustedResourceUri),
            _ => None,
        }
    }
}

/// Quoting style of an HTML attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quotes {
    /// Unquoted value.
    None,
    /// `'…'`
    Single,
    /// `"…"`
    Double,
}

/// An HTML tag name: the node that holds it is either literal raw text or
/// a print command (dynamic tag name).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagName {
    /// The raw-text or print node carrying the name.
    pub node: NodeId,
}

/// One arena slot: the node's kind plus its tree bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct SoyNodeData {
    /// The owning parent, if attached.
    pub parent: Option<NodeId>,
    /// What the node is.
    pub kind: SoyNodeKind,
    /// Where it came from.
    pub location: SourceLocation,
}

/// Every template-level node kind the front-end deals with.
#[derive(Debug, Clone, PartialEq)]
pub enum SoyNodeKind {
    /// A source file: a list of templates.
    File {
        /// The templates, in order.
        children: Vec<NodeId>,
    },
    /// `{template name kind="…"}…{/template}`
    Template {
        /// The dotted template name.
        name: String,
        /// The declared content kind.
        content_kind: ContentKind,
        /// Body nodes.
        children: Vec<NodeId>,
    },
    /// Literal template text.
    RawText(RawTextData),
    /// `{$expr}`
    Print {
        /// The printed expression.
        expr: ExprNode,
    },
    /// `{css expr}`
    Css {
        /// The selector expression.
        expr: ExprNode,
    },
    /// `{xid name}`
    Xid {
        /// The id to rename.
        name: String,
    },
    /// `{debugger}`
    Debugger,
    /// `{log}…{/log}`
    Log {
        /// Logged content.
        children: Vec<NodeId>,
    },
    /// `{if}…{/if}`: children are `IfCond`s and at most one trailing `IfElse`.
    If {
        /// The condition and else branches.
        children: Vec<NodeId>,
    },
    /// One `{if expr}` / `{elseif expr}` branch.
    IfCond {
        /// The branch condition.
        expr: ExprNode,
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// The `{else}` branch.
    IfElse {
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// `{switch expr}`: children are `SwitchCase`s and at most one `SwitchDefault`.
    Switch {
        /// The switched expression.
        expr: ExprNode,
        /// The cases.
        children: Vec<NodeId>,
    },
    /// `{case e1, e2}`
    SwitchCase {
        /// The matched expressions.
        exprs: Vec<ExprNode>,
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// `{default}`
    SwitchDefault {
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// `{foreach $var in expr}`: one `ForeachNonempty` child, optionally
    /// followed by a `ForeachIfempty`.
    Foreach {
        /// The loop variable, without `$`.
        var: String,
        /// The iterated expression.
        expr: ExprNode,
        /// The body and optional ifempty branch.
        children: Vec<NodeId>,
    },
    /// The repeated body of a `{foreach}`.
    ForeachNonempty {
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// `{ifempty}`
    ForeachIfempty {
        /// Branch body.
        children: Vec<NodeId>,
    },
    /// `{for $var in range(…)}`
    For {
        /// The loop variable, without `$`.
        var: String,
        /// The 1–3 range arguments.
        range: Vec<ExprNode>,
        /// Loop body.
        children: Vec<NodeId>,
    },
    /// `{let $var: expr /}`
    LetValue {
        /// The bound variable, without `$`.
        var: String,
        /// The bound expression.
        expr: ExprNode,
    },
    /// `{let $var kind="…"}…{/let}`
    LetContent {
        /// The bound variable, without `$`.
        var: String,
        /// The declared kind, if any.
        content_kind: Option<ContentKind>,
        /// The bound content.
        children: Vec<NodeId>,
    },
    /// `{call name}…{/call}`: children are params.
    Call {
        /// The callee template name.
        callee: String,
        /// The `CallParam…` children.
        children: Vec<NodeId>,
    },
    /// `{param key: expr /}`
    CallParamValue {
        /// The parameter name.
        key: String,
        /// The parameter value.
        expr: ExprNode,
    },
    /// `{param key kind="…"}…{/param}`
    CallParamContent {
        /// The parameter name.
        key: String,
        /// The declared kind, if any.
        content_kind: Option<ContentKind>,
        /// The parameter content.
        children: Vec<NodeId>,
    },
    /// A `{msg}` with its `{fallbackmsg}` alternatives.
    MsgFallbackGroup {
        /// The messages; exactly one renders.
        children: Vec<NodeId>,
    },
    /// One message variant.
    Msg {
        /// Message content.
        children: Vec<NodeId>,
    },
    /// A structured `<tag …>` produced by the rewriter.
    HtmlOpenTag {
        /// The tag name.
        tag_name: TagName,
        /// True for `<tag …/>`.
        self_closing: bool,
        /// Attributes and inline dynamic children.
        children: Vec<NodeId>,
    },
    /// A structured `</tag>` produced by the rewriter.
    HtmlCloseTag {
        /// The tag name.
        tag_name: TagName,
        /// Content found inside the close tag (always an error, but kept).
        children: Vec<NodeId>,
    },
    /// A structured attribute produced by the rewriter.
    HtmlAttribute {
        /// Location of the `=`, if the attribute has a value.
        eq_location: Option<SourceLocation>,
        /// One name child, then optionally one value child.
        children: Vec<NodeId>,
    },
    /// A structured attribute value produced by the rewriter.
    HtmlAttributeValue {
        /// The quoting style.
        quotes: Quotes,
        /// The value parts.
        children: Vec<NodeId>,
    },
}

impl SoyNodeKind {
    /// The child list, for node kinds that have one.
    pub fn children(&self) -> Option<&Vec<NodeId>> {
        match self {
            SoyNodeKind::File { children }
            | SoyNodeKind::Template { children, .. }
            | SoyNodeKind::Log { children }
            | SoyNodeKind::If { children }
            | SoyNodeKind::IfCond { children, .. }
            | SoyNodeKind::IfElse { children }
            | SoyNodeKind::Switch { children, .. }
            | SoyNodeKind::SwitchCase { children, .. }
            | SoyNodeKind::SwitchDefault { children }
            | SoyNodeKind::Foreach { children, .. }
            | SoyNodeKind::ForeachNonempty { children }
            | SoyNodeKind::ForeachIfempty { children }
            | SoyNodeKind::For { children, .. }
            | SoyNodeKind::LetContent { children, .. }
            | SoyNodeKind::Call { children, .. }
            | SoyNodeKind::CallParamContent { children, .. }
            | SoyNodeKind::MsgFallbackGroup { children }
            | SoyNodeKind::Msg { children }
            | SoyNodeKind::HtmlOpenTag { children, .. }
            | SoyNodeKind::HtmlCloseTag { children, .. }
            | SoyNodeKind::HtmlAttribute { children, .. }
            | SoyNodeKind::HtmlAttributeValue { children, .. } => Some(children),
            SoyNodeKind::RawText(_)
            | SoyNodeKind::Print { .. }
            | SoyNodeKind::Css { .. }
            | SoyNodeKind::Xid { .. }
            | SoyNodeKind::Debugger
            | SoyNodeKind::LetValue { .. }
            | SoyNodeKind::CallParamValue { .. } => None,
        }
    }

    /// Mutable access to the child list.
    pub fn children_mut(&mut self) -> Option<&mut Vec<NodeId>> {
        match self {
            SoyNodeKind::File { children }
            | SoyNodeKind::Template { children, .. }
            | SoyNodeKind::Log { children }
            | SoyNodeKind::If { children }
            | SoyNodeKind::IfCond { children, .. }
            | SoyNodeKind::IfElse { children }
            | SoyNodeKind::Switch { children, .. }
            | SoyNodeKind::SwitchCase { children, .. }
            | SoyNodeKind::SwitchDefault { children }
            | SoyNodeKind::Foreach { children, .. }
            | SoyNodeKind::ForeachNonempty { children }
            | SoyNodeKind::ForeachIfempty { children }
            | SoyNodeKind::For { children, .. }
            | SoyNodeKind::LetContent { children, .. }
            | SoyNodeKind::Call { children, .. }
            | SoyNodeKind::CallParamContent { children, .. }
            | SoyNodeKind::MsgFallbackGroup { children }
            | SoyNodeKind::Msg { children }
            | SoyNodeKind::HtmlOpenTag { children, .. }
            | SoyNodeKind::HtmlCloseTag { children, .. }
            | SoyNodeKind::HtmlAttribute { children, .. }
            | SoyNodeKind::HtmlAttributeValue { children, .. } => Some(children),
            SoyNodeKind::RawText(_)
            | SoyNodeKind::Print { .. }
            | SoyNodeKind::Css { .. }
            | SoyNodeKind::Xid { .. }
            | SoyNodeKind::Debugger
            | SoyNodeKind::LetValue { .. }
            | SoyNodeKind::CallParamValue { .. } => None,
        }
    }

    /// A user-facing name for the command, for diagnostics.
    pub fn command_name(&self) -> &'static str {
        match self {
            SoyNodeKind::File { .. } => "file",
            SoyNodeKind::Template { .. } => "{template}",
            SoyNodeKind::RawText(_) => "text",
            SoyNodeKind::Print { .. } => "{print}",
            SoyNodeKind::Css { .. } => "{css}",
            SoyNodeKind::Xid { .. } => "{xid}",
            SoyNodeKind::Debugger => "{debugger}",
            SoyNodeKind::Log { .. } => "{log}",
            SoyNodeKind::If { .. } => "{if}",
            SoyNodeKind::IfCond { .. } => "{if}",
            SoyNodeKind::IfElse { .. } => "{else}",
            SoyNodeKind::Switch { .. } => "{switch}",
            SoyNodeKind::SwitchCase { .. } => "{case}",
            SoyNodeKind::SwitchDefault { .. } => "{default}",
            SoyNodeKind::Foreach { .. } => "{foreach}",
            SoyNodeKind::ForeachNonempty { .. } => "{foreach}",
            SoyNodeKind::ForeachIfempty { .. } => "{ifempty}",
            SoyNodeKind::For { .. } => "{for}",
            SoyNodeKind::LetValue { .. } | SoyNodeKind::LetContent { .. } => "{let}",
            SoyNodeKind::Call { .. } => "{call}",
            SoyNodeKind::CallParamValue { .. } | SoyNodeKind::CallParamContent { .. } => "{param}",
            SoyNodeKind::MsgFallbackGroup { .. } | SoyNodeKind::Msg { .. } => "{msg}",
            SoyNodeKind::HtmlOpenTag { .. } => "html open tag",
            SoyNodeKind::HtmlCloseTag { .. } => "html close tag",
            SoyNodeKind::HtmlAttribute { .. } => "html attribute",
            SoyNodeKind::HtmlAttributeValue { .. } => "html attribute value",
        }
    }
}

/// The arena owning every node of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SoyTree {
    file_path: Arc<str>,
    nodes: Vec<Option<SoyNodeData>>,
    root: Option<NodeId>,
}

impl SoyTree {
    /// An empty arena for one file.
    pub fn new(file_path: impl Into<Arc<str>>) -> Self {
        Self { file_path: file_path.into(), nodes: Vec::new(), root: None }
    }

    /// The file this tree belongs to.
    pub fn file_path(&self) -> &Arc<str> {
        &self.file_path
    }

    /// Allocates a detached node with a fresh id.
    pub fn alloc(
        &mut self,
        ids: &mut IdGenerator,
        kind: SoyNodeKind,
        location: SourceLocation,
    ) -> NodeId {
        let id = ids.next_id();
        let index = id.index();
        if index >= self.nodes.len() {
            self.nodes.resize(index + 1, None);
        }
        self.nodes[index] = Some(SoyNodeData { parent: None, kind, location });
        id
    }

    /// Marks `id` as the file root.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// The file root, once set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    fn data(&self, id: NodeId) -> &SoyNodeData {
        match self.nodes.get(id.index()).and_then(|slot| slot.as_ref()) {
            Some(data) => data,
            None => unreachable!("node {id} is not in this tree"),
        }
    }

    fn data_mut(&mut self, id: NodeId) -> &mut SoyNodeData {
        match self.nodes.get_mut(id.index()).and_then(|slot| slot.as_mut()) {
            Some(data) => data,
            None => unreachable!("node {id} is not in this tree"),
        }
    }

    /// The node's kind.
    pub fn kind(&self, id: NodeId) -> &SoyNodeKind {
        &self.data(id).kind
    }

    /// Mutable access to the node's kind.
    pub fn kind_mut(&mut self, id: NodeId) -> &mut SoyNodeKind {
        &mut self.data_mut(id).kind
    }

    /// The node's location.
    pub fn location(&self, id: NodeId) -> &SourceLocation {
        &self.data(id).location
    }

    /// Widens the node's recorded location.
    pub fn set_location(&mut self, id: NodeId, location: SourceLocation) {
        self.data_mut(id).location = location;
    }

    /// The node's parent, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.data(id).parent
    }

    /// The node's children; empty for leaf kinds.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.data(id).kind.children().map_or(&[], |c| c.as_slice())
    }

    /// The position of `child` under `parent`.
    pub fn child_index(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|&c| c == child)
    }

    /// Appends `children` under `parent`, reparenting each.
    pub fn add_children(&mut self, parent: NodeId, children: impl IntoIterator<Item = NodeId>) {
        let children: Vec<NodeId> = children.into_iter().collect();
        match self.data_mut(parent).kind.children_mut() {
            Some(list) => list.extend(children.iter().copied()),
            None => unreachable!("node {parent} cannot hold children"),
        }
        for child in children {
            self.data_mut(child).parent = Some(parent);
        }
    }

    /// Inserts `children` under `parent` at position `at`.
    pub fn insert_children(&mut self, parent: NodeId, at: usize, children: Vec<NodeId>) {
        match self.data_mut(parent).kind.children_mut() {
            Some(list) => {
                list.splice(at..at, children.iter().copied());
            }
            None => unreachable!("node {parent} cannot hold children"),
        }
        for child in children {
            self.data_mut(child).parent = Some(parent);
        }
    }

    /// Unlinks `child` from `parent`, returning the index it occupied.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Option<usize> {
        let index = self.child_index(parent, child)?;
        if let Some(list) = self.data_mut(parent).kind.children_mut() {
            list.remove(index);
        }
        self.data_mut(child).parent = None;
        Some(index)
    }

    /// The literal text of a tag name, when it is static.
    pub fn static_tag_name(&self, tag: TagName) -> Option<&str> {
        match self.kind(tag.node) {
            SoyNodeKind::RawText(raw) => Some(raw.text()),
            _ => None,
        }
    }
}
