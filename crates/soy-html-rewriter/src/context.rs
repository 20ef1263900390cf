//! Per-block parsing context.
//!
//! Each block (template body, control-flow branch, kinded content block)
//! gets a fresh context: the FSM state crosses block boundaries via
//! reconciliation, but a tag or attribute in progress never does — that is
//! what makes "opened here, closed elsewhere" detectable.

use crate::state::State;
use soy_ast::{NodeId, Quotes, TagName};
use soy_position_tracking::{Point, SourceLocation};

/// A static tag name being accumulated character by character.
#[derive(Debug, Default)]
pub(crate) struct PendingName {
    pub(crate) text: String,
    pub(crate) start: Point,
}

/// Everything in flight within one block.
#[derive(Debug)]
pub(crate) struct ParsingContext {
    /// Current FSM state.
    pub(crate) state: State,
    /// Where the current state was entered, for error locations.
    pub(crate) transition: Point,

    // --- tag in progress ---
    /// Point of the `<`, when a tag was begun in this block.
    pub(crate) tag_start: Option<Point>,
    /// True for `</…`.
    pub(crate) tag_close: bool,
    /// The resolved tag name, once consumed.
    pub(crate) tag_name: Option<TagName>,
    /// Static name accumulation (may span raw-text nodes).
    pub(crate) pending_name: PendingName,
    /// Completed attributes and inline dynamic children of the tag.
    pub(crate) tag_children: Vec<NodeId>,

    // --- attribute in progress ---
    /// The name node of the attribute being built.
    pub(crate) attr_name: Option<NodeId>,
    /// Span of the attribute name, for the attribute node's location.
    pub(crate) attr_name_span: Option<(Point, Point)>,
    /// Whitespace seen since the attribute name ended.
    pub(crate) ws_after_name: bool,
    /// Location of the `=`, once seen.
    pub(crate) eq_location: Option<SourceLocation>,
    /// A directly-assigned value (dynamic print or promoted construct).
    pub(crate) attr_value: Option<NodeId>,
    /// Quote style and opening point, when a quoted value opened here.
    pub(crate) quoted: Option<(Quotes, Point)>,
    /// An unquoted value has started in this block.
    pub(crate) value_open: bool,
    /// Accumulated value parts.
    pub(crate) value_parts: Vec<NodeId>,

    /// Block-level output produced by structural events (completed tags,
    /// ownerless attributes), drained by the caller after each step.
    pub(crate) pending_out: Vec<NodeId>,
}

impl ParsingContext {
    pub(crate) fn new(state: State, at: Point) -> Self {
        Self {
            state,
            transition: at,
            tag_start: None,
            tag_close: false,
            tag_name: None,
            pending_name: PendingName::default(),
            tag_children: Vec::new(),
            attr_name: None,
            attr_name_span: None,
            ws_after_name: false,
            eq_location: None,
            attr_value: None,
            quoted: None,
            value_open: false,
            value_parts: Vec::new(),
            pending_out: Vec::new(),
        }
    }

    pub(crate) fn set_state(&mut self, state: State, at: Point) {
        self.state = state;
        self.transition = at;
    }

    /// A tag was begun in this block.
    pub(crate) fn has_tag(&self) -> bool {
        self.tag_start.is_some()
    }

    /// An attribute name was parsed in this block.
    pub(crate) fn has_attr(&self) -> bool {
        self.attr_name.is_some()
    }

    /// A value (quoted or unquoted) is currently owned by this block.
    pub(crate) fn owns_value(&self) -> bool {
        self.quoted.is_some() || self.value_open
    }

    /// Clears the attribute in progress.
    pub(crate) fn reset_attribute(&mut self) {
        self.attr_name = None;
        self.attr_name_span = None;
        self.ws_after_name = false;
        self.eq_location = None;
        self.attr_value = None;
        self.quoted = None;
        self.value_open = false;
        self.value_parts.clear();
    }

    /// Clears the tag in progress (and with it any attribute).
    pub(crate) fn reset_tag(&mut self) {
        self.tag_start = None;
        self.tag_close = false;
        self.tag_name = None;
        self.pending_name = PendingName::default();
        self.tag_children.clear();
        self.reset_attribute();
    }

    /// Clears everything; used when a block aborts.
    pub(crate) fn reset(&mut self) {
        self.reset_tag();
        self.pending_out.clear();
    }

    /// Validates the post-reparent invariant: nothing half-built remains.
    /// A violation is a rewriter bug, not a user error.
    pub(crate) fn check_empty(&self) {
        debug_assert!(
            !self.has_tag() && !self.has_attr() && self.value_parts.is_empty(),
            "parsing context still holds in-flight nodes: {self:?}"
        );
    }
}
