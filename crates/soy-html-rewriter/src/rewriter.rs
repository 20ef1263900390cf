//! The contextual HTML rewrite pass.
//!
//! Walks every template, scanning raw text with the tag-lexing state
//! machine and rebuilding it as structured HTML nodes. All mutation is
//! recorded in the [`EditBuffer`] and applied per template only when the
//! template produced no errors, so a broken template never ends up
//! half-rewritten.

use crate::context::ParsingContext;
use crate::edits::EditBuffer;
use crate::state::State;
use memchr::{memchr, memmem};
use soy_ast::{IdGenerator, NodeId, Quotes, RawTextData, SoyNodeKind, SoyTree, TagName};
use soy_diagnostics_codes::SoyErrorKind;
use soy_error::ErrorReporter;
use soy_position_tracking::{Point, SourceLocation};
use std::sync::Arc;

/// Internal early return that unwinds to the nearest block boundary.
/// Always preceded by a reported error; never escapes a block visit.
pub(crate) struct AbortBlock;

type BlockResult = Result<(), AbortBlock>;

/// What happened to a visited node at block level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// Still a child of the block.
    Kept,
    /// Captured into a tag, attribute or value; unlink it from the block.
    Moved,
    /// Raw text: the visit recorded its own replacement.
    Handled,
}

/// The rewrite pass. See [`run`](HtmlRewriter::run).
pub struct HtmlRewriter<'e> {
    strict: bool,
    errs: &'e mut ErrorReporter,
}

impl<'e> HtmlRewriter<'e> {
    /// Creates the pass. Rewriting mutates the tree only when
    /// `experimental_features` contains `"stricthtml"`; otherwise the pass
    /// runs against a throwaway clone and only the diagnostics remain.
    pub fn new(experimental_features: &[String], errs: &'e mut ErrorReporter) -> Self {
        let strict = experimental_features.iter().any(|f| f == "stricthtml");
        Self { strict, errs }
    }

    /// Rewrites every template in `tree`.
    pub fn run(&mut self, tree: &mut SoyTree, ids: &mut IdGenerator) {
        if self.strict {
            Visitor::new(tree, ids, self.errs).run();
        } else {
            tracing::debug!("html rewriter running in dry-run mode");
            let mut scratch = tree.clone();
            Visitor::new(&mut scratch, ids, self.errs).run();
        }
    }
}

struct Visitor<'t, 'i, 'e> {
    tree: &'t mut SoyTree,
    ids: &'i mut IdGenerator,
    errs: &'e mut ErrorReporter,
    edits: EditBuffer,
    file: Arc<str>,
}

impl<'t, 'i, 'e> Visitor<'t, 'i, 'e> {
    fn new(tree: &'t mut SoyTree, ids: &'i mut IdGenerator, errs: &'e mut ErrorReporter) -> Self {
        let file = Arc::clone(tree.file_path());
        Self { tree, ids, errs, edits: EditBuffer::new(), file }
    }

    fn run(&mut self) {
        let Some(root) = self.tree.root() else { return };
        let templates: Vec<NodeId> = self.tree.children(root).to_vec();
        for template in templates {
            let SoyNodeKind::Template { content_kind, name, .. } = self.tree.kind(template)
            else {
                continue;
            };
            let kind = *content_kind;
            let name = name.clone();
            tracing::debug!(template = %name, ?kind, "rewriting template");

            let cp = self.errs.checkpoint();
            let _ = self.visit_block(template, State::for_content_kind(kind));
            if self.errs.errors_since(cp) {
                self.edits.clear();
            } else {
                self.edits.apply(self.tree);
            }
        }
    }

    fn report(&mut self, at: Point, kind: SoyErrorKind) {
        self.errs.report(SourceLocation::point(Arc::clone(&self.file), at), kind);
    }

    fn report_node(&mut self, node: NodeId, kind: SoyErrorKind) {
        let loc = self.tree.location(node).clone();
        self.errs.report(loc, kind);
    }

    // ----- block traversal -----

    /// Visits one block's children with a fresh context starting at
    /// `start`, returning the ending state. If the block reports any
    /// error, the starting state is returned instead, which stops one bad
    /// block from cascading into reconciliation noise.
    fn visit_block(&mut self, block: NodeId, start: State) -> State {
        let cp = self.errs.checkpoint();
        let start_point = self.tree.location(block).begin;
        let mut ctx = ParsingContext::new(start, start_point);

        let children: Vec<NodeId> = self.tree.children(block).to_vec();
        let mut aborted = false;
        for child in children {
            match self.visit_node(child, &mut ctx) {
                Ok(Disposition::Handled) => {}
                Ok(disposition) => {
                    if ctx.pending_out.is_empty() {
                        if disposition == Disposition::Moved {
                            self.edits.remove(child);
                        }
                    } else {
                        // structural output takes the visited child's slot
                        let mut list = Vec::new();
                        if disposition == Disposition::Kept {
                            list.push(child);
                        }
                        list.append(&mut ctx.pending_out);
                        self.edits.replace(child, list);
                    }
                }
                Err(AbortBlock) => {
                    aborted = true;
                    break;
                }
            }
        }

        if aborted {
            ctx.reset();
        } else {
            self.finish_block(&mut ctx, block);
        }
        if !ctx.pending_out.is_empty() {
            let pending: Vec<NodeId> = ctx.pending_out.drain(..).collect();
            self.edits.add_children(block, pending);
        }

        if self.errs.errors_since(cp) {
            return start;
        }
        ctx.state
    }

    /// Block-end bookkeeping: close a pending unquoted value, close a
    /// dangling attribute, flag invalid ending states.
    fn finish_block(&mut self, ctx: &mut ParsingContext, block: NodeId) {
        let end = self.tree.location(block).end;
        if ctx.state == State::UnquotedAttrValue && ctx.owns_value() {
            self.finalize_unquoted_value(ctx, end);
            ctx.set_state(State::AfterTagNameOrAttribute, end);
        }
        if ctx.state == State::AfterAttributeName && ctx.has_attr() {
            self.finish_attribute(ctx, end);
            ctx.set_state(State::AfterTagNameOrAttribute, end);
        }
        if ctx.state.invalid_end_of_block() && ctx.has_attr() {
            let at = ctx.transition;
            self.report(
                at,
                SoyErrorKind::BlockEndsInInvalidState { state: ctx.state.name().to_string() },
            );
        }
        if ctx.state.is_text_like() {
            ctx.check_empty();
        }
    }

    fn visit_node(
        &mut self,
        node: NodeId,
        ctx: &mut ParsingContext,
    ) -> Result<Disposition, AbortBlock> {
        match self.tree.kind(node) {
            SoyNodeKind::RawText(_) => {
                self.visit_raw_text(node, ctx)?;
                Ok(Disposition::Handled)
            }

            SoyNodeKind::Print { .. } | SoyNodeKind::Css { .. } | SoyNodeKind::Xid { .. } => {
                self.process_printable(node, ctx)
            }

            SoyNodeKind::Call { .. } => {
                let params: Vec<NodeId> = self.tree.children(node).to_vec();
                for param in params {
                    if let SoyNodeKind::CallParamContent { content_kind, .. } =
                        self.tree.kind(param)
                    {
                        let start =
                            content_kind.map_or(State::None, State::for_content_kind);
                        let _ = self.visit_block(param, start);
                    }
                }
                self.process_printable(node, ctx)
            }

            SoyNodeKind::If { children } => {
                let guaranteed = children
                    .iter()
                    .any(|&c| matches!(self.tree.kind(c), SoyNodeKind::IfElse { .. }));
                let branches = children.clone();
                self.visit_control_flow(node, branches, guaranteed, ctx)
            }
            SoyNodeKind::Switch { children, .. } => {
                let guaranteed = children
                    .iter()
                    .any(|&c| matches!(self.tree.kind(c), SoyNodeKind::SwitchDefault { .. }));
                let branches = children.clone();
                self.visit_control_flow(node, branches, guaranteed, ctx)
            }
            // loop bodies may run zero or many times, so a loop never
            // guarantees exactly one pass
            SoyNodeKind::Foreach { children, .. } => {
                let branches = children.clone();
                self.visit_control_flow(node, branches, false, ctx)
            }
            SoyNodeKind::For { .. } => self.visit_control_flow(node, vec![node], false, ctx),
            // exactly one message of a fallback group renders
            SoyNodeKind::MsgFallbackGroup { children } => {
                let branches = children.clone();
                self.visit_control_flow(node, branches, true, ctx)
            }

            SoyNodeKind::LetContent { content_kind, .. } => {
                let start = content_kind.map_or(State::None, State::for_content_kind);
                let _ = self.visit_block(node, start);
                self.process_nonprintable(node, ctx)
            }
            SoyNodeKind::Log { .. } => {
                let _ = self.visit_block(node, State::None);
                self.process_nonprintable(node, ctx)
            }
            SoyNodeKind::LetValue { .. } | SoyNodeKind::Debugger => {
                self.process_nonprintable(node, ctx)
            }

            // already-structured html (a second pass) stays put, but must
            // still drive the state so rcdata content rescans correctly
            SoyNodeKind::HtmlOpenTag { tag_name, self_closing, .. } => {
                let next = if *self_closing {
                    State::Pcdata
                } else {
                    self.rcdata_state_for(*tag_name).unwrap_or(State::Pcdata)
                };
                let end = self.tree.location(node).end;
                ctx.set_state(next, end);
                Ok(Disposition::Kept)
            }
            SoyNodeKind::HtmlCloseTag { .. } => {
                let end = self.tree.location(node).end;
                ctx.set_state(State::Pcdata, end);
                Ok(Disposition::Kept)
            }

            _ => Ok(Disposition::Kept),
        }
    }

    fn rcdata_state_for(&self, tag_name: TagName) -> Option<State> {
        match self.tree.static_tag_name(tag_name) {
            Some(name) if name.eq_ignore_ascii_case("script") => Some(State::RcdataScript),
            Some(name) if name.eq_ignore_ascii_case("style") => Some(State::RcdataStyle),
            Some(name) if name.eq_ignore_ascii_case("textarea") => Some(State::RcdataTextarea),
            Some(name) if name.eq_ignore_ascii_case("title") => Some(State::RcdataTitle),
            _ => None,
        }
    }

    // ----- printable / non-printable commands -----

    /// A node that renders output: placement depends on the state.
    fn process_printable(
        &mut self,
        node: NodeId,
        ctx: &mut ParsingContext,
    ) -> Result<Disposition, AbortBlock> {
        let begin = self.tree.location(node).begin;
        let end = self.tree.location(node).end;
        self.settle_after_attribute_name(ctx, begin);

        match ctx.state {
            s if s.is_text_like() => Ok(Disposition::Kept),

            State::HtmlTagName => {
                if ctx.tag_name.is_none() && ctx.pending_name.text.is_empty() {
                    ctx.tag_name = Some(TagName { node });
                    ctx.set_state(State::AfterTagNameOrAttribute, end);
                    Ok(Disposition::Moved)
                } else {
                    self.report_node(node, SoyErrorKind::InvalidTagName);
                    Err(AbortBlock)
                }
            }

            State::AfterTagNameOrAttribute | State::BeforeAttributeName => {
                if ctx.has_tag() {
                    ctx.tag_children.push(node);
                    Ok(Disposition::Moved)
                } else {
                    Ok(Disposition::Kept)
                }
            }

            State::BeforeAttributeValue => {
                // a dynamic value with no quotes; the print is the value
                ctx.attr_value = Some(node);
                self.finish_attribute(ctx, end);
                ctx.set_state(State::AfterTagNameOrAttribute, end);
                Ok(Disposition::Moved)
            }

            s if s.is_attr_value() => {
                if ctx.owns_value() {
                    ctx.value_parts.push(node);
                    Ok(Disposition::Moved)
                } else {
                    Ok(Disposition::Kept)
                }
            }

            // AfterAttributeName was settled above
            _ => Ok(Disposition::Kept),
        }
    }

    /// A node that renders nothing: fine in text-like states, rejected
    /// inside tags and attribute values.
    fn process_nonprintable(
        &mut self,
        node: NodeId,
        ctx: &mut ParsingContext,
    ) -> Result<Disposition, AbortBlock> {
        if ctx.state.is_text_like() {
            return Ok(Disposition::Kept);
        }
        let command = self.tree.kind(node).command_name().to_string();
        self.report_node(node, SoyErrorKind::InvalidLocationForNonprintable { command });
        Err(AbortBlock)
    }

    // ----- control flow -----

    fn visit_control_flow(
        &mut self,
        node: NodeId,
        branches: Vec<NodeId>,
        guaranteed: bool,
        ctx: &mut ParsingContext,
    ) -> Result<Disposition, AbortBlock> {
        let end_point = self.tree.location(node).end;
        let command = self.tree.kind(node).command_name().to_string();

        if ctx.state == State::HtmlTagName {
            self.report_node(node, SoyErrorKind::InvalidLocationForControlFlow { command });
            return Err(AbortBlock);
        }
        // a pending AfterAttributeName is NOT settled here: branches must
        // see it so an `=` for an attribute from another block is caught
        let start = ctx.state;

        let end_states: Vec<State> =
            branches.iter().map(|&branch| self.visit_block(branch, start)).collect();
        let Some(&first) = end_states.first() else {
            return Ok(Disposition::Kept);
        };

        let mut end = first;
        let mut conflict = None;
        for &next in &end_states[1..] {
            match end.reconcile(next) {
                Some(reconciled) => end = reconciled,
                None => {
                    conflict = Some(next);
                    break;
                }
            }
        }
        if let Some(bad) = conflict {
            self.report_node(
                node,
                SoyErrorKind::BlockChangesContext {
                    block: command,
                    start: start.name().to_string(),
                    end: bad.name().to_string(),
                    hint: bad.end_of_block_hint().to_string(),
                },
            );
            ctx.set_state(start, end_point);
            return Ok(Disposition::Kept);
        }

        // promotion: where the construct itself lands depends on the
        // state it started in
        if start.in_tag() {
            ctx.set_state(end, end_point);
            return if ctx.has_tag() {
                ctx.tag_children.push(node);
                Ok(Disposition::Moved)
            } else {
                Ok(Disposition::Kept)
            };
        }

        if start == State::UnquotedAttrValue {
            if ctx.owns_value() {
                ctx.value_parts.push(node);
                if end != State::UnquotedAttrValue {
                    // a branch ended the value (whitespace inside it)
                    self.finalize_unquoted_value(ctx, end_point);
                }
                ctx.set_state(end, end_point);
                return Ok(Disposition::Moved);
            }
            ctx.set_state(end, end_point);
            return Ok(Disposition::Kept);
        }

        if start.is_attr_value() {
            // quoted value
            ctx.set_state(end, end_point);
            return if ctx.owns_value() {
                ctx.value_parts.push(node);
                Ok(Disposition::Moved)
            } else {
                Ok(Disposition::Kept)
            };
        }

        if start == State::BeforeAttributeValue {
            if matches!(
                end,
                State::UnquotedAttrValue
                    | State::AfterTagNameOrAttribute
                    | State::BeforeAttributeName
            ) {
                if !guaranteed {
                    let loc = self.tree.location(node).clone();
                    let command = self.tree.kind(node).command_name().to_string();
                    self.errs.report(
                        loc,
                        SoyErrorKind::ConditionalBlockIsntGuaranteedToProduceOneAttributeValue {
                            command,
                        },
                    );
                }
                ctx.attr_value = Some(node);
                self.finish_attribute(ctx, end_point);
                let next = if end == State::UnquotedAttrValue {
                    State::AfterTagNameOrAttribute
                } else {
                    end
                };
                ctx.set_state(next, end_point);
                return Ok(Disposition::Moved);
            }
            // every branch was a no-op; still before the value
            return Ok(Disposition::Kept);
        }

        ctx.set_state(end, end_point);
        Ok(Disposition::Kept)
    }

    /// `AfterAttributeName` resolves as soon as anything other than `=`
    /// arrives: the attribute has no value.
    fn settle_after_attribute_name(&mut self, ctx: &mut ParsingContext, at: Point) {
        if ctx.state == State::AfterAttributeName {
            let ws = ctx.ws_after_name;
            if ctx.has_attr() {
                self.finish_attribute(ctx, at);
            }
            let next =
                if ws { State::BeforeAttributeName } else { State::AfterTagNameOrAttribute };
            ctx.set_state(next, at);
        }
    }

    // ----- node construction -----

    fn alloc(&mut self, kind: SoyNodeKind, location: SourceLocation) -> NodeId {
        self.tree.alloc(self.ids, kind, location)
    }

    fn span(&self, begin: Point, end: Point) -> SourceLocation {
        SourceLocation::new(Arc::clone(&self.file), begin, end)
    }

    /// Builds the attribute node from the context's in-progress pieces and
    /// routes it to the open tag (or to block level when the tag lives in
    /// another block).
    fn finish_attribute(&mut self, ctx: &mut ParsingContext, at: Point) {
        let Some(name) = ctx.attr_name.take() else {
            // value without a name: a fragment contributed by a branch
            if let Some(value) = ctx.attr_value.take() {
                ctx.pending_out.push(value);
            }
            ctx.reset_attribute();
            return;
        };
        let (name_begin, name_end) = ctx.attr_name_span.take().unwrap_or((at, at));
        let eq_location = ctx.eq_location.take();
        let value = ctx.attr_value.take();

        let end = value.map_or(name_end, |v| self.tree.location(v).end);
        let attr = self.alloc(
            SoyNodeKind::HtmlAttribute { eq_location, children: Vec::new() },
            self.span(name_begin, end),
        );
        let mut kids = vec![name];
        kids.extend(value);
        self.edits.add_children(attr, kids);

        if ctx.has_tag() {
            ctx.tag_children.push(attr);
        } else {
            ctx.pending_out.push(attr);
        }
        ctx.reset_attribute();
    }

    /// Wraps the accumulated parts into an unquoted value node and closes
    /// the attribute (when this block owns one).
    fn finalize_unquoted_value(&mut self, ctx: &mut ParsingContext, at: Point) {
        let parts: Vec<NodeId> = ctx.value_parts.drain(..).collect();
        ctx.value_open = false;
        if parts.is_empty() && !ctx.has_attr() {
            return;
        }
        let location = parts
            .iter()
            .map(|&p| self.tree.location(p).clone())
            .reduce(|a, b| a.extend(&b))
            .unwrap_or_else(|| SourceLocation::point(Arc::clone(&self.file), at));
        let value = self.alloc(
            SoyNodeKind::HtmlAttributeValue { quotes: Quotes::None, children: Vec::new() },
            location,
        );
        self.edits.add_children(value, parts);
        ctx.attr_value = Some(value);
        if ctx.has_attr() {
            self.finish_attribute(ctx, at);
        } else {
            ctx.attr_value = None;
            ctx.pending_out.push(value);
        }
    }

    /// The matching close quote arrived: build the quoted value node.
    fn close_quoted_value(&mut self, ctx: &mut ParsingContext, close: Point) {
        let Some((quotes, open)) = ctx.quoted.take() else {
            return;
        };
        let parts: Vec<NodeId> = ctx.value_parts.drain(..).collect();
        let value = self.alloc(
            SoyNodeKind::HtmlAttributeValue { quotes, children: Vec::new() },
            self.span(open, close),
        );
        self.edits.add_children(value, parts);
        ctx.attr_value = Some(value);
        if ctx.has_attr() {
            self.finish_attribute(ctx, close);
        } else {
            ctx.attr_value = None;
            ctx.pending_out.push(value);
        }
        ctx.set_state(State::AfterTagNameOrAttribute, close);
    }

    /// `>` or `/>` arrived: build the open/close tag node.
    fn finish_tag(&mut self, ctx: &mut ParsingContext, gt: Point, self_closing: bool) -> BlockResult {
        let Some(tag_start) = ctx.tag_start else {
            self.report(gt, SoyErrorKind::FoundEndTagStartedInAnotherBlock);
            return Err(AbortBlock);
        };
        if ctx.has_attr() {
            self.finish_attribute(ctx, gt);
        }
        if ctx.tag_name.is_none() && !ctx.pending_name.text.is_empty() {
            self.resolve_pending_name(ctx);
        }
        let Some(tag_name) = ctx.tag_name else {
            self.report(tag_start, SoyErrorKind::InvalidTagName);
            ctx.reset_tag();
            return Err(AbortBlock);
        };

        let close = ctx.tag_close;
        if close && self_closing {
            self.report(gt, SoyErrorKind::SelfClosingCloseTag);
        }
        if close && !ctx.tag_children.is_empty() {
            self.report(gt, SoyErrorKind::UnexpectedCloseTagContent);
        }

        let location = self.span(tag_start, gt);
        let kind = if close {
            SoyNodeKind::HtmlCloseTag { tag_name, children: Vec::new() }
        } else {
            SoyNodeKind::HtmlOpenTag { tag_name, self_closing, children: Vec::new() }
        };
        let tag = self.alloc(kind, location);
        let mut kids = vec![tag_name.node];
        kids.append(&mut ctx.tag_children);
        self.edits.add_children(tag, kids);
        ctx.pending_out.push(tag);

        let next = if close || self_closing {
            State::Pcdata
        } else {
            self.rcdata_state_for(tag_name).unwrap_or(State::Pcdata)
        };
        ctx.reset_tag();
        ctx.set_state(next, gt);
        Ok(())
    }

    /// Materializes a buffered static tag name as a raw-text node.
    fn resolve_pending_name(&mut self, ctx: &mut ParsingContext) {
        let text = std::mem::take(&mut ctx.pending_name.text);
        let start = ctx.pending_name.start;
        // names contain no whitespace, so the run is a single column walk
        let raw = RawTextData::from_source(text, start);
        let end = raw.last_point_before(raw.len());
        let node = self.alloc(SoyNodeKind::RawText(raw), self.span(start, end));
        ctx.tag_name = Some(TagName { node });
    }

    // ----- raw text scanning -----

    fn visit_raw_text(&mut self, node: NodeId, ctx: &mut ParsingContext) -> BlockResult {
        if ctx.state == State::None {
            return Ok(());
        }
        let SoyNodeKind::RawText(data) = self.tree.kind(node) else {
            return Ok(());
        };
        let raw = data.clone();
        let mut cur = Cursor { node, raw, pos: 0, seg_start: 0, emissions: Vec::new() };
        cur.emissions.append(&mut ctx.pending_out);

        let result = self.scan(&mut cur, ctx);
        if result.is_err() {
            // the abort discards the template's edits; don't record a
            // partial replacement for this node
            return result;
        }

        if cur.raw.missing_whitespace_at(cur.raw.len()) {
            self.joined_whitespace(ctx, &mut cur, None)?;
        }
        self.at_raw_text_end(ctx, &mut cur);
        cur.emissions.append(&mut ctx.pending_out);

        if cur.emissions.len() != 1 || cur.emissions[0] != node {
            let emissions = std::mem::take(&mut cur.emissions);
            self.edits.replace(node, emissions);
        }
        Ok(())
    }

    fn scan(&mut self, cur: &mut Cursor, ctx: &mut ParsingContext) -> BlockResult {
        while cur.pos < cur.raw.len() {
            if cur.raw.missing_whitespace_at(cur.pos) {
                self.joined_whitespace(ctx, cur, cur.peek())?;
            }
            match ctx.state {
                State::None => {
                    cur.pos = cur.raw.len();
                }
                State::Pcdata => match memchr(b'<', cur.rest().as_bytes()) {
                    None => cur.pos = cur.raw.len(),
                    Some(i) => {
                        cur.pos += i;
                        self.scan_lt(ctx, cur)?;
                    }
                },
                State::RcdataScript
                | State::RcdataStyle
                | State::RcdataTitle
                | State::RcdataTextarea => self.scan_rcdata(ctx, cur),
                State::HtmlComment => self.scan_until(ctx, cur, "-->", State::Pcdata),
                State::Cdata => self.scan_until(ctx, cur, "]]>", State::Pcdata),
                State::XmlDeclaration => self.scan_xml_declaration(ctx, cur),
                State::SingleQuotedXmlAttrValue => {
                    self.scan_until(ctx, cur, "'", State::XmlDeclaration)
                }
                State::DoubleQuotedXmlAttrValue => {
                    self.scan_until(ctx, cur, "\"", State::XmlDeclaration)
                }
                State::HtmlTagName => self.scan_tag_name(ctx, cur),
                State::AfterTagNameOrAttribute => self.scan_after_tag_or_attribute(ctx, cur)?,
                State::BeforeAttributeName => self.scan_before_attribute_name(ctx, cur)?,
                State::AfterAttributeName => self.scan_after_attribute_name(ctx, cur)?,
                State::BeforeAttributeValue => self.scan_before_attribute_value(ctx, cur),
                State::SingleQuotedAttrValue => self.scan_quoted_value(ctx, cur, b'\'')?,
                State::DoubleQuotedAttrValue => self.scan_quoted_value(ctx, cur, b'"')?,
                State::UnquotedAttrValue => self.scan_unquoted_value(ctx, cur)?,
            }
            cur.emissions.append(&mut ctx.pending_out);
        }
        Ok(())
    }

    /// Decides what the `<` at the cursor starts.
    fn scan_lt(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) -> BlockResult {
        let lt = cur.point();
        let rest = cur.rest();
        if rest.starts_with("<!--") {
            // comments stay literal text; only the state changes
            ctx.set_state(State::HtmlComment, lt);
            cur.pos += 4;
            return Ok(());
        }
        if rest.len() >= 9 && rest.as_bytes()[..9].eq_ignore_ascii_case(b"<![cdata[") {
            ctx.set_state(State::Cdata, lt);
            cur.pos += 9;
            return Ok(());
        }
        if rest.starts_with("</") {
            self.begin_tag(ctx, cur, true, lt)?;
            cur.skip_structural(2);
            return Ok(());
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            ctx.set_state(State::XmlDeclaration, lt);
            cur.pos += 2;
            return Ok(());
        }
        match rest.chars().nth(1) {
            Some(c) if is_html_ws(c) => {
                self.report(lt, SoyErrorKind::UnexpectedWsAfterLt);
                // the tag is cancelled; the `<` stays literal
                cur.pos += 1;
                Ok(())
            }
            _ => {
                self.begin_tag(ctx, cur, false, lt)?;
                cur.skip_structural(1);
                Ok(())
            }
        }
    }

    /// An attribute may not start while a value is owed; the scanner's
    /// transitions uphold this, and the guard turns any future violation
    /// into a diagnostic instead of a malformed tree.
    fn begin_attribute(&mut self, ctx: &mut ParsingContext, at: Point) -> BlockResult {
        if ctx.state == State::BeforeAttributeValue {
            self.report(
                at,
                SoyErrorKind::BlockTransitionDisallowed {
                    transition: "an html attribute".to_string(),
                },
            );
            return Err(AbortBlock);
        }
        Ok(())
    }

    fn begin_tag(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
        close: bool,
        lt: Point,
    ) -> BlockResult {
        if ctx.state != State::Pcdata {
            self.report(
                lt,
                SoyErrorKind::BlockTransitionDisallowed {
                    transition: "an html tag".to_string(),
                },
            );
            return Err(AbortBlock);
        }
        self.cut_segment(ctx, cur, cur.pos);
        ctx.reset_tag();
        ctx.tag_start = Some(lt);
        ctx.tag_close = close;
        ctx.set_state(State::HtmlTagName, lt);
        Ok(())
    }

    fn scan_tag_name(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) {
        while let Some(c) = cur.peek() {
            let at = cur.point();
            if is_html_ws(c) && ctx.pending_name.text.is_empty() && ctx.tag_name.is_none() {
                self.report(at, SoyErrorKind::UnexpectedWsAfterLt);
                ctx.reset_tag();
                ctx.set_state(State::Pcdata, at);
                return;
            }
            if matches!(c, '\0' | '\'' | '"') {
                self.report(at, SoyErrorKind::InvalidIdentifier { found: c });
                cur.bump_structural();
                continue;
            }
            if is_html_name_delimiter(c) {
                if ctx.pending_name.text.is_empty() && ctx.tag_name.is_none() {
                    self.report(at, SoyErrorKind::InvalidTagName);
                    ctx.reset_tag();
                    ctx.set_state(State::Pcdata, at);
                    return;
                }
                if ctx.tag_name.is_none() {
                    self.resolve_pending_name(ctx);
                }
                ctx.set_state(State::AfterTagNameOrAttribute, at);
                return;
            }
            if ctx.pending_name.text.is_empty() {
                ctx.pending_name.start = at;
            }
            ctx.pending_name.text.push(c);
            cur.bump_structural();
        }
    }

    fn scan_after_tag_or_attribute(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
    ) -> BlockResult {
        let Some(c) = cur.peek() else { return Ok(()) };
        let at = cur.point();
        if is_html_ws(c) {
            cur.bump_structural();
            ctx.set_state(State::BeforeAttributeName, at);
        } else if c == '>' {
            cur.bump_structural();
            self.finish_tag(ctx, at, false)?;
        } else if cur.rest().starts_with("/>") {
            let gt = cur.raw.location_of(cur.pos + 1);
            cur.skip_structural(2);
            self.finish_tag(ctx, gt, true)?;
        } else {
            self.report(at, SoyErrorKind::ExpectedWsOrCloseAfterTagOrAttribute { found: c });
            ctx.set_state(State::BeforeAttributeName, at);
        }
        Ok(())
    }

    fn scan_before_attribute_name(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
    ) -> BlockResult {
        let Some(c) = cur.peek() else { return Ok(()) };
        let at = cur.point();
        if is_html_ws(c) {
            cur.bump_structural();
            return Ok(());
        }
        if c == '>' {
            cur.bump_structural();
            return self.finish_tag(ctx, at, false);
        }
        if cur.rest().starts_with("/>") {
            let gt = cur.raw.location_of(cur.pos + 1);
            cur.skip_structural(2);
            return self.finish_tag(ctx, gt, true);
        }
        if matches!(c, '\0' | '\'' | '"') {
            self.report(at, SoyErrorKind::InvalidIdentifier { found: c });
            cur.bump_structural();
            return Ok(());
        }
        if is_html_name_delimiter(c) {
            self.report(at, SoyErrorKind::GenericUnexpectedChar { found: c });
            cur.bump_structural();
            return Ok(());
        }

        // an attribute name begins
        self.begin_attribute(ctx, at)?;
        let start = at;
        let mut text = String::new();
        let mut last = at;
        while let Some(c) = cur.peek() {
            if is_html_name_delimiter(c) || matches!(c, '\0' | '\'' | '"') {
                break;
            }
            last = cur.point();
            text.push(c);
            cur.bump_structural();
        }
        let raw = RawTextData::from_source(text, start);
        let name = self.alloc(SoyNodeKind::RawText(raw), self.span(start, last));
        ctx.attr_name = Some(name);
        ctx.attr_name_span = Some((start, last));
        ctx.ws_after_name = false;
        ctx.set_state(State::AfterAttributeName, last);
        Ok(())
    }

    fn scan_after_attribute_name(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
    ) -> BlockResult {
        let Some(c) = cur.peek() else { return Ok(()) };
        let at = cur.point();
        if is_html_ws(c) {
            ctx.ws_after_name = true;
            cur.bump_structural();
            return Ok(());
        }
        if c == '=' {
            if !ctx.has_attr() {
                self.report(at, SoyErrorKind::FoundEqWithAttributeInAnotherBlock);
                return Err(AbortBlock);
            }
            ctx.eq_location = Some(self.span(at, at));
            cur.bump_structural();
            ctx.set_state(State::BeforeAttributeValue, at);
            return Ok(());
        }
        if c == '>' || c == '/' {
            if ctx.has_attr() {
                self.finish_attribute(ctx, at);
            }
            ctx.set_state(State::AfterTagNameOrAttribute, at);
            return Ok(());
        }
        if matches!(c, '\0' | '\'' | '"') || is_unicode_control(c) {
            self.report(at, SoyErrorKind::ExpectedWsEqOrCloseAfterAttributeName { found: c });
            cur.bump_structural();
            return Ok(());
        }
        // something nameable follows: the attribute had no value
        let ws = ctx.ws_after_name;
        if ctx.has_attr() {
            self.finish_attribute(ctx, at);
        }
        let next = if ws { State::BeforeAttributeName } else { State::AfterTagNameOrAttribute };
        ctx.set_state(next, at);
        Ok(())
    }

    fn scan_before_attribute_value(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) {
        let Some(c) = cur.peek() else { return };
        let at = cur.point();
        if is_html_ws(c) {
            // whitespace is skipped without a state change
            cur.bump_structural();
            return;
        }
        if c == '"' {
            ctx.quoted = Some((Quotes::Double, at));
            cur.bump_structural();
            ctx.set_state(State::DoubleQuotedAttrValue, at);
            return;
        }
        if c == '\'' {
            ctx.quoted = Some((Quotes::Single, at));
            cur.bump_structural();
            ctx.set_state(State::SingleQuotedAttrValue, at);
            return;
        }
        if c == '>' || cur.rest().starts_with("/>") {
            self.report(at, SoyErrorKind::ExpectedAttributeValue);
            self.finish_attribute(ctx, at);
            ctx.set_state(State::AfterTagNameOrAttribute, at);
            return;
        }
        ctx.value_open = true;
        ctx.set_state(State::UnquotedAttrValue, at);
    }

    fn scan_quoted_value(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
        quote: u8,
    ) -> BlockResult {
        match memchr(quote, cur.rest().as_bytes()) {
            None => {
                cur.pos = cur.raw.len();
                Ok(())
            }
            Some(i) => {
                let qpos = cur.pos + i;
                let at = cur.raw.location_of(qpos);
                cur.pos = qpos;
                self.cut_segment(ctx, cur, qpos);
                if ctx.owns_value() {
                    cur.skip_structural(1);
                    self.close_quoted_value(ctx, at);
                    Ok(())
                } else {
                    self.report(at, SoyErrorKind::FoundEndOfAttributeStartedInAnotherBlock);
                    Err(AbortBlock)
                }
            }
        }
    }

    fn scan_unquoted_value(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) -> BlockResult {
        while let Some(c) = cur.peek() {
            let at = cur.point();
            if is_html_ws(c) {
                self.cut_segment(ctx, cur, cur.pos);
                if ctx.owns_value() {
                    self.finalize_unquoted_value(ctx, at);
                }
                ctx.set_state(State::BeforeAttributeName, at);
                return Ok(());
            }
            if c == '>' {
                self.cut_segment(ctx, cur, cur.pos);
                if ctx.owns_value() {
                    self.finalize_unquoted_value(ctx, at);
                }
                ctx.set_state(State::AfterTagNameOrAttribute, at);
                return Ok(());
            }
            if matches!(c, '<' | '\'' | '"' | '`' | '=') {
                self.report(at, SoyErrorKind::IllegalHtmlAttributeCharacter { found: c });
                cur.bump();
                continue;
            }
            cur.bump();
        }
        Ok(())
    }

    fn scan_rcdata(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) {
        let name = match ctx.state {
            State::RcdataScript => b"script".as_slice(),
            State::RcdataStyle => b"style".as_slice(),
            State::RcdataTextarea => b"textarea".as_slice(),
            _ => b"title".as_slice(),
        };
        let found = {
            let bytes = cur.rest().as_bytes();
            let mut offset = 0;
            let mut found = None;
            while let Some(i) = memchr(b'<', &bytes[offset..]) {
                let lt = offset + i;
                let tail = &bytes[lt..];
                if tail.len() >= 2 + name.len()
                    && tail.starts_with(b"</")
                    && tail[2..2 + name.len()].eq_ignore_ascii_case(name)
                {
                    found = Some(lt);
                    break;
                }
                offset = lt + 1;
            }
            found
        };
        match found {
            Some(lt) => {
                // hand `</name…` to the pcdata rules without consuming it
                cur.pos += lt;
                let at = cur.point();
                ctx.set_state(State::Pcdata, at);
            }
            None => cur.pos = cur.raw.len(),
        }
    }

    /// Literal scan up to and including `needle`, then `next`.
    fn scan_until(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor, needle: &str, next: State) {
        match memmem::find(cur.rest().as_bytes(), needle.as_bytes()) {
            Some(i) => {
                cur.pos += i + needle.len();
                let at = cur.raw.location_of(cur.pos);
                ctx.set_state(next, at);
            }
            None => cur.pos = cur.raw.len(),
        }
    }

    fn scan_xml_declaration(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) {
        while let Some(c) = cur.peek() {
            let at = cur.point();
            match c {
                '"' => {
                    cur.bump();
                    ctx.set_state(State::DoubleQuotedXmlAttrValue, at);
                    return;
                }
                '\'' => {
                    cur.bump();
                    ctx.set_state(State::SingleQuotedXmlAttrValue, at);
                    return;
                }
                '>' => {
                    cur.bump();
                    ctx.set_state(State::Pcdata, at);
                    return;
                }
                _ => {
                    cur.bump();
                }
            }
        }
    }

    /// §whitespace-joining: stripped whitespace acts as a separator.
    fn joined_whitespace(
        &mut self,
        ctx: &mut ParsingContext,
        cur: &mut Cursor,
        next_char: Option<char>,
    ) -> BlockResult {
        let at = cur.point();
        match ctx.state {
            State::UnquotedAttrValue => {
                self.cut_segment(ctx, cur, cur.pos);
                if ctx.owns_value() {
                    self.finalize_unquoted_value(ctx, at);
                }
                ctx.set_state(State::BeforeAttributeName, at);
            }
            State::AfterTagNameOrAttribute => {
                ctx.set_state(State::BeforeAttributeName, at);
            }
            State::AfterAttributeName => {
                if next_char.is_none_or(|c| !is_html_ws(c) && c != '=') {
                    if ctx.has_attr() {
                        self.finish_attribute(ctx, at);
                    }
                    ctx.set_state(State::BeforeAttributeName, at);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Node-boundary bookkeeping: finalize an in-flight static name and
    /// flush the trailing literal segment.
    fn at_raw_text_end(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor) {
        let end = cur.raw.len();
        if ctx.state == State::HtmlTagName && !ctx.pending_name.text.is_empty() {
            // the name ends with the node; what follows may be dynamic
            // attributes from a sibling node
            let at = cur.raw.last_point_before(end);
            if ctx.tag_name.is_none() {
                self.resolve_pending_name(ctx);
            }
            ctx.set_state(State::AfterTagNameOrAttribute, at);
        }
        self.cut_segment(ctx, cur, end);
    }

    /// Emits `seg_start..end` as a literal piece, routed by the current
    /// state, and advances the segment start.
    fn cut_segment(&mut self, ctx: &mut ParsingContext, cur: &mut Cursor, end: usize) {
        let start = cur.seg_start;
        cur.seg_start = end;
        if start >= end {
            return;
        }
        let piece = if start == 0 && end == cur.raw.len() {
            cur.node
        } else {
            let data = cur.raw.substring(start, end);
            let location = cur.raw.location_in(&self.file, start, end);
            self.alloc(SoyNodeKind::RawText(data), location)
        };
        match ctx.state {
            s if s.is_attr_value() => {
                if ctx.owns_value() {
                    ctx.value_parts.push(piece);
                } else {
                    cur.emissions.push(piece);
                }
            }
            _ => cur.emissions.push(piece),
        }
    }
}

/// Scanning position within one raw-text node.
struct Cursor {
    node: NodeId,
    raw: RawTextData,
    pos: usize,
    seg_start: usize,
    emissions: Vec<NodeId>,
}

impl Cursor {
    fn rest(&self) -> &str {
        &self.raw.text()[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn point(&self) -> Point {
        self.raw.location_of(self.pos)
    }

    /// Advances one character, keeping it in the literal segment.
    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    /// Advances one character and drops it from the literal segment.
    fn bump_structural(&mut self) {
        self.bump();
        self.seg_start = self.pos;
    }

    /// Advances `n` bytes of structural text.
    fn skip_structural(&mut self, n: usize) {
        self.pos += n;
        self.seg_start = self.pos;
    }
}

fn is_html_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\u{000C}')
}

fn is_unicode_control(c: char) -> bool {
    c.is_control()
}

/// The negated HTML identifier class: whitespace, tag punctuation, NUL,
/// quotes, and Unicode `Cc` controls end an identifier.
fn is_html_name_delimiter(c: char) -> bool {
    is_html_ws(c) || matches!(c, '>' | '=' | '/' | '\0' | '"' | '\'') || is_unicode_control(c)
}
