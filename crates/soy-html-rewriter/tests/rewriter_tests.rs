//! End-to-end tests for the HTML rewrite pass.

use pretty_assertions::assert_eq;
use soy_ast::{
    ContentKind, ExprKind, ExprNode, IdGenerator, NodeId, Point, Quotes, RawTextData,
    SoyNodeKind, SoyTree, SourceLocation,
};
use soy_error::ErrorReporter;
use soy_html_rewriter::HtmlRewriter;

/// Builds a one-template tree and drives the rewriter over it.
struct Fixture {
    tree: SoyTree,
    ids: IdGenerator,
    errs: ErrorReporter,
    template: NodeId,
    cursor: Point,
}

impl Fixture {
    fn new(kind: ContentKind) -> Self {
        let mut ids = IdGenerator::new();
        let mut tree = SoyTree::new("test.soy");
        let root = tree.alloc(
            &mut ids,
            SoyNodeKind::File { children: vec![] },
            SourceLocation::unknown(),
        );
        tree.set_root(root);
        let template = tree.alloc(
            &mut ids,
            SoyNodeKind::Template { name: "ns.t".into(), content_kind: kind, children: vec![] },
            SourceLocation::point("test.soy", Point::new(1, 1)),
        );
        tree.add_children(root, [template]);
        Self { tree, ids, errs: ErrorReporter::new(), template, cursor: Point::new(2, 1) }
    }

    fn loc(&self, begin: Point, end: Point) -> SourceLocation {
        SourceLocation::new("test.soy", begin, end)
    }

    /// Appends raw text at the running cursor.
    fn raw(&mut self, parent: NodeId, text: &str) -> NodeId {
        let start = self.cursor;
        let data = RawTextData::from_source(text, start);
        let end = data.last_point_before(data.len());
        for ch in text.chars() {
            self.cursor = self.cursor.advanced_by(ch);
        }
        let location = self.loc(start, end);
        let node = self.tree.alloc(&mut self.ids, SoyNodeKind::RawText(data), location);
        self.tree.add_children(parent, [node]);
        node
    }

    /// Appends raw text carrying joined-whitespace boundaries.
    fn raw_joined(&mut self, parent: NodeId, text: &str, missing_ws: Vec<usize>) -> NodeId {
        let node = self.raw(parent, text);
        if let SoyNodeKind::RawText(data) = self.tree.kind_mut(node) {
            *data = data.clone().with_missing_whitespace(missing_ws);
        }
        node
    }

    fn var(&self, name: &str) -> ExprNode {
        ExprNode::new(
            ExprKind::VarRef { name: name.into(), injected: false },
            SourceLocation::unknown(),
        )
    }

    fn print(&mut self, parent: NodeId, name: &str) -> NodeId {
        let at = self.cursor;
        self.cursor = Point::new(self.cursor.line, self.cursor.column + 4);
        let expr = self.var(name);
        let location = self.loc(at, at);
        let node = self.tree.alloc(&mut self.ids, SoyNodeKind::Print { expr }, location);
        self.tree.add_children(parent, [node]);
        node
    }

    fn node(&mut self, parent: NodeId, kind: SoyNodeKind) -> NodeId {
        let at = self.cursor;
        let location = self.loc(at, at);
        let node = self.tree.alloc(&mut self.ids, kind, location);
        self.tree.add_children(parent, [node]);
        node
    }

    /// An `{if}` with one condition branch and an optional else branch.
    fn if_node(&mut self, parent: NodeId) -> (NodeId, NodeId) {
        let expr = self.var("c");
        let if_id = self.node(parent, SoyNodeKind::If { children: vec![] });
        let cond = self.tree.alloc(
            &mut self.ids,
            SoyNodeKind::IfCond { expr, children: vec![] },
            self.tree.location(if_id).clone(),
        );
        self.tree.add_children(if_id, [cond]);
        (if_id, cond)
    }

    fn else_branch(&mut self, if_id: NodeId) -> NodeId {
        let branch = self.tree.alloc(
            &mut self.ids,
            SoyNodeKind::IfElse { children: vec![] },
            self.tree.location(if_id).clone(),
        );
        self.tree.add_children(if_id, [branch]);
        branch
    }

    fn run_strict(&mut self) {
        let features = vec!["stricthtml".to_string()];
        HtmlRewriter::new(&features, &mut self.errs).run(&mut self.tree, &mut self.ids);
    }

    fn run_dry(&mut self) {
        HtmlRewriter::new(&[], &mut self.errs).run(&mut self.tree, &mut self.ids);
    }

    fn codes(&self) -> Vec<&'static str> {
        self.errs.reports().iter().map(|e| e.code()).collect()
    }

    fn raw_text(&self, node: NodeId) -> &str {
        match self.tree.kind(node) {
            SoyNodeKind::RawText(data) => data.text(),
            other => panic!("expected raw text, got {other:?}"),
        }
    }
}

#[test]
fn minimal_tag_with_quoted_attribute() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=\"x\">hi</a>");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 3, "open tag, text, close tag: {children:?}");

    let SoyNodeKind::HtmlOpenTag { tag_name, self_closing: false, children: tag_kids } =
        fx.tree.kind(children[0])
    else {
        panic!("expected an open tag, got {:?}", fx.tree.kind(children[0]));
    };
    assert_eq!(fx.tree.static_tag_name(*tag_name), Some("a"));
    // the name node plus one attribute
    assert_eq!(tag_kids.len(), 2);
    let attr = tag_kids[1];
    let SoyNodeKind::HtmlAttribute { eq_location: Some(_), children: attr_kids } =
        fx.tree.kind(attr)
    else {
        panic!("expected an attribute with =, got {:?}", fx.tree.kind(attr));
    };
    assert_eq!(fx.raw_text(attr_kids[0]), "href");
    let SoyNodeKind::HtmlAttributeValue { quotes: Quotes::Double, children: parts } =
        fx.tree.kind(attr_kids[1])
    else {
        panic!("expected a double-quoted value, got {:?}", fx.tree.kind(attr_kids[1]));
    };
    assert_eq!(fx.raw_text(parts[0]), "x");

    assert_eq!(fx.raw_text(children[1]), "hi");
    assert!(matches!(fx.tree.kind(children[2]), SoyNodeKind::HtmlCloseTag { .. }));
}

#[test]
fn conditional_attribute_value_reconciles() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=");
    let (if_id, cond) = fx.if_node(template);
    fx.raw(cond, "\"x\"");
    let else_id = fx.else_branch(if_id);
    fx.raw(else_id, "\"y\"");
    fx.raw(template, ">");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 1);
    let SoyNodeKind::HtmlOpenTag { children: tag_kids, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag, got {:?}", fx.tree.kind(children[0]));
    };
    let attr = tag_kids[1];
    let SoyNodeKind::HtmlAttribute { children: attr_kids, .. } = fx.tree.kind(attr) else {
        panic!("expected attribute, got {:?}", fx.tree.kind(attr));
    };
    // the {if} itself is the attribute value
    assert_eq!(attr_kids[1], if_id);
    // each branch holds a quoted value node
    for branch in fx.tree.children(if_id).to_vec() {
        let kids = fx.tree.children(branch).to_vec();
        assert_eq!(kids.len(), 1);
        assert!(matches!(
            fx.tree.kind(kids[0]),
            SoyNodeKind::HtmlAttributeValue { quotes: Quotes::Double, .. }
        ));
    }
}

#[test]
fn tag_begun_in_branch_reports_at_the_close_angle() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let (_, cond) = fx.if_node(template);
    fx.raw(cond, "<a");
    let gt = fx.cursor;
    fx.raw(template, ">");
    fx.run_strict();

    assert_eq!(fx.codes(), ["FOUND_END_TAG_STARTED_IN_ANOTHER_BLOCK"]);
    assert_eq!(fx.errs.reports()[0].location.begin, gt);
    // the template was not rewritten
    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 2);
    assert!(matches!(fx.tree.kind(children[0]), SoyNodeKind::If { .. }));
}

#[test]
fn rewriting_is_idempotent() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<div class=wide>text<br/></div>");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let after_first = fx.tree.clone();
    fx.errs = ErrorReporter::new();
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    assert_eq!(fx.tree, after_first);
}

#[test]
fn dry_run_reports_but_does_not_mutate() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=\"x\">hi</a>");
    let before = fx.tree.clone();
    fx.run_dry();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    assert_eq!(fx.tree, before);

    // diagnostics still flow in dry-run mode
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let (_, cond) = fx.if_node(template);
    fx.raw(cond, "<a");
    fx.raw(template, ">");
    let before = fx.tree.clone();
    fx.run_dry();
    assert_eq!(fx.codes(), ["FOUND_END_TAG_STARTED_IN_ANOTHER_BLOCK"]);
    assert_eq!(fx.tree, before);
}

#[test]
fn attributes_template_collects_attributes() {
    let mut fx = Fixture::new(ContentKind::Attributes);
    let template = fx.template;
    fx.raw(template, "class=\"x\" id=y");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 2);
    for &attr in &children {
        assert!(matches!(fx.tree.kind(attr), SoyNodeKind::HtmlAttribute { .. }));
    }
    let SoyNodeKind::HtmlAttribute { children: kids, .. } = fx.tree.kind(children[1]) else {
        unreachable!();
    };
    assert_eq!(fx.raw_text(kids[0]), "id");
    assert!(matches!(
        fx.tree.kind(kids[1]),
        SoyNodeKind::HtmlAttributeValue { quotes: Quotes::None, .. }
    ));
}

#[test]
fn script_content_is_rcdata() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<script>if (a < b) go()</script>x");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 4);
    assert!(matches!(fx.tree.kind(children[0]), SoyNodeKind::HtmlOpenTag { .. }));
    assert_eq!(fx.raw_text(children[1]), "if (a < b) go()");
    assert!(matches!(fx.tree.kind(children[2]), SoyNodeKind::HtmlCloseTag { .. }));
    assert_eq!(fx.raw_text(children[3]), "x");
}

#[test]
fn comments_stay_literal() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let raw = fx.raw(template, "a<!-- <div> is not a tag -->b");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    assert_eq!(fx.tree.children(template), &[raw]);
}

#[test]
fn self_closing_tag() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<br/>");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    let children = fx.tree.children(template).to_vec();
    assert!(matches!(
        fx.tree.kind(children[0]),
        SoyNodeKind::HtmlOpenTag { self_closing: true, .. }
    ));
}

#[test]
fn whitespace_after_open_angle_is_an_error() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "a < b");
    fx.run_strict();
    assert_eq!(fx.codes(), ["UNEXPECTED_WS_AFTER_LT"]);
}

#[test]
fn closing_quote_from_another_block_is_an_error() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=\"x");
    let (if_id, cond) = fx.if_node(template);
    fx.raw(cond, "\"");
    let else_id = fx.else_branch(if_id);
    fx.raw(else_id, "y\"");
    fx.raw(template, ">");
    fx.run_strict();
    assert!(fx.codes().contains(&"FOUND_END_OF_ATTRIBUTE_STARTED_IN_ANOTHER_BLOCK"));
}

#[test]
fn equals_for_an_attribute_from_another_block_is_an_error() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a x");
    let (_, cond) = fx.if_node(template);
    fx.raw(cond, "=1");
    fx.raw(template, ">");
    fx.run_strict();
    assert!(fx.codes().contains(&"FOUND_EQ_WITH_ATTRIBUTE_IN_ANOTHER_BLOCK"));
}

#[test]
fn nonprintable_inside_a_tag_is_rejected() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a ");
    let expr = fx.var("v");
    fx.node(template, SoyNodeKind::LetValue { var: "x".into(), expr });
    fx.raw(template, ">");
    fx.run_strict();
    assert!(fx.codes().contains(&"INVALID_LOCATION_FOR_NONPRINTABLE"));
}

#[test]
fn control_flow_in_a_tag_name_is_rejected() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<");
    let (_, cond) = fx.if_node(template);
    fx.raw(cond, "a");
    fx.raw(template, ">");
    fx.run_strict();
    assert!(fx.codes().contains(&"INVALID_LOCATION_FOR_CONTROL_FLOW"));
}

#[test]
fn irreconcilable_branches_report_block_changes_context() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let (if_id, cond) = fx.if_node(template);
    fx.raw(cond, "<a ");
    let else_id = fx.else_branch(if_id);
    fx.raw(else_id, "text");
    fx.run_strict();
    assert_eq!(fx.codes(), ["BLOCK_CHANGES_CONTEXT"]);
}

#[test]
fn block_may_not_end_expecting_a_value() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=");
    fx.run_strict();
    assert_eq!(fx.codes(), ["BLOCK_ENDS_IN_INVALID_STATE"]);
}

#[test]
fn dynamic_attribute_value() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=");
    let print = fx.print(template, "url");
    fx.raw(template, ">");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    let SoyNodeKind::HtmlOpenTag { children: tag_kids, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag");
    };
    let SoyNodeKind::HtmlAttribute { children: attr_kids, .. } = fx.tree.kind(tag_kids[1]) else {
        panic!("expected attribute");
    };
    assert_eq!(attr_kids[1], print);
}

#[test]
fn dynamic_attributes_become_tag_children() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<div ");
    let print = fx.print(template, "attrs");
    fx.raw(template, ">");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 1);
    let SoyNodeKind::HtmlOpenTag { children: tag_kids, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag");
    };
    assert!(tag_kids.contains(&print));
    assert_eq!(fx.tree.parent(print), Some(children[0]));
}

#[test]
fn unguaranteed_conditional_value_warns_but_rewrites() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a href=");
    let (_, cond) = fx.if_node(template);
    fx.raw(cond, "\"x\"");
    fx.raw(template, ">");
    fx.run_strict();

    assert_eq!(
        fx.codes(),
        ["CONDITIONAL_BLOCK_ISNT_GUARANTEED_TO_PRODUCE_ONE_ATTRIBUTE_VALUE"]
    );
    // a warning does not stop the rewrite
    let children = fx.tree.children(template).to_vec();
    assert!(matches!(fx.tree.kind(children[0]), SoyNodeKind::HtmlOpenTag { .. }));
}

#[test]
fn joined_whitespace_separates_unquoted_values() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let text = "<a x=1";
    fx.raw_joined(template, text, vec![text.len()]);
    fx.raw(template, "y=2>");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    let SoyNodeKind::HtmlOpenTag { children: tag_kids, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag");
    };
    // name + two separate attributes
    assert_eq!(tag_kids.len(), 3);
    for &attr in &tag_kids[1..] {
        assert!(matches!(fx.tree.kind(attr), SoyNodeKind::HtmlAttribute { .. }));
    }
}

#[test]
fn conditional_tag_children_are_promoted() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<div ");
    let (if_id, cond) = fx.if_node(template);
    fx.raw(cond, "class=\"a\"");
    let else_id = fx.else_branch(if_id);
    fx.raw(else_id, "id=\"b\"");
    fx.raw(template, ">ok");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    assert_eq!(children.len(), 2);
    let SoyNodeKind::HtmlOpenTag { children: tag_kids, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag");
    };
    // the whole {if} moved inside the tag
    assert!(tag_kids.contains(&if_id));
    // and each branch holds a complete attribute
    for branch in fx.tree.children(if_id).to_vec() {
        let kids = fx.tree.children(branch).to_vec();
        assert_eq!(kids.len(), 1);
        assert!(matches!(fx.tree.kind(kids[0]), SoyNodeKind::HtmlAttribute { .. }));
    }
}

#[test]
fn text_kind_is_untouched() {
    let mut fx = Fixture::new(ContentKind::Text);
    let template = fx.template;
    let raw = fx.raw(template, "<not a=tag>");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    assert_eq!(fx.tree.children(template), &[raw]);
}

#[test]
fn cdata_and_xml_declarations_stay_literal() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    let raw = fx.raw(template, "<!doctype html><![CDATA[ <x> ]]>done");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());
    assert_eq!(fx.tree.children(template), &[raw]);
}

#[test]
fn close_tag_with_attributes_is_an_error() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "</a b=1>");
    fx.run_strict();
    assert!(fx.codes().contains(&"UNEXPECTED_CLOSE_TAG_CONTENT"));
}

#[test]
fn self_closing_close_tag_is_an_error() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "</a/>");
    fx.run_strict();
    assert!(fx.codes().contains(&"SELF_CLOSING_CLOSE_TAG"));
}

#[test]
fn illegal_unquoted_value_character() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<a x=a'b>");
    fx.run_strict();
    assert!(fx.codes().contains(&"ILLEGAL_HTML_ATTRIBUTE_CHARACTER"));
}

#[test]
fn dynamic_tag_name() {
    let mut fx = Fixture::new(ContentKind::Html);
    let template = fx.template;
    fx.raw(template, "<");
    let print = fx.print(template, "tag");
    fx.raw(template, ">x");
    fx.run_strict();
    assert_eq!(fx.codes(), Vec::<&str>::new());

    let children = fx.tree.children(template).to_vec();
    let SoyNodeKind::HtmlOpenTag { tag_name, .. } = fx.tree.kind(children[0]) else {
        panic!("expected open tag, got {:?}", fx.tree.kind(children[0]));
    };
    assert_eq!(tag_name.node, print);
    assert_eq!(fx.tree.static_tag_name(*tag_name), None);
}
