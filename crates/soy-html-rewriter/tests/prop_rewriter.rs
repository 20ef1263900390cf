//! Property tests: the rewriter terminates, never panics, and is
//! deterministic and idempotent over arbitrary markup-shaped text.

use proptest::prelude::*;
use soy_ast::{ContentKind, IdGenerator, Point, RawTextData, SoyNodeKind, SoyTree, SourceLocation};
use soy_error::ErrorReporter;
use soy_html_rewriter::HtmlRewriter;

fn build(text: &str, kind: ContentKind) -> (SoyTree, IdGenerator) {
    let mut ids = IdGenerator::new();
    let mut tree = SoyTree::new("prop.soy");
    let root = tree.alloc(&mut ids, SoyNodeKind::File { children: vec![] }, SourceLocation::unknown());
    tree.set_root(root);
    let template = tree.alloc(
        &mut ids,
        SoyNodeKind::Template { name: "ns.t".into(), content_kind: kind, children: vec![] },
        SourceLocation::point("prop.soy", Point::new(1, 1)),
    );
    tree.add_children(root, [template]);
    if !text.is_empty() {
        let data = RawTextData::from_source(text, Point::new(2, 1));
        let end = data.last_point_before(data.len());
        let location = SourceLocation::new("prop.soy", Point::new(2, 1), end);
        let raw = tree.alloc(&mut ids, SoyNodeKind::RawText(data), location);
        tree.add_children(template, [raw]);
    }
    (tree, ids)
}

fn run(tree: &mut SoyTree, ids: &mut IdGenerator) -> Vec<String> {
    let mut errs = ErrorReporter::new();
    let features = vec!["stricthtml".to_string()];
    HtmlRewriter::new(&features, &mut errs).run(tree, ids);
    errs.reports().iter().map(|e| e.code().to_string()).collect()
}

proptest! {
    /// One pass terminates without panicking, and a second pass over the
    /// first pass's output changes nothing.
    #[test]
    fn rewriting_terminates_and_is_idempotent(
        text in "[a-z<>=/\"'` \\t!?\\-\\[\\]]{0,48}",
        kind in prop_oneof![Just(ContentKind::Html), Just(ContentKind::Attributes)],
    ) {
        let (mut tree, mut ids) = build(&text, kind);
        let first_codes = run(&mut tree, &mut ids);
        let after_first = tree.clone();

        let second_codes = run(&mut tree, &mut ids);
        prop_assert_eq!(&tree, &after_first, "second pass must be a no-op");
        prop_assert_eq!(second_codes.is_empty(), first_codes.is_empty(),
            "a clean first pass must stay clean");
    }

    /// The pass is deterministic: equal inputs give equal trees and equal
    /// diagnostics.
    #[test]
    fn rewriting_is_deterministic(text in "[a-z<>=/\"' ]{0,40}") {
        let (mut tree_a, mut ids_a) = build(&text, ContentKind::Html);
        let (mut tree_b, mut ids_b) = build(&text, ContentKind::Html);
        let codes_a = run(&mut tree_a, &mut ids_a);
        let codes_b = run(&mut tree_b, &mut ids_b);
        prop_assert_eq!(codes_a, codes_b);
        prop_assert_eq!(tree_a, tree_b);
    }
}
