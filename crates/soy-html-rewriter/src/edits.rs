//! The deferred-edit buffer.
//!
//! The rewriter never mutates attached nodes mid-traversal; it records the
//! intended surgery here and [`apply`](EditBuffer::apply)s it at the end of
//! each template, or throws it away when the template produced errors.
//! Removes resolve before additions, so a node may appear in its own
//! replacement list (a no-op replace) and moved nodes are detached from
//! their old parents before the new parents claim them.

use rustc_hash::FxHashMap;
use soy_ast::{NodeId, SoyTree};

/// Pending AST surgery for one template.
#[derive(Debug, Default)]
pub struct EditBuffer {
    /// Old node → list spliced in at its index (empty list = plain remove).
    replacements: Vec<(NodeId, Vec<NodeId>)>,
    /// Children appended per parent, in recording order.
    additions: Vec<(NodeId, Vec<NodeId>)>,
    /// Index into `additions` per parent, so repeated adds stay merged.
    addition_index: FxHashMap<NodeId, usize>,
}

impl EditBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty() && self.additions.is_empty()
    }

    /// Marks `node` for unlinking from its parent.
    pub fn remove(&mut self, node: NodeId) {
        self.replace(node, Vec::new());
    }

    /// Marks `old` for unlinking, with `new_list` spliced in at its index.
    pub fn replace(&mut self, old: NodeId, new_list: Vec<NodeId>) {
        self.replacements.push((old, new_list));
    }

    /// Appends `children` under `parent` after all removes have resolved.
    pub fn add_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        if children.is_empty() {
            return;
        }
        match self.addition_index.get(&parent) {
            Some(&i) => self.additions[i].1.extend(children),
            None => {
                self.addition_index.insert(parent, self.additions.len());
                self.additions.push((parent, children));
            }
        }
    }

    /// Drops everything recorded so far.
    pub fn clear(&mut self) {
        self.replacements.clear();
        self.additions.clear();
        self.addition_index.clear();
    }

    /// Executes the buffer: removes (with splices) first, then additions.
    pub fn apply(&mut self, tree: &mut SoyTree) {
        tracing::debug!(
            replacements = self.replacements.len(),
            additions = self.additions.len(),
            "applying html rewrite edits"
        );
        for (old, new_list) in self.replacements.drain(..) {
            let Some(parent) = tree.parent(old) else {
                // already detached by an earlier replacement
                continue;
            };
            let Some(index) = tree.remove_child(parent, old) else {
                continue;
            };
            tree.insert_children(parent, index, new_list);
        }
        for (parent, children) in self.additions.drain(..) {
            tree.add_children(parent, children);
        }
        self.addition_index.clear();
    }
}
