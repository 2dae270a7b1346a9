//! The declaration forest: what the script says the UI should be.
//!
//! Rebuilt from scratch on every evaluation pass and edited in place by
//! update directives. The reconciler compares it against the [`LiveTree`].
//!
//! [`LiveTree`]: crate::live::LiveTree

use std::collections::HashMap;

use nabu_script::ast::Span;
use serde::Serialize;

use crate::kind::WidgetKind;
use crate::prop::{PropMap, PropValue};

/// Deepest widget nesting a declaration may reach, counting the window.
pub const MAX_TREE_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclNode {
    pub kind: WidgetKind,
    pub id: String,
    pub props: PropMap,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DeclNode>,
    /// Where the widget call appeared in the script. Synthesized nodes use
    /// the default span.
    #[serde(skip)]
    pub span: Span,
}

impl DeclNode {
    pub fn new(kind: WidgetKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into(), props: PropMap::new(), children: Vec::new(), span: Span::default() }
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, child: DeclNode) -> Self {
        self.children.push(child);
        self
    }

    /// Levels in this subtree; a leaf is 1.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(DeclNode::depth).max().unwrap_or(0)
    }

    /// Pre-order traversal of this node and its descendants.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a DeclNode)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    fn find(&self, id: &str) -> Option<&DeclNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut DeclNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    fn remove_descendant(&mut self, id: &str) -> Option<DeclNode> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| c.remove_descendant(id))
    }
}

/// Top-level windows, each the root of its own declaration tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeclForest {
    pub roots: Vec<DeclNode>,
}

impl DeclForest {
    pub fn new(roots: Vec<DeclNode>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_| n += 1);
        n
    }

    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a DeclNode)) {
        for root in &self.roots {
            root.walk(f);
        }
    }

    pub fn find(&self, id: &str) -> Option<&DeclNode> {
        self.roots.iter().find_map(|r| r.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut DeclNode> {
        self.roots.iter_mut().find_map(|r| r.find_mut(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Detach the node with `id` (a root or any descendant) and return it
    /// with its subtree.
    pub fn remove(&mut self, id: &str) -> Option<DeclNode> {
        if let Some(pos) = self.roots.iter().position(|r| r.id == id) {
            return Some(self.roots.remove(pos));
        }
        self.roots.iter_mut().find_map(|r| r.remove_descendant(id))
    }

    /// The first node (in pre-order) whose id was already used by an earlier
    /// node, together with that earlier node.
    pub fn first_duplicate(&self) -> Option<(&DeclNode, &DeclNode)> {
        let mut seen: HashMap<&str, &DeclNode> = HashMap::new();
        let mut dup = None;
        self.walk(&mut |node| {
            if dup.is_some() {
                return;
            }
            if let Some(first) = seen.insert(node.id.as_str(), node) {
                dup = Some((node, first));
            }
        });
        dup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DeclForest {
        DeclForest::new(vec![
            DeclNode::new(WidgetKind::Window, "w1")
                .child(
                    DeclNode::new(WidgetKind::Row, "r1")
                        .child(DeclNode::new(WidgetKind::Button, "b1").prop("text", "A"))
                        .child(DeclNode::new(WidgetKind::Button, "b2")),
                )
                .child(DeclNode::new(WidgetKind::Text, "t1")),
            DeclNode::new(WidgetKind::Window, "w2"),
        ])
    }

    #[test]
    fn walk_is_pre_order() {
        let forest = sample();
        let mut ids = Vec::new();
        forest.walk(&mut |n| ids.push(n.id.as_str()));
        assert_eq!(ids, ["w1", "r1", "b1", "b2", "t1", "w2"]);
        assert_eq!(forest.len(), 6);
    }

    #[test]
    fn find_and_mutate() {
        let mut forest = sample();
        assert_eq!(forest.find("b1").unwrap().props["text"], PropValue::from("A"));
        forest.find_mut("b2").unwrap().props.insert("text".into(), "B".into());
        assert_eq!(forest.find("b2").unwrap().props["text"], PropValue::from("B"));
        assert!(forest.find("nope").is_none());
    }

    #[test]
    fn remove_takes_subtree() {
        let mut forest = sample();
        let row = forest.remove("r1").unwrap();
        assert_eq!(row.children.len(), 2);
        assert!(!forest.contains("b1"));
        assert_eq!(forest.len(), 3);
        assert!(forest.remove("w2").is_some());
        assert_eq!(forest.roots.len(), 1);
    }

    #[test]
    fn duplicate_ids_across_windows() {
        let mut forest = sample();
        assert!(forest.first_duplicate().is_none());
        forest.roots[1].children.push(DeclNode::new(WidgetKind::Text, "t1"));
        let (dup, first) = forest.first_duplicate().unwrap();
        assert_eq!(dup.id, "t1");
        assert!(std::ptr::eq(first, forest.find("t1").unwrap()));
    }
}
