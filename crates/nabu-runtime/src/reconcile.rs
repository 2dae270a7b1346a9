//! Entity reconciler: diff the declaration forest against the live tree and
//! emit the commands that bring the live tree in line.
//!
//! Identity is `(id, parent id)`: an entity survives when the declaration has
//! its id under the same parent and the parent itself survived. Survivors
//! receive a shallow property diff; everything else is destroyed (one
//! `Destroy` per removed subtree) or created (one `Create` per new node, in
//! pre-order, parents first).
//!
//! Command order within one pass: all `Destroy`s, then a pre-order walk of the
//! declaration emitting `Create` / `UpdateProperties`, with a `Reorder` after a
//! parent's children whenever the resulting order differs from the
//! declaration.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::decl::{DeclForest, DeclNode};
use crate::error::ReconcileError;
use crate::kind::WidgetKind;
use crate::live::LiveTree;
use crate::prop::{self, PropMap};

/// The payload of a `Create`: a single node, without children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeSpec {
    pub kind: WidgetKind,
    pub id: String,
    pub props: PropMap,
}

impl NodeSpec {
    fn of(node: &DeclNode) -> Self {
        Self { kind: node.kind, id: node.id.clone(), props: node.props.clone() }
    }
}

/// A change to apply to the live tree and forward to the renderer.
///
/// `parent: None` addresses the top level (the list of windows).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Append a new entity as the last child of `parent`.
    Create { parent: Option<String>, node: NodeSpec },
    /// Set the listed properties; properties not listed keep their value.
    UpdateProperties { id: String, changed: PropMap },
    /// Reorder the children of `parent`. `order` lists every child.
    Reorder { parent: Option<String>, order: Vec<String> },
    /// Remove an entity together with its whole subtree.
    Destroy { id: String },
}

struct DeclEntry<'a> {
    parent: Option<&'a str>,
    kind: WidgetKind,
}

/// Compute the commands that turn `live` into `decl`.
///
/// Pure: neither input is modified. Declaration ids must be unique.
pub fn reconcile(live: &LiveTree, decl: &DeclForest) -> Result<Vec<Command>, ReconcileError> {
    let mut index: HashMap<&str, DeclEntry<'_>> = HashMap::new();
    for root in &decl.roots {
        index_node(root, None, &mut index);
    }

    let mut commands = Vec::new();

    // Phase A: decide survivors top-down over the live tree.
    let mut survivors: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, Option<&str>)> = live.roots().iter().rev().map(|id| (id.as_str(), None)).collect();
    while let Some((id, parent)) = stack.pop() {
        let Some(entity) = live.get(id) else { continue };
        match index.get(id) {
            Some(entry) if entry.parent == parent => {
                if entry.kind != entity.kind {
                    return Err(ReconcileError::KindMismatch {
                        id: id.to_string(),
                        live: entity.kind,
                        declared: entry.kind,
                    });
                }
                survivors.insert(id);
                stack.extend(entity.children.iter().rev().map(|c| (c.as_str(), Some(id))));
            }
            _ => commands.push(Command::Destroy { id: id.to_string() }),
        }
    }

    // Phase B: create / update top-down over the declaration.
    let live_roots: Vec<&str> = live.roots().iter().map(String::as_str).collect();
    emit_children(live, &survivors, None, &live_roots, &decl.roots, &mut commands);

    Ok(commands)
}

fn index_node<'a>(node: &'a DeclNode, parent: Option<&'a str>, index: &mut HashMap<&'a str, DeclEntry<'a>>) {
    index.insert(&node.id, DeclEntry { parent, kind: node.kind });
    for child in &node.children {
        index_node(child, Some(node.id.as_str()), index);
    }
}

fn emit_children(
    live: &LiveTree,
    survivors: &HashSet<&str>,
    parent: Option<&str>,
    live_children: &[&str],
    decl_children: &[DeclNode],
    commands: &mut Vec<Command>,
) {
    // Child order once this pass is applied: surviving children keep their
    // place, new ones are appended in declaration order.
    let mut resulting: Vec<&str> = live_children.iter().copied().filter(|id| survivors.contains(id)).collect();

    for node in decl_children {
        match live.get(&node.id).filter(|_| survivors.contains(node.id.as_str())) {
            Some(entity) => {
                let changed = prop::diff(&entity.props, &node.props);
                if !changed.is_empty() {
                    commands.push(Command::UpdateProperties { id: node.id.clone(), changed });
                }
                let grandchildren: Vec<&str> = entity.children.iter().map(String::as_str).collect();
                emit_children(live, survivors, Some(node.id.as_str()), &grandchildren, &node.children, commands);
            }
            None => {
                commands.push(Command::Create { parent: parent.map(str::to_string), node: NodeSpec::of(node) });
                resulting.push(node.id.as_str());
                emit_children(live, survivors, Some(node.id.as_str()), &[], &node.children, commands);
            }
        }
    }

    let declared: Vec<&str> = decl_children.iter().map(|n| n.id.as_str()).collect();
    if resulting != declared {
        commands.push(Command::Reorder {
            parent: parent.map(str::to_string),
            order: declared.iter().map(|id| id.to_string()).collect(),
        });
    }
}
