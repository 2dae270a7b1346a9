use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::kind::WidgetKind;
use crate::prop::PropMap;
use crate::reconcile::Command;

/// Opaque engine handle of a live entity. Never reused within a tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(u64);

impl Handle {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One instantiated widget.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveEntity {
    pub handle: Handle,
    pub kind: WidgetKind,
    /// Back-reference to the declaration id.
    pub id: String,
    pub parent: Option<String>,
    pub children: Vec<String>,
    /// Every property applied so far, merged.
    pub props: PropMap,
}

/// The forest of instantiated widgets, indexed by id.
///
/// Persists across reloads. Only [`apply`](LiveTree::apply) changes it, one
/// reconciler command at a time.
#[derive(Debug, Default)]
pub struct LiveTree {
    entities: HashMap<String, LiveEntity>,
    roots: Vec<String>,
    next_handle: u64,
}

impl LiveTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LiveEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Ids of the top-level entities, in order.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Apply one command. Commands naming unknown entities are logged and
    /// ignored; the reconciler never produces them.
    pub fn apply(&mut self, cmd: &Command) {
        match cmd {
            Command::Create { parent, node } => {
                match parent {
                    Some(p) => match self.entities.get_mut(p) {
                        Some(parent) => parent.children.push(node.id.clone()),
                        None => {
                            log::warn!("create `{}`: unknown parent `{p}`", node.id);
                            return;
                        }
                    },
                    None => self.roots.push(node.id.clone()),
                }
                let handle = Handle(self.next_handle);
                self.next_handle += 1;
                self.entities.insert(
                    node.id.clone(),
                    LiveEntity {
                        handle,
                        kind: node.kind,
                        id: node.id.clone(),
                        parent: parent.clone(),
                        children: Vec::new(),
                        props: node.props.clone(),
                    },
                );
            }
            Command::UpdateProperties { id, changed } => match self.entities.get_mut(id) {
                Some(entity) => {
                    for (k, v) in changed {
                        entity.props.insert(k.clone(), v.clone());
                    }
                }
                None => log::warn!("update: unknown entity `{id}`"),
            },
            Command::Reorder { parent, order } => {
                let children = match parent {
                    Some(p) => match self.entities.get_mut(p) {
                        Some(entity) => &mut entity.children,
                        None => {
                            log::warn!("reorder: unknown parent `{p}`");
                            return;
                        }
                    },
                    None => &mut self.roots,
                };
                *children = order.clone();
            }
            Command::Destroy { id } => {
                let Some(entity) = self.entities.get(id) else {
                    log::warn!("destroy: unknown entity `{id}`");
                    return;
                };
                let siblings = match entity.parent.clone() {
                    Some(p) => self.entities.get_mut(&p).map(|e| &mut e.children),
                    None => Some(&mut self.roots),
                };
                if let Some(siblings) = siblings {
                    siblings.retain(|c| c != id);
                }
                self.remove_subtree(id);
            }
        }
    }

    fn remove_subtree(&mut self, id: &str) {
        let mut stack = vec![id.to_string()];
        while let Some(id) = stack.pop() {
            if let Some(entity) = self.entities.remove(&id) {
                stack.extend(entity.children);
            }
        }
    }

    /// Ids in pre-order, roots first.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.entities.len());
        let mut stack: Vec<&str> = self.roots.iter().rev().map(String::as_str).collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(entity) = self.entities.get(id) {
                stack.extend(entity.children.iter().rev().map(String::as_str));
            }
        }
        out
    }
}
