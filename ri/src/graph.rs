//! Operator graph reconstruction
//!
//! Builds a forest of stages from `StageCreated` events using their parent
//! references. The raw graph is kept intact here; noise collapsing is a
//! rendering concern (see `render::tree`).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::events::{Event, StageId};

/// One stage in the reconstructed graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageNode {
    pub id: StageId,
    pub label: String,
    /// Parent as recorded in the creation event
    pub declared_parent: Option<StageId>,
    /// Parent actually linked; `None` when the declared one is missing or would
    /// close a cycle
    pub parent_id: Option<StageId>,
    /// Child ids, ascending
    pub children: Vec<StageId>,
}

/// A forest of stage nodes with deterministic iteration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    nodes: BTreeMap<StageId, StageNode>,
    roots: Vec<StageId>,
}

impl Forest {
    /// Root ids, ascending
    pub fn roots(&self) -> &[StageId] {
        &self.roots
    }

    pub fn get(&self, id: StageId) -> Option<&StageNode> {
        self.nodes.get(&id)
    }

    /// All nodes, ascending by id
    pub fn nodes(&self) -> impl Iterator<Item = &StageNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Label of a stage, if it was created in this event set
    pub fn label(&self, id: StageId) -> Option<&str> {
        self.nodes.get(&id).map(|n| n.label.as_str())
    }

    /// Ancestors from the direct parent up to the root
    pub fn ancestors(&self, id: StageId) -> Vec<StageId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent_id);
        }
        out
    }

    /// Pre-order walk: `(depth, id)` for every node, roots and children ascending
    pub fn walk(&self) -> Vec<(usize, StageId)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(usize, StageId)> = self.roots.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            out.push((depth, id));
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().map(|c| (depth + 1, *c)));
            }
        }
        out
    }

    /// Does linking `child -> parent` close a cycle through links made so far?
    fn would_cycle(&self, child: StageId, parent: StageId) -> bool {
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent_id);
        }
        false
    }
}

/// Reconstruct the stage forest from a run's events
///
/// Only `StageCreated` events contribute; the first creation event for an id
/// wins. A parent id never seen as a creation event makes the node a root.
pub fn build_graph(events: &[Event]) -> Forest {
    debug!(events = events.len(), "build_graph: called");
    let mut forest = Forest::default();

    for event in events {
        if let Event::StageCreated {
            stage_id,
            label,
            parent_id,
            ..
        } = event
        {
            forest.nodes.entry(*stage_id).or_insert_with(|| StageNode {
                id: *stage_id,
                label: label.clone(),
                declared_parent: *parent_id,
                parent_id: None,
                children: Vec::new(),
            });
        }
    }

    let ids: Vec<StageId> = forest.nodes.keys().copied().collect();
    for id in &ids {
        let declared = forest.nodes.get(id).and_then(|n| n.declared_parent);
        let linked = match declared {
            Some(parent) if !forest.nodes.contains_key(&parent) => {
                debug!(stage_id = id, parent, "build_graph: parent not in event set, treating as root");
                None
            }
            Some(parent) if forest.would_cycle(*id, parent) => {
                warn!(stage_id = id, parent, "build_graph: parent link would form a cycle, treating as root");
                None
            }
            other => other,
        };
        if let Some(node) = forest.nodes.get_mut(id) {
            node.parent_id = linked;
        }
    }

    for id in ids {
        match forest.nodes.get(&id).and_then(|n| n.parent_id) {
            Some(parent) => {
                if let Some(parent_node) = forest.nodes.get_mut(&parent) {
                    parent_node.children.push(id);
                }
            }
            None => forest.roots.push(id),
        }
    }

    debug!(nodes = forest.nodes.len(), roots = forest.roots.len(), "build_graph: done");
    forest
}
