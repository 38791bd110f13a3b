//! Operator tree view
//!
//! Projects a [`Forest`] into indented lines. Stages with a generic label and
//! exactly one child are elided and their child takes their place, so chains of
//! anonymous wrappers collapse to the stage that actually carries a name.

use std::fmt;

use tracing::debug;

use crate::config::RenderConfig;
use crate::events::StageId;
use crate::graph::Forest;

/// Shown when the forest has no stages
pub const NO_STAGES: &str = "(no stages)";

/// One visible tree row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub depth: usize,
    pub stage_id: StageId,
    pub label: String,
}

impl fmt::Display for TreeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} #{}", "  ".repeat(self.depth), self.label, self.stage_id)
    }
}

/// Visible rows in pre-order, with noise stages collapsed
pub fn tree_lines(forest: &Forest, config: &RenderConfig) -> Vec<TreeLine> {
    debug!(stages = forest.len(), "tree_lines: called");
    let mut lines = Vec::new();
    let mut stack: Vec<(usize, StageId)> = forest.roots().iter().rev().map(|id| (0, *id)).collect();

    while let Some((depth, id)) = stack.pop() {
        let Some(node) = forest.get(id) else {
            continue;
        };

        if let [only_child] = node.children.as_slice()
            && config.is_generic(&node.label)
        {
            stack.push((depth, *only_child));
            continue;
        }

        lines.push(TreeLine {
            depth,
            stage_id: id,
            label: node.label.clone(),
        });
        stack.extend(node.children.iter().rev().map(|c| (depth + 1, *c)));
    }

    lines
}

/// Render the tree as text lines; an empty forest gives a placeholder line
pub fn render_tree(forest: &Forest, config: &RenderConfig) -> Vec<String> {
    let lines = tree_lines(forest, config);
    if lines.is_empty() {
        return vec![NO_STAGES.to_string()];
    }
    lines.iter().map(TreeLine::to_string).collect()
}
