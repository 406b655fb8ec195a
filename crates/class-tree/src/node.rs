//! TreeNode - one entry of a classification hierarchy
//!
//! Nodes own their children in input order. The synthetic root sits at
//! level 0 and has no source row; every other node keeps a copy of the row
//! it was built from so table cells can read leaf payload (unit, note, ...).

use serde::{Deserialize, Serialize};

use crate::row::{HierarchyRow, RowId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: RowId,

    /// 0 for the synthetic root, 1-4 for classification rows
    pub level: u8,

    /// Code of the node's own level
    pub code: String,

    /// Display name of the node's own level
    pub name: String,

    /// Child nodes, in the order their rows were received
    pub children: Vec<TreeNode>,

    /// Source row (None only for the synthetic root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<HierarchyRow>,
}

impl TreeNode {
    /// Create the synthetic root
    pub fn root() -> Self {
        Self {
            id: RowId::root(),
            level: 0,
            code: String::new(),
            name: String::new(),
            children: Vec::new(),
            row: None,
        }
    }

    /// Create a childless node from a source row
    pub fn from_row(row: &HierarchyRow) -> Self {
        Self {
            id: row.id.clone(),
            level: row.level(),
            code: row.current_code().to_string(),
            name: row.current_name().to_string(),
            children: Vec::new(),
            row: Some(row.clone()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.level == 0 && self.row.is_none()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Add a child node
    pub fn add_child(&mut self, child: TreeNode) {
        self.children.push(child);
    }

    /// Total descendants (self excluded)
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count - 1
    }

    /// Collect all node IDs in subtree (including self), pre-order
    pub fn all_ids(&self) -> Vec<RowId> {
        let mut ids = Vec::new();
        self.walk(&mut |n| ids.push(n.id.clone()));
        ids
    }

    /// Find a node by ID
    pub fn find(&self, id: &RowId) -> Option<&TreeNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if &node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Find a node by ID (mutable)
    pub fn find_mut(&mut self, id: &RowId) -> Option<&mut TreeNode> {
        let steps = self.child_steps(id)?;
        let mut node = self;
        for pos in steps {
            node = node.children.get_mut(pos)?;
        }
        Some(node)
    }

    /// Child positions leading from this node down to `id`
    fn child_steps(&self, id: &RowId) -> Option<Vec<usize>> {
        let mut steps = Vec::new();
        let mut stack = vec![(self, 0usize, 0usize)];
        while let Some((node, depth, pos)) = stack.pop() {
            if depth > 0 {
                steps.truncate(depth - 1);
                steps.push(pos);
            }
            if &node.id == id {
                return Some(steps);
            }
            stack.extend(
                node.children
                    .iter()
                    .enumerate()
                    .rev()
                    .map(|(i, c)| (c, depth + 1, i)),
            );
        }
        None
    }

    /// Get path from this node to `id`, both ends included
    pub fn path_to(&self, id: &RowId) -> Option<Vec<RowId>> {
        let mut path: Vec<&RowId> = Vec::new();
        let mut stack = vec![(self, 0usize)];
        while let Some((node, depth)) = stack.pop() {
            path.truncate(depth);
            path.push(&node.id);
            if &node.id == id {
                return Some(path.into_iter().cloned().collect());
            }
            stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        }
        None
    }

    /// Pre-order walk over the subtree, self included
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TreeNode)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Count nodes of a given level in the subtree
    pub fn count_at_level(&self, level: u8) -> usize {
        let mut count = 0;
        self.walk(&mut |n| {
            if n.level == level && !n.is_root() {
                count += 1;
            }
        });
        count
    }
}
