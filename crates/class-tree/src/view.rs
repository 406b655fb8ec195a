//! Expand/collapse state of a hierarchy table and the visible row sequence.
//!
//! The view only remembers which node ids are open. Whether a row is shown
//! is derived on every render: a node is visible iff all of its ancestors
//! below the synthetic root are open. Closing a branch therefore hides its
//! descendants without forgetting their own open state, and re-opening the
//! branch restores the previous expansion.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::node::TreeNode;
use crate::row::RowId;

/// Levels that are branches even when they currently have no children.
pub const DEFAULT_BRANCH_LEVELS: RangeInclusive<u8> = 1..=3;

/// What `collapse_all` leaves open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollapseMode {
    /// Close everything; only top-level rows remain visible.
    #[default]
    Empty,
    /// Close everything, then re-open level-1 branches.
    KeepTopLevel,
}

/// One row of rendered output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisibleRow<'a> {
    pub node: &'a TreeNode,
    /// Number of ancestors below the synthetic root (top level = 0)
    pub depth: usize,
    /// Id of the parent row; None for top-level rows
    pub parent: Option<&'a RowId>,
    pub has_children: bool,
    pub expanded: bool,
}

/// Open-set state for one rendered tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeView {
    open: HashSet<RowId>,
    branch_levels: RangeInclusive<u8>,
}

impl Default for TreeView {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeView {
    /// Empty open set with the default branch levels (1-3)
    pub fn new() -> Self {
        Self {
            open: HashSet::new(),
            branch_levels: DEFAULT_BRANCH_LEVELS,
        }
    }

    pub fn with_branch_levels(mut self, levels: RangeInclusive<u8>) -> Self {
        self.branch_levels = levels;
        self
    }

    /// Can this node hold an open/closed state?
    pub fn is_branch(&self, node: &TreeNode) -> bool {
        !node.is_root() && (node.has_children() || self.branch_levels.contains(&node.level))
    }

    pub fn is_open(&self, id: &RowId) -> bool {
        self.open.contains(id)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Open ids, sorted for stable output
    pub fn open_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<RowId> = self.open.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Open a branch. Returns false for leaves and unknown ids.
    pub fn open(&mut self, tree: &TreeNode, id: &RowId) -> bool {
        match tree.find(id) {
            Some(node) if self.is_branch(node) => {
                self.open.insert(id.clone());
                true
            }
            _ => false,
        }
    }

    /// Close a branch. Returns whether it was open.
    pub fn close(&mut self, id: &RowId) -> bool {
        self.open.remove(id)
    }

    /// Flip one branch. Returns the new state, or None when `id` is not a
    /// branch of `tree`. Descendants keep their own state.
    pub fn toggle(&mut self, tree: &TreeNode, id: &RowId) -> Option<bool> {
        let node = tree.find(id)?;
        if !self.is_branch(node) {
            return None;
        }
        if self.open.remove(id) {
            Some(false)
        } else {
            self.open.insert(id.clone());
            Some(true)
        }
    }

    /// Open every branch of the tree
    pub fn expand_all(&mut self, tree: &TreeNode) {
        let mut ids = Vec::new();
        tree.walk(&mut |n| {
            if self.is_branch(n) {
                ids.push(n.id.clone());
            }
        });
        self.open.extend(ids);
    }

    /// Close every branch, optionally keeping level 1 open
    pub fn collapse_all(&mut self, tree: &TreeNode, mode: CollapseMode) {
        self.open.clear();
        if mode == CollapseMode::KeepTopLevel {
            self.seed_top_level(tree);
        }
    }

    /// Open all level-1 branches
    pub fn seed_top_level(&mut self, tree: &TreeNode) {
        let ids: Vec<RowId> = tree
            .children
            .iter()
            .filter(|n| n.level == 1 && self.is_branch(n))
            .map(|n| n.id.clone())
            .collect();
        self.open.extend(ids);
    }

    /// True when the tree has branches and all of them are open
    pub fn all_branches_open(&self, tree: &TreeNode) -> bool {
        let mut any = false;
        let mut all = true;
        tree.walk(&mut |n| {
            if self.is_branch(n) {
                any = true;
                all &= self.open.contains(&n.id);
            }
        });
        any && all
    }

    /// Forget open ids that are not branches of `tree`
    pub fn retain_known(&mut self, tree: &TreeNode) {
        let mut known = HashSet::new();
        tree.walk(&mut |n| {
            if self.is_branch(n) {
                known.insert(n.id.clone());
            }
        });
        self.open.retain(|id| known.contains(id));
    }

    /// Visible rows in pre-order. Depends only on `(tree, open set)`.
    pub fn render<'a>(&self, tree: &'a TreeNode) -> Vec<VisibleRow<'a>> {
        let mut out = Vec::new();
        let mut stack: Vec<(&'a TreeNode, usize, Option<&'a RowId>)> =
            tree.children.iter().rev().map(|c| (c, 0, None)).collect();

        while let Some((node, depth, parent)) = stack.pop() {
            let expanded = self.is_branch(node) && self.open.contains(&node.id);
            out.push(VisibleRow {
                node,
                depth,
                parent,
                has_children: node.has_children(),
                expanded,
            });

            if expanded {
                stack.extend(
                    node.children
                        .iter()
                        .rev()
                        .map(|c| (c, depth + 1, Some(&node.id))),
                );
            }
        }
        out
    }
}
