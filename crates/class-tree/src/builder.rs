//! TreeBuilder - Constructs classification trees from flat rows
//!
//! The builder takes rows in the order the API returned them and produces a
//! `TreeNode` under a synthetic root. It handles:
//! - Indexing rows by id and/or `(level, code)`
//! - Resolving each row's parent (explicit link or derived from codes)
//! - Promoting rows whose parent cannot be found to roots
//! - Promoting rows whose parent is not exactly one level up
//!
//! A parent edge always climbs one level, so the result has no cycles and
//! its depth is bounded by the level range.
//!
//! Construction never fails. Anything unusual is reported through
//! `BuildDiagnostics` instead.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::key::NodeKey;
use crate::node::TreeNode;
use crate::row::{HierarchyRow, RowId};

/// How a row's parent is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentStrategy {
    /// `parent_id` names the parent; rows without one are roots.
    ExplicitParent,
    /// Parent is the row at `level - 1` whose code equals `l{level-1}_code`.
    DerivedCodes,
    /// Explicit when the row carries `parent_id`, derived otherwise.
    #[default]
    Auto,
}

/// Anomalies absorbed during construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildDiagnostics {
    /// Rows whose parent key did not resolve and were promoted to roots.
    pub promoted_orphans: Vec<RowId>,
    /// Rows whose lookup key was already taken by an earlier row.
    pub duplicate_keys: Vec<RowId>,
    /// Rows whose parent resolved to a row not at `level - 1`; promoted
    /// to roots.
    pub level_mismatches: Vec<RowId>,
}

impl BuildDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.promoted_orphans.is_empty()
            && self.duplicate_keys.is_empty()
            && self.level_mismatches.is_empty()
    }
}

/// Result of a build: the tree plus what had to be tolerated to build it.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    pub root: TreeNode,
    pub diagnostics: BuildDiagnostics,
}

/// Builds classification trees from rows
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    strategy: ParentStrategy,
}

impl TreeBuilder {
    /// Create a new builder with the given parent strategy
    pub fn new(strategy: ParentStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> ParentStrategy {
        self.strategy
    }

    /// Build the tree. Rows must already be in sibling order.
    pub fn build(&self, rows: &[HierarchyRow]) -> BuiltTree {
        let mut diagnostics = BuildDiagnostics::default();

        // 1. Index rows by every key they can be found under
        let mut lookup: HashMap<NodeKey, usize> = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let mut taken = false;
            for key in self.own_keys(row) {
                if lookup.contains_key(&key) {
                    taken = true;
                } else {
                    lookup.insert(key, idx);
                }
            }
            if taken {
                diagnostics.duplicate_keys.push(row.id.clone());
            }
        }

        // 2. Attach each row to its parent, or to the root list
        let mut child_lists: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];
        let mut roots: Vec<usize> = Vec::new();

        for (idx, row) in rows.iter().enumerate() {
            match self.parent_key(row) {
                None => roots.push(idx),
                Some(key) => match lookup.get(&key) {
                    Some(&parent) if rows[parent].level() == row.level() - 1 => {
                        child_lists[parent].push(idx)
                    }
                    Some(_) => {
                        diagnostics.level_mismatches.push(row.id.clone());
                        roots.push(idx);
                    }
                    None => {
                        diagnostics.promoted_orphans.push(row.id.clone());
                        roots.push(idx);
                    }
                },
            }
        }

        // 3. Assemble nested nodes bottom-up: reversed pre-order sees every
        //    child before its parent
        let mut order = Vec::with_capacity(rows.len());
        let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(child_lists[idx].iter().rev());
        }

        let mut slots: Vec<Option<TreeNode>> =
            rows.iter().map(|r| Some(TreeNode::from_row(r))).collect();
        for &idx in order.iter().rev() {
            let children: Vec<TreeNode> = child_lists[idx]
                .iter()
                .filter_map(|&child| slots[child].take())
                .collect();
            if let Some(node) = slots[idx].as_mut() {
                node.children = children;
            }
        }

        let mut root = TreeNode::root();
        for idx in roots {
            if let Some(node) = slots[idx].take() {
                root.add_child(node);
            }
        }

        if diagnostics.is_clean() {
            debug!(rows = rows.len(), roots = root.children.len(), "tree built");
        } else {
            warn!(
                rows = rows.len(),
                roots = root.children.len(),
                orphans = diagnostics.promoted_orphans.len(),
                duplicates = diagnostics.duplicate_keys.len(),
                level_mismatches = diagnostics.level_mismatches.len(),
                "tree built with anomalies"
            );
        }

        BuiltTree { root, diagnostics }
    }

    fn own_keys(&self, row: &HierarchyRow) -> Vec<NodeKey> {
        match self.strategy {
            ParentStrategy::ExplicitParent => vec![NodeKey::Id(row.id.clone())],
            ParentStrategy::DerivedCodes => vec![NodeKey::own_composite(row)],
            ParentStrategy::Auto => {
                vec![NodeKey::Id(row.id.clone()), NodeKey::own_composite(row)]
            }
        }
    }

    fn parent_key(&self, row: &HierarchyRow) -> Option<NodeKey> {
        match self.strategy {
            ParentStrategy::ExplicitParent => row.parent_id.clone().map(NodeKey::Id),
            ParentStrategy::DerivedCodes => NodeKey::parent_composite(row),
            ParentStrategy::Auto => match &row.parent_id {
                Some(pid) => Some(NodeKey::Id(pid.clone())),
                None => NodeKey::parent_composite(row),
            },
        }
    }
}

/// Build with the default (`Auto`) strategy and discard diagnostics.
pub fn build_tree(rows: &[HierarchyRow]) -> TreeNode {
    TreeBuilder::default().build(rows).root
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn child_ids(node: &TreeNode) -> Vec<RowId> {
        node.children.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_explicit_parent_scenario() {
        let rows = vec![
            HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
            HierarchyRow::new(2, 2).with_code(2, "A.1", "One").with_parent(1),
            HierarchyRow::new(3, 2).with_code(2, "A.2", "Two").with_parent(1),
        ];

        let built = TreeBuilder::new(ParentStrategy::ExplicitParent).build(&rows);

        assert_eq!(child_ids(&built.root), vec![RowId::Int(1)]);
        assert_eq!(
            child_ids(&built.root.children[0]),
            vec![RowId::Int(2), RowId::Int(3)]
        );
        assert!(built.diagnostics.is_clean());
    }

    #[test]
    fn test_derived_codes_legacy_hierarchy() {
        let rows = vec![
            HierarchyRow::new("L1:01", 1).with_code(1, "01", "Top"),
            HierarchyRow::new("L2:01.01", 2)
                .with_code(1, "01", "Top")
                .with_code(2, "01.01", "Mid"),
            HierarchyRow::new("L3:01.01.01", 3)
                .with_code(1, "01", "Top")
                .with_code(2, "01.01", "Mid")
                .with_code(3, "01.01.01", "Low"),
            HierarchyRow::new("L4:x", 4)
                .with_code(3, "01.01.01", "Low")
                .with_code(4, "01.01.01.001", "Item"),
        ];

        let root = TreeBuilder::new(ParentStrategy::DerivedCodes).build(&rows).root;

        let top = &root.children[0];
        assert_eq!(top.code, "01");
        let leaf = &top.children[0].children[0].children[0];
        assert_eq!(leaf.level, 4);
        assert_eq!(leaf.name, "Item");
        assert_eq!(root.descendant_count(), 4);
    }

    #[test]
    fn test_missing_parent_promoted_to_root() {
        let rows = vec![
            HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
            HierarchyRow::new(2, 2).with_code(2, "B.1", "Lost").with_parent(99),
        ];

        let built = TreeBuilder::default().build(&rows);

        assert_eq!(child_ids(&built.root), vec![RowId::Int(1), RowId::Int(2)]);
        assert_eq!(built.diagnostics.promoted_orphans, vec![RowId::Int(2)]);
        assert_eq!(built.root.descendant_count(), rows.len());
    }

    #[test]
    fn test_parent_level_mismatch_promoted() {
        let rows = vec![
            HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
            HierarchyRow::new(2, 3).with_code(3, "A.1.1", "Skip").with_parent(1),
            HierarchyRow::new(3, 2).with_code(2, "A.1", "One").with_parent(1),
        ];

        let built = TreeBuilder::new(ParentStrategy::ExplicitParent).build(&rows);

        assert_eq!(child_ids(&built.root), vec![RowId::Int(1), RowId::Int(2)]);
        assert_eq!(child_ids(&built.root.children[0]), vec![RowId::Int(3)]);
        assert_eq!(built.diagnostics.level_mismatches, vec![RowId::Int(2)]);
        assert!(built.diagnostics.promoted_orphans.is_empty());
    }

    #[test]
    fn test_parent_cycle_keeps_every_row() {
        let rows = vec![
            HierarchyRow::new(1, 2).with_parent(2),
            HierarchyRow::new(2, 2).with_parent(1),
            HierarchyRow::new(3, 2).with_parent(3),
        ];

        let built = TreeBuilder::new(ParentStrategy::ExplicitParent).build(&rows);

        assert_eq!(built.root.descendant_count(), 3);
        assert_eq!(
            child_ids(&built.root),
            vec![RowId::Int(1), RowId::Int(2), RowId::Int(3)]
        );
        assert_eq!(
            built.diagnostics.level_mismatches,
            vec![RowId::Int(1), RowId::Int(2), RowId::Int(3)]
        );
    }

    #[test]
    fn test_long_parent_chain_builds_and_renders() {
        let rows: Vec<HierarchyRow> = (0..20_000i64)
            .map(|i| {
                let row = HierarchyRow::new(i, 2);
                if i == 0 {
                    row
                } else {
                    row.with_parent(i - 1)
                }
            })
            .collect();

        let built = TreeBuilder::new(ParentStrategy::Auto).build(&rows);
        assert_eq!(built.root.descendant_count(), 20_000);
        assert_eq!(built.diagnostics.level_mismatches.len(), 19_999);

        let mut view = crate::view::TreeView::new();
        view.expand_all(&built.root);
        assert_eq!(view.render(&built.root).len(), 20_000);
    }

    #[test]
    fn test_duplicate_codes_first_wins_lookup() {
        let rows = vec![
            HierarchyRow::new("a", 1).with_code(1, "01", "First"),
            HierarchyRow::new("b", 1).with_code(1, "01", "Second"),
            HierarchyRow::new("c", 2)
                .with_code(1, "01", "First")
                .with_code(2, "01.01", "Child"),
        ];

        let built = TreeBuilder::new(ParentStrategy::DerivedCodes).build(&rows);

        assert_eq!(built.diagnostics.duplicate_keys, vec![RowId::from("b")]);
        assert_eq!(built.root.children.len(), 2);
        assert_eq!(child_ids(&built.root.children[0]), vec![RowId::from("c")]);
        assert_eq!(built.root.descendant_count(), 3);
    }

    #[test]
    fn test_empty_input() {
        let root = build_tree(&[]);
        assert!(root.is_root());
        assert!(root.children.is_empty());
    }
}
