//! Property tests for tree construction and the visible row sequence.

use std::collections::HashSet;

use class_tree::{
    build_tree, CollapseMode, HierarchyRow, ParentStrategy, RowId, TreeBuilder, TreeNode,
    TreeView,
};
use proptest::prelude::*;

/// Rows with codes drawn from a small alphabet so that derived parents
/// resolve often but not always, plus a random explicit parent link.
fn arb_rows() -> impl Strategy<Value = Vec<HierarchyRow>> {
    let row = (
        1u8..=4,
        0u8..3,
        0u8..3,
        0u8..3,
        0u8..3,
        proptest::option::of(0i64..40),
    );
    proptest::collection::vec(row, 0..40).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, (level, a, b, c, d, parent))| {
                let codes = [
                    format!("{}", a),
                    format!("{}.{}", a, b),
                    format!("{}.{}.{}", a, b, c),
                    format!("{}.{}.{}.{}", a, b, c, d),
                ];
                let mut row = HierarchyRow::new(idx as i64, level);
                for l in 1..=level {
                    let code = &codes[(l - 1) as usize];
                    row = row.with_code(l, code, &format!("name {}", code));
                }
                row.parent_id = parent.map(RowId::Int);
                row
            })
            .collect()
    })
}

fn strategy() -> impl Strategy<Value = ParentStrategy> {
    prop_oneof![
        Just(ParentStrategy::ExplicitParent),
        Just(ParentStrategy::DerivedCodes),
        Just(ParentStrategy::Auto),
    ]
}

fn assert_child_levels(root: &TreeNode) {
    root.walk(&mut |node| {
        for child in &node.children {
            if !node.is_root() {
                assert_eq!(child.level, node.level + 1, "child {} of {}", child.id, node.id);
            }
        }
    });
}

fn visible_ids(view: &TreeView, tree: &TreeNode) -> Vec<RowId> {
    view.render(tree).iter().map(|r| r.node.id.clone()).collect()
}

proptest! {
    #[test]
    fn node_count_equals_row_count(rows in arb_rows(), strategy in strategy()) {
        let built = TreeBuilder::new(strategy).build(&rows);
        prop_assert_eq!(built.root.descendant_count(), rows.len());

        let ids: HashSet<RowId> = built.root.all_ids().into_iter().collect();
        prop_assert_eq!(ids.len(), rows.len() + 1);
    }

    #[test]
    fn children_are_one_level_deeper(rows in arb_rows(), strategy in strategy()) {
        let root = TreeBuilder::new(strategy).build(&rows).root;
        assert_child_levels(&root);
    }

    #[test]
    fn render_is_idempotent(rows in arb_rows(), picks in proptest::collection::vec(0i64..40, 0..20)) {
        let tree = build_tree(&rows);
        let mut view = TreeView::new();
        for id in picks {
            view.toggle(&tree, &RowId::Int(id));
        }
        prop_assert_eq!(view.render(&tree), view.render(&tree));
    }

    #[test]
    fn visible_iff_all_ancestors_open(rows in arb_rows(), picks in proptest::collection::vec(0i64..40, 0..20)) {
        let tree = build_tree(&rows);
        let mut view = TreeView::new();
        for id in picks {
            view.open(&tree, &RowId::Int(id));
        }

        let shown: HashSet<RowId> = visible_ids(&view, &tree).into_iter().collect();
        for id in tree.all_ids().into_iter().skip(1) {
            let path = tree.path_to(&id).unwrap();
            // Strict ancestors between the synthetic root and the node
            let ancestors = &path[1..path.len() - 1];
            let expected = ancestors.iter().all(|a| view.is_open(a));
            prop_assert_eq!(shown.contains(&id), expected, "row {}", id);
        }
    }

    #[test]
    fn collapse_then_expand_restores_full_view(rows in arb_rows()) {
        let tree = build_tree(&rows);

        let mut reference = TreeView::new();
        reference.expand_all(&tree);
        let full = visible_ids(&reference, &tree);
        prop_assert_eq!(full.len(), rows.len());

        let mut view = reference.clone();
        view.collapse_all(&tree, CollapseMode::Empty);
        view.expand_all(&tree);
        prop_assert_eq!(visible_ids(&view, &tree), full);
    }
}

#[test]
fn scenario_default_open_and_closed_views() {
    let rows = vec![
        HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
        HierarchyRow::new(2, 2).with_code(2, "A.1", "One").with_parent(1),
        HierarchyRow::new(3, 2).with_code(2, "A.2", "Two").with_parent(1),
    ];
    let tree = build_tree(&rows);

    let mut view = TreeView::new();
    view.seed_top_level(&tree);
    assert_eq!(
        visible_ids(&view, &tree),
        vec![RowId::Int(1), RowId::Int(2), RowId::Int(3)]
    );

    view.collapse_all(&tree, CollapseMode::Empty);
    assert_eq!(visible_ids(&view, &tree), vec![RowId::Int(1)]);
}

#[test]
fn scenario_dangling_parent_becomes_root() {
    let rows = vec![
        HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
        HierarchyRow::new(2, 2).with_code(2, "Z.1", "Stray").with_parent(77),
    ];
    let built = TreeBuilder::default().build(&rows);

    assert_eq!(built.root.children.len(), 2);
    assert_eq!(built.root.descendant_count(), rows.len());
    assert_eq!(built.diagnostics.promoted_orphans, vec![RowId::Int(2)]);
}
