//! Client-side filter applied before the tree is rebuilt.

use crate::row::HierarchyRow;

/// Does the row's deepest code or deepest name contain `needle`?
///
/// `needle` must already be trimmed and lowercased.
pub fn row_matches(row: &HierarchyRow, needle: &str) -> bool {
    row.deepest_code().to_lowercase().contains(needle)
        || row.deepest_name().to_lowercase().contains(needle)
}

/// Rows matching a case-insensitive substring query, in input order.
///
/// A blank query keeps every row. Parents of matching rows are not pulled
/// in; when the filtered rows are rebuilt, matches whose parent was filtered
/// out surface as roots.
pub fn filter_rows(rows: &[HierarchyRow], query: &str) -> Vec<HierarchyRow> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|r| row_matches(r, &needle))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ParentStrategy, TreeBuilder};

    fn rows() -> Vec<HierarchyRow> {
        vec![
            HierarchyRow::new("L1:01", 1).with_code(1, "01", "Металлоконструкции"),
            HierarchyRow::new("L2:01.01", 2)
                .with_code(1, "01", "Металлоконструкции")
                .with_code(2, "01.01", "Балки"),
            HierarchyRow::new("L1:02", 1).with_code(1, "02", "Кабели"),
        ]
    }

    #[test]
    fn test_blank_query_keeps_everything() {
        assert_eq!(filter_rows(&rows(), "   ").len(), 3);
    }

    #[test]
    fn test_matches_deepest_name_case_insensitive() {
        let found = filter_rows(&rows(), "БАЛК");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].current_code(), "01.01");
    }

    #[test]
    fn test_matches_code_prefix() {
        let found = filter_rows(&rows(), "01");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_filtered_child_becomes_root() {
        let found = filter_rows(&rows(), "балки");
        let built = TreeBuilder::new(ParentStrategy::DerivedCodes).build(&found);

        assert_eq!(built.root.children.len(), 1);
        assert_eq!(built.root.children[0].level, 2);
        assert_eq!(built.diagnostics.promoted_orphans.len(), 1);
    }
}
