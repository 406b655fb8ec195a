//! Lookup keys used to resolve parents during tree construction.

use crate::row::{HierarchyRow, RowId};
use std::fmt;

/// Key under which a node can be found while linking children to parents.
///
/// Legacy hierarchies carry no parent link; a row's parent is "the row one
/// level up with code `l{level-1}_code`". That relation is expressed as a
/// typed `(level, code)` pair instead of a concatenated string, so codes
/// containing separators cannot collide with ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKey {
    /// Record primary key (explicit `parent_id` hierarchies).
    Id(RowId),
    /// Level plus the code of that level (derived hierarchies).
    Composite { level: u8, code: String },
}

impl NodeKey {
    pub fn composite(level: u8, code: impl Into<String>) -> Self {
        NodeKey::Composite {
            level,
            code: code.into(),
        }
    }

    /// Composite key a row is known by: its own level and code.
    pub fn own_composite(row: &HierarchyRow) -> Self {
        NodeKey::composite(row.level(), row.current_code())
    }

    /// Composite key of a row's parent. Level-1 rows have none.
    ///
    /// A missing ancestor code still yields a key (with an empty code), which
    /// then fails to resolve and promotes the row to a root.
    pub fn parent_composite(row: &HierarchyRow) -> Option<Self> {
        let level = row.level();
        if level <= 1 {
            return None;
        }
        Some(NodeKey::composite(
            level - 1,
            row.parent_code().unwrap_or_default(),
        ))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Id(id) => write!(f, "id:{}", id),
            NodeKey::Composite { level, code } => write!(f, "L{}:{}", level, code),
        }
    }
}
