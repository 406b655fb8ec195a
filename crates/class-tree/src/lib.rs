//! Class Tree - hierarchy tables for the classification portal.
//!
//! This crate turns the flat, pre-sorted rows served by the content API into
//! a rooted tree and decides which rows of that tree a table shows:
//! - `HierarchyRow` - one flat record (level 1-4, per-level code/name pairs)
//! - `NodeKey` - typed lookup key (record id or `(level, code)` composite)
//! - `TreeBuilder` - orphan-tolerant two-pass construction
//! - `TreeView` - open/closed state and the visible row sequence
//! - `filter_rows` - client-side code/name filter
//!
//! # Architecture
//!
//! ```text
//! rows (API order) ──► TreeBuilder ──► TreeNode (synthetic root, level 0)
//!                                          │
//!                         TreeView.open ──►│ render()
//!                                          ▼
//!                                 [VisibleRow { node, depth, parent }]
//! ```
//!
//! Nothing here performs I/O. Rendering returns plain data; turning it into
//! text or markup is left to the caller.
//!
//! # Example
//!
//! ```
//! use class_tree::{build_tree, HierarchyRow, RowId, TreeView};
//!
//! let rows = vec![
//!     HierarchyRow::new(1, 1).with_code(1, "A", "Alpha"),
//!     HierarchyRow::new(2, 2).with_code(2, "A.1", "First").with_parent(1),
//!     HierarchyRow::new(3, 2).with_code(2, "A.2", "Second").with_parent(1),
//! ];
//! let root = build_tree(&rows);
//!
//! let mut view = TreeView::new();
//! assert_eq!(view.render(&root).len(), 1);
//!
//! view.open(&root, &RowId::from(1));
//! let ids: Vec<_> = view.render(&root).iter().map(|r| r.node.id.clone()).collect();
//! assert_eq!(ids, vec![RowId::from(1), RowId::from(2), RowId::from(3)]);
//! ```

mod builder;
mod filter;
mod key;
mod node;
mod row;
mod view;

pub use builder::{build_tree, BuildDiagnostics, BuiltTree, ParentStrategy, TreeBuilder};
pub use filter::{filter_rows, row_matches};
pub use key::NodeKey;
pub use node::TreeNode;
pub use row::{HierarchyRow, RowId, MAX_LEVEL};
pub use view::{CollapseMode, TreeView, VisibleRow, DEFAULT_BRANCH_LEVELS};
