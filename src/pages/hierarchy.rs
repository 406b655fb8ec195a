//! Classifier hierarchy page (`class_tree_v1`).
//!
//! Rows carry no parent link, so the tree is derived from level codes.
//! Every rebuild (load, reload, filter change) starts collapsed with only
//! the top level visible.

use class_tree::{
    filter_rows, BuildDiagnostics, CollapseMode, HierarchyRow, ParentStrategy, RowId, TreeBuilder,
    TreeNode, TreeView, VisibleRow,
};
use portal_client::ItemsApi;
use tracing::{info, warn};

use super::load_tree_rows;
use crate::config::PortalConfig;
use crate::present::{Marker, Table, TableRow};
use crate::status::StatusLine;

#[derive(Debug, Clone)]
pub struct HierarchyState {
    /// Every loaded row, unfiltered, in server order
    pub rows: Vec<HierarchyRow>,
    pub filter: String,
    pub tree: TreeNode,
    pub view: TreeView,
    pub diagnostics: BuildDiagnostics,
    pub status: StatusLine,
}

impl Default for HierarchyState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            filter: String::new(),
            tree: TreeNode::root(),
            view: TreeView::new(),
            diagnostics: BuildDiagnostics::default(),
            status: StatusLine::idle(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyEvent {
    Loaded(Vec<HierarchyRow>),
    LoadFailed(StatusLine),
    FilterChanged(String),
    Toggle(RowId),
    ExpandAll,
    CollapseAll,
}

pub fn reduce(mut state: HierarchyState, event: HierarchyEvent) -> HierarchyState {
    match event {
        HierarchyEvent::Loaded(rows) => {
            state.status = StatusLine::ok(format!("loaded: {} rows", rows.len()));
            state.rows = rows;
            rebuild(&mut state);
        }
        HierarchyEvent::LoadFailed(status) => {
            state.status = status;
        }
        HierarchyEvent::FilterChanged(filter) => {
            state.filter = filter;
            rebuild(&mut state);
        }
        HierarchyEvent::Toggle(id) => {
            state.view.toggle(&state.tree, &id);
        }
        HierarchyEvent::ExpandAll => state.view.expand_all(&state.tree),
        HierarchyEvent::CollapseAll => state.view.collapse_all(&state.tree, CollapseMode::Empty),
    }
    state
}

fn rebuild(state: &mut HierarchyState) {
    let rows = filter_rows(&state.rows, &state.filter);
    let built = TreeBuilder::new(ParentStrategy::DerivedCodes).build(&rows);
    state.tree = built.root;
    state.diagnostics = built.diagnostics;
    state.view = TreeView::new();
}

pub struct HierarchyPage {
    pub state: HierarchyState,
    collection: String,
    fields: Vec<String>,
    page_size: usize,
}

impl HierarchyPage {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            state: HierarchyState::default(),
            collection: config.collections.hierarchy.clone(),
            fields: config.hierarchy_fields.clone(),
            page_size: config.hierarchy_page_size,
        }
    }

    pub fn dispatch(&mut self, event: HierarchyEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
    }

    /// Load every row and rebuild. The current filter is kept.
    pub async fn reload<A: ItemsApi + ?Sized>(&mut self, api: &A) {
        self.state.status = StatusLine::busy("loading…");
        let event = match load_tree_rows(api, &self.collection, &self.fields, self.page_size).await
        {
            Ok(rows) => {
                info!(collection = %self.collection, rows = rows.len(), "hierarchy loaded");
                HierarchyEvent::Loaded(rows)
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "hierarchy load failed");
                HierarchyEvent::LoadFailed(StatusLine::from_client_error("error", &e))
            }
        };
        self.dispatch(event);
    }

    pub fn visible(&self) -> Vec<VisibleRow<'_>> {
        self.state.view.render(&self.state.tree)
    }

    /// Code / name / level table of the visible rows.
    pub fn table(&self) -> Table {
        let mut table = Table::new(["code", "name", "level"])
            .tree_column(0)
            .empty_text("no data");
        for v in self.visible() {
            table.push(TableRow {
                id: Some(v.node.id.to_string()),
                parent: v.parent.map(ToString::to_string),
                level: Some(v.node.level),
                depth: v.depth,
                marker: Marker::from_flags(v.has_children, v.expanded),
                class: None,
                cells: vec![
                    v.node.code.clone(),
                    v.node.name.clone(),
                    v.node.level.to_string(),
                ],
            });
        }
        table
    }
}
