//! Nomenclature approval tree (`class_tree_nomen_v1`).
//!
//! Rows carry an explicit `parent_id`. Levels 1-3 are classifier branches,
//! level 4 rows are nomenclature items awaiting approval with two editable
//! fields: `approved` (saved on change) and `note` (saved after a quiet
//! period and on blur).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use class_tree::{
    BuildDiagnostics, CollapseMode, HierarchyRow, ParentStrategy, RowId, TreeBuilder, TreeNode,
    TreeView, VisibleRow, MAX_LEVEL,
};
use portal_client::ItemsApi;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::load_tree_rows;
use crate::config::PortalConfig;
use crate::edit::{Completion, Debounce, EditSession, EditState, SaveTicket};
use crate::error::{PortalError, Result};
use crate::present::{Marker, Table, TableRow};
use crate::status::StatusLine;

/// Fields requested from the collection.
pub const NOMEN_FIELDS: &[&str] = &[
    "id", "parent_id", "level", "l1_code", "l1_name", "l2_code", "l2_name", "l3_code", "l3_name",
    "l4_code", "l4_name", "dup_root_id", "item_name", "unit", "approved", "note", "pending_cnt",
    "l1_num", "l2_num", "l3_num", "l4_num",
];

/// Title shown when a row has no name.
pub const EMPTY_TITLE: &str = "—";

/// Code of a row. Items fall back to `dup_root_id`.
pub fn node_code(row: &HierarchyRow) -> String {
    if row.level() >= MAX_LEVEL {
        return row
            .l4_code
            .clone()
            .filter(|c| !c.is_empty())
            .or_else(|| row.dup_root_id.as_ref().map(ToString::to_string))
            .unwrap_or_default();
    }
    row.current_code().to_string()
}

/// Title of a row. Items prefer `item_name` over `l4_name`.
pub fn node_title(row: &HierarchyRow) -> String {
    let title = if row.level() >= MAX_LEVEL {
        row.item_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| row.name_at(MAX_LEVEL))
            .unwrap_or("")
    } else {
        row.current_name()
    };
    if title.is_empty() {
        EMPTY_TITLE.to_string()
    } else {
        title.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NomenclatureState {
    pub rows: Vec<HierarchyRow>,
    pub tree: TreeNode,
    pub view: TreeView,
    pub diagnostics: BuildDiagnostics,
    pub status: StatusLine,
    pub approvals: HashMap<RowId, EditSession<bool>>,
    pub notes: HashMap<RowId, EditSession<String>>,
}

impl Default for NomenclatureState {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            tree: TreeNode::root(),
            view: TreeView::new(),
            diagnostics: BuildDiagnostics::default(),
            status: StatusLine::idle(),
            approvals: HashMap::new(),
            notes: HashMap::new(),
        }
    }
}

impl NomenclatureState {
    /// Items in the collection, i.e. rows pending approval.
    pub fn pending_count(&self) -> usize {
        self.rows.iter().filter(|r| r.level() >= MAX_LEVEL).count()
    }

    /// Label of the toggle-all button.
    pub fn toggle_all_label(&self) -> &'static str {
        if self.view.all_branches_open(&self.tree) {
            "collapse all"
        } else {
            "expand all"
        }
    }

    fn row_mut(&mut self, id: &RowId) -> Option<&mut HierarchyRow> {
        self.rows.iter_mut().find(|r| &r.id == id)
    }

    /// Apply `f` to the row and to the tree node's copy of it.
    fn update_row(&mut self, id: &RowId, f: impl Fn(&mut HierarchyRow)) {
        if let Some(row) = self.row_mut(id) {
            f(row);
        }
        if let Some(row) = self.tree.find_mut(id).and_then(|n| n.row.as_mut()) {
            f(row);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NomenclatureEvent {
    Loaded(Vec<HierarchyRow>),
    LoadFailed(StatusLine),
    Toggle(RowId),
    /// Expand everything, or collapse to level 1 when all is open
    ToggleAll,
}

pub fn reduce(mut state: NomenclatureState, event: NomenclatureEvent) -> NomenclatureState {
    match event {
        NomenclatureEvent::Loaded(rows) => {
            let built = TreeBuilder::new(ParentStrategy::ExplicitParent).build(&rows);
            state.tree = built.root;
            state.diagnostics = built.diagnostics;

            // Open branches survive a reload; a fresh view opens level 1
            state.view.retain_known(&state.tree);
            if state.view.open_count() == 0 {
                state.view.seed_top_level(&state.tree);
            }

            sync_sessions(&mut state, &rows);
            state.rows = rows;
            state.status = StatusLine::ok(format!("pending approval: {}", state.pending_count()));
        }
        NomenclatureEvent::LoadFailed(status) => state.status = status,
        NomenclatureEvent::Toggle(id) => {
            state.view.toggle(&state.tree, &id);
        }
        NomenclatureEvent::ToggleAll => {
            if state.view.all_branches_open(&state.tree) {
                state
                    .view
                    .collapse_all(&state.tree, CollapseMode::KeepTopLevel);
            } else {
                state.view.expand_all(&state.tree);
            }
        }
    }
    state
}

/// One session per item and field, reset to the loaded values.
fn sync_sessions(state: &mut NomenclatureState, rows: &[HierarchyRow]) {
    let mut approvals = HashMap::new();
    let mut notes = HashMap::new();

    for row in rows.iter().filter(|r| r.level() >= MAX_LEVEL) {
        let approved = row.approved.unwrap_or(false);
        let note = row.note.clone().unwrap_or_default();

        let mut a = state
            .approvals
            .remove(&row.id)
            .unwrap_or_else(|| EditSession::new(approved));
        a.reset(approved);
        approvals.insert(row.id.clone(), a);

        let mut n = state
            .notes
            .remove(&row.id)
            .unwrap_or_else(|| EditSession::new(note.clone()));
        n.reset(note);
        notes.insert(row.id.clone(), n);
    }

    state.approvals = approvals;
    state.notes = notes;
}

pub struct NomenclaturePage {
    pub state: NomenclatureState,
    collection: String,
    page_size: usize,
    note_delay: Duration,
    note_timers: HashMap<RowId, Debounce>,
}

impl NomenclaturePage {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            state: NomenclatureState::default(),
            collection: config.collections.nomenclature.clone(),
            page_size: config.hierarchy_page_size,
            note_delay: config.note_debounce(),
            note_timers: HashMap::new(),
        }
    }

    pub fn dispatch(&mut self, event: NomenclatureEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
    }

    pub async fn reload<A: ItemsApi + ?Sized>(&mut self, api: &A) {
        self.state.status = StatusLine::busy("loading…");
        self.note_timers.clear();
        let fields: Vec<String> = NOMEN_FIELDS.iter().map(|f| f.to_string()).collect();
        let event = match load_tree_rows(api, &self.collection, &fields, self.page_size).await {
            Ok(rows) => {
                info!(collection = %self.collection, rows = rows.len(), "nomenclature loaded");
                NomenclatureEvent::Loaded(rows)
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "nomenclature load failed");
                NomenclatureEvent::LoadFailed(StatusLine::from_client_error("load failed", &e))
            }
        };
        self.dispatch(event);
    }

    // =========================================================================
    // APPROVAL
    // =========================================================================

    /// Checkbox changed: save immediately.
    pub async fn set_approved<A: ItemsApi + ?Sized>(
        &mut self,
        api: &A,
        id: &RowId,
        approved: bool,
    ) -> Result<EditState> {
        let session = self
            .state
            .approvals
            .get_mut(id)
            .ok_or_else(|| PortalError::UnknownRow(id.to_string()))?;
        session.edit(approved);

        if let Some(ticket) = session.begin_save() {
            save_field(api, &self.collection, id, "approved", session, ticket).await;
        }
        let state = session.state();
        let committed = *session.committed();
        self.state.update_row(id, |row| row.approved = Some(committed));
        self.state.status = edit_status(id, "approved", state, session_error(&self.state.approvals, id));
        Ok(state)
    }

    // =========================================================================
    // NOTES
    // =========================================================================

    /// Keystroke in a note input at `now`.
    pub fn type_note(&mut self, id: &RowId, text: impl Into<String>, now: Instant) -> Result<()> {
        let session = self
            .state
            .notes
            .get_mut(id)
            .ok_or_else(|| PortalError::UnknownRow(id.to_string()))?;
        session.edit(text.into());
        let delay = self.note_delay;
        self.note_timers
            .entry(id.clone())
            .or_insert_with(|| Debounce::new(delay))
            .poke(now);
        Ok(())
    }

    /// Note input lost focus: save now.
    pub async fn blur_note<A: ItemsApi + ?Sized>(&mut self, api: &A, id: &RowId) -> Result<EditState> {
        if let Some(timer) = self.note_timers.get_mut(id) {
            timer.cancel();
        }
        self.save_note(api, id).await
    }

    /// Save every note whose quiet period has passed at `now`.
    pub async fn tick<A: ItemsApi + ?Sized>(&mut self, api: &A, now: Instant) -> Result<usize> {
        let due: Vec<RowId> = self
            .note_timers
            .iter_mut()
            .filter_map(|(id, timer)| timer.fire(now).then(|| id.clone()))
            .collect();
        for id in &due {
            self.save_note(api, id).await?;
        }
        Ok(due.len())
    }

    /// Earliest pending note deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.note_timers.values().filter_map(Debounce::deadline).min()
    }

    async fn save_note<A: ItemsApi + ?Sized>(&mut self, api: &A, id: &RowId) -> Result<EditState> {
        let session = self
            .state
            .notes
            .get_mut(id)
            .ok_or_else(|| PortalError::UnknownRow(id.to_string()))?;

        match session.begin_save() {
            Some(ticket) => {
                save_field(api, &self.collection, id, "note", session, ticket).await;
            }
            None => debug!(%id, "note unchanged, nothing to save"),
        }
        let state = session.state();
        let committed = session.committed().clone();
        self.state.update_row(id, |row| row.note = Some(committed.clone()));
        self.state.status = edit_status(id, "note", state, session_error(&self.state.notes, id));
        Ok(state)
    }

    pub fn visible(&self) -> Vec<VisibleRow<'_>> {
        self.state.view.render(&self.state.tree)
    }

    /// code / name / level / pending / unit / approved / note
    pub fn table(&self) -> Table {
        let mut table = Table::new(["code", "name", "level", "pending", "unit", "approved", "note"])
            .tree_column(1)
            .empty_text("no data");

        for v in self.visible() {
            let Some(row) = v.node.row.as_ref() else {
                continue;
            };
            let is_item = row.level() >= MAX_LEVEL;

            let mut state = EditState::Clean;
            let (approved, note) = if is_item {
                let approved = match self.state.approvals.get(&row.id) {
                    Some(s) => {
                        state = worse(state, s.state());
                        *s.draft()
                    }
                    None => row.approved == Some(true),
                };
                let note = match self.state.notes.get(&row.id) {
                    Some(s) => {
                        state = worse(state, s.state());
                        s.draft().clone()
                    }
                    None => row.note.clone().unwrap_or_default(),
                };
                (if approved { "[x]" } else { "[ ]" }.to_string(), note)
            } else {
                (String::new(), String::new())
            };
            let class = state_class(state);

            table.push(TableRow {
                id: Some(row.id.to_string()),
                parent: v.parent.map(ToString::to_string),
                level: Some(row.level()),
                depth: v.depth,
                marker: Marker::from_flags(v.has_children, v.expanded),
                class,
                cells: vec![
                    if is_item { String::new() } else { node_code(row) },
                    node_title(row),
                    row.level().to_string(),
                    if is_item {
                        String::new()
                    } else {
                        row.pending_cnt.unwrap_or(0).to_string()
                    },
                    if is_item {
                        row.unit.clone().unwrap_or_default()
                    } else {
                        String::new()
                    },
                    approved,
                    note,
                ],
            });
        }
        table
    }
}

/// PATCH one field and feed the outcome back, following up queued saves.
async fn save_field<A, T>(
    api: &A,
    collection: &str,
    id: &RowId,
    field: &str,
    session: &mut EditSession<T>,
    ticket: SaveTicket<T>,
) -> Completion<T>
where
    A: ItemsApi + ?Sized,
    T: Clone + PartialEq + Serialize + DeserializeOwned,
{
    let mut next = Some(ticket);
    let mut last = Completion::Superseded;

    while let Some(ticket) = next.take() {
        let patch = json!({ field: &ticket.value });
        let outcome = match api.update_item(collection, &id.to_string(), patch).await {
            Ok(updated) => Ok(echoed_field(&updated, field)),
            Err(e) => {
                warn!(%id, field, error = %e, "save failed");
                Err(e.to_string())
            }
        };
        last = session.complete(ticket.generation, outcome);
        if let Completion::Saved { follow_up } = &last {
            next = follow_up.clone();
        }
    }
    last
}

/// The stored value from an update response, when it carries one.
fn echoed_field<T: DeserializeOwned>(updated: &Value, field: &str) -> Option<T> {
    updated
        .get(field)
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn session_error<T>(sessions: &HashMap<RowId, EditSession<T>>, id: &RowId) -> Option<String>
where
    T: Clone + PartialEq,
{
    sessions.get(id).and_then(|s| s.error().map(String::from))
}

fn edit_status(id: &RowId, field: &str, state: EditState, error: Option<String>) -> StatusLine {
    match state {
        EditState::Errored => StatusLine::error(format!(
            "save failed id={} {}: {}",
            id,
            field,
            error.unwrap_or_default()
        )),
        EditState::Saving => StatusLine::busy(format!("saving id={} {}", id, field)),
        _ => StatusLine::ok(format!("saved id={} {}", id, field)),
    }
}

/// Row class of an edit state, as used by the page stylesheet.
/// The state a row shows when both of its cells are being edited.
fn worse(a: EditState, b: EditState) -> EditState {
    fn rank(state: EditState) -> u8 {
        match state {
            EditState::Clean => 0,
            EditState::Saved => 1,
            EditState::Dirty => 2,
            EditState::Saving => 3,
            EditState::Errored => 4,
        }
    }
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

pub fn state_class(state: EditState) -> Option<String> {
    match state {
        EditState::Clean => None,
        EditState::Dirty => Some("dirty".into()),
        EditState::Saving => Some("saving".into()),
        EditState::Saved => Some("ok".into()),
        EditState::Errored => Some("err".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: &str, parent: &str) -> HierarchyRow {
        let mut row = HierarchyRow::new(id, 4).with_parent(parent);
        row.item_name = Some(format!("item {}", id));
        row.unit = Some("шт".into());
        row
    }

    fn rows() -> Vec<HierarchyRow> {
        vec![
            HierarchyRow::new("a", 1).with_code(1, "01", "Трубы"),
            HierarchyRow::new("b", 2)
                .with_code(2, "01.01", "Стальные")
                .with_parent("a"),
            HierarchyRow::new("c", 3)
                .with_code(3, "01.01.01", "")
                .with_parent("b"),
            item("d", "c"),
        ]
    }

    fn ids(state: &NomenclatureState) -> Vec<String> {
        state
            .view
            .render(&state.tree)
            .iter()
            .map(|v| v.node.id.to_string())
            .collect()
    }

    #[test]
    fn test_code_and_title_rules() {
        let mut leaf = HierarchyRow::new(9, 4);
        leaf.dup_root_id = Some(RowId::Int(77));
        leaf.l4_name = Some("fallback".into());
        assert_eq!(node_code(&leaf), "77");
        assert_eq!(node_title(&leaf), "fallback");

        leaf.item_name = Some("Болт".into());
        leaf.l4_code = Some("01.02.03.04".into());
        assert_eq!(node_code(&leaf), "01.02.03.04");
        assert_eq!(node_title(&leaf), "Болт");

        let branch = HierarchyRow::new(1, 3).with_code(3, "01.01.01", "");
        assert_eq!(node_title(&branch), EMPTY_TITLE);
    }

    #[test]
    fn test_load_seeds_level_one_open() {
        let state = reduce(NomenclatureState::default(), NomenclatureEvent::Loaded(rows()));
        assert_eq!(ids(&state), vec!["a", "b"]);
        assert_eq!(state.pending_count(), 1);
        assert_eq!(state.status.text, "pending approval: 1");
        assert!(state.approvals.contains_key(&RowId::from("d")));
    }

    #[test]
    fn test_toggle_all_cycles() {
        let state = reduce(NomenclatureState::default(), NomenclatureEvent::Loaded(rows()));
        assert_eq!(state.toggle_all_label(), "expand all");

        let state = reduce(state, NomenclatureEvent::ToggleAll);
        assert_eq!(ids(&state), vec!["a", "b", "c", "d"]);
        assert_eq!(state.toggle_all_label(), "collapse all");

        let state = reduce(state, NomenclatureEvent::ToggleAll);
        assert_eq!(ids(&state), vec!["a", "b"]);
    }

    #[test]
    fn test_reload_keeps_open_branches() {
        let state = reduce(NomenclatureState::default(), NomenclatureEvent::Loaded(rows()));
        let state = reduce(state, NomenclatureEvent::Toggle(RowId::from("b")));
        let state = reduce(state, NomenclatureEvent::Loaded(rows()));
        assert_eq!(ids(&state), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_table_columns() {
        let mut page = NomenclaturePage::new(&PortalConfig::default());
        page.dispatch(NomenclatureEvent::Loaded(rows()));
        page.dispatch(NomenclatureEvent::ToggleAll);

        let table = page.table();
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0].cells, vec!["01", "Трубы", "1", "0", "", "", ""]);
        assert_eq!(table.rows[2].cells[1], EMPTY_TITLE);
        assert_eq!(table.rows[3].cells, vec!["", "item d", "4", "", "шт", "[ ]", ""]);
        assert_eq!(table.rows[3].parent.as_deref(), Some("c"));
    }

    #[test]
    fn test_row_shows_worse_cell_state() {
        assert_eq!(worse(EditState::Saved, EditState::Errored), EditState::Errored);
        assert_eq!(worse(EditState::Errored, EditState::Clean), EditState::Errored);
        assert_eq!(worse(EditState::Dirty, EditState::Saving), EditState::Saving);
        assert_eq!(worse(EditState::Saved, EditState::Dirty), EditState::Dirty);
        assert_eq!(worse(EditState::Clean, EditState::Saved), EditState::Saved);
    }
}
