//! Pairs editor: corrected names for the `v_nomenclature_spec_pairs_v1` view.
//!
//! An empty query lists the first rows; otherwise the pairs index is searched
//! for ids and the rows are fetched by id. Each row edits `name_tep_korr`;
//! the server mirrors it into `name_tek`. A successful save starts a pairs
//! reindex in the background.

use portal_client::{OpsApi, PairRow, ReindexTarget, SearchApi, SearchQuery};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::PortalConfig;
use crate::edit::{Completion, EditSession, EditState, SaveTicket};
use crate::error::{PortalError, Result};
use crate::present::{Table, TableRow};
use crate::status::StatusLine;

use super::nomenclature::state_class;

pub const LIST_LIMIT: usize = 200;
pub const SEARCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct PairEntry {
    pub id: i64,
    /// Current name as last returned by the server
    pub name_tek: String,
    pub correction: EditSession<String>,
}

impl From<PairRow> for PairEntry {
    fn from(row: PairRow) -> Self {
        Self {
            id: row.id,
            name_tek: row.name_tek.unwrap_or_default(),
            correction: EditSession::new(row.name_tep_korr.unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PairsState {
    pub query: String,
    pub entries: Vec<PairEntry>,
    pub total: u64,
    pub status: StatusLine,
}

impl PairsState {
    pub fn entry(&self, id: i64) -> Option<&PairEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn entry_mut(&mut self, id: i64) -> Result<&mut PairEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PortalError::UnknownRow(id.to_string()))
    }
}

/// Id of a search hit, numeric or numeric text.
fn hit_id(source: &Value) -> Option<i64> {
    match source.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub struct PairsPage {
    pub state: PairsState,
    index: String,
    list_limit: usize,
    search_size: usize,
}

impl PairsPage {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            state: PairsState::default(),
            index: config.indexes.pairs.clone(),
            list_limit: LIST_LIMIT,
            search_size: SEARCH_SIZE,
        }
    }

    pub fn with_limits(mut self, list_limit: usize, search_size: usize) -> Self {
        self.list_limit = list_limit;
        self.search_size = search_size;
        self
    }

    /// List (blank query) or search. Unsaved drafts are discarded.
    pub async fn load<A>(&mut self, api: &A, query: &str)
    where
        A: SearchApi + OpsApi + ?Sized,
    {
        let query = query.trim().to_string();
        self.state.status = StatusLine::busy("loading…");

        let result = if query.is_empty() {
            self.list(api).await
        } else {
            self.search(api, &query).await
        };
        self.state.query = query;

        match result {
            Ok((rows, total, status)) => {
                self.state.entries = rows.into_iter().map(PairEntry::from).collect();
                self.state.total = total;
                self.state.status = StatusLine::ok(status);
            }
            Err(e) => {
                warn!(error = %e, "pairs load failed");
                self.state.entries.clear();
                self.state.total = 0;
                self.state.status = StatusLine::from_client_error("error", &e);
            }
        }
    }

    async fn list<A: OpsApi + ?Sized>(
        &self,
        api: &A,
    ) -> portal_client::Result<(Vec<PairRow>, u64, String)> {
        let page = api.pairs_list(self.list_limit, 0).await?;
        let shown = page.rows.len();
        let status = format!("shown: {} of {}", shown, page.total);
        Ok((page.rows, page.total, status))
    }

    async fn search<A>(
        &self,
        api: &A,
        query: &str,
    ) -> portal_client::Result<(Vec<PairRow>, u64, String)>
    where
        A: SearchApi + OpsApi + ?Sized,
    {
        let hits = api
            .search(
                &SearchQuery::new(query)
                    .index(self.index.clone())
                    .size(self.search_size),
            )
            .await?;
        let ids: Vec<i64> = hits.sources().filter_map(hit_id).collect();
        debug!(query, total = hits.total, ids = ids.len(), "pairs search");

        let rows = if ids.is_empty() {
            Vec::new()
        } else {
            api.pairs_rows(&ids).await?
        };
        let status = format!("found: {} (shown: {})", hits.total, rows.len());
        Ok((rows, hits.total, status))
    }

    pub fn edit(&mut self, id: i64, text: impl Into<String>) -> Result<EditState> {
        let entry = self.state.entry_mut(id)?;
        entry.correction.edit(text.into());
        Ok(entry.correction.state())
    }

    /// Revert the draft (Escape).
    pub fn undo(&mut self, id: i64) -> Result<()> {
        self.state.entry_mut(id)?.correction.undo();
        Ok(())
    }

    /// Save the row's draft if it differs from the stored value.
    ///
    /// Once a write has landed a pairs reindex is requested, even if a
    /// follow-up write then fails; a reindex failure is only logged.
    pub async fn save<A: OpsApi + ?Sized>(&mut self, api: &A, id: i64) -> Result<EditState> {
        let first = self.state.entry_mut(id)?.correction.begin_save();
        self.drain_saves(api, id, first).await
    }

    /// Send `first` and every follow-up save it leaves behind.
    async fn drain_saves<A: OpsApi + ?Sized>(
        &mut self,
        api: &A,
        id: i64,
        first: Option<SaveTicket<String>>,
    ) -> Result<EditState> {
        let entry = self.state.entry_mut(id)?;
        let mut next = first;
        let mut saved = false;
        let mut failure = None;

        while let Some(ticket) = next.take() {
            match api.pairs_update(id, &ticket.value).await {
                Ok(row) => {
                    if let Some(name_tek) = row.name_tek.clone() {
                        entry.name_tek = name_tek;
                    }
                    let done = entry.correction.complete(ticket.generation, Ok(row.name_tep_korr));
                    if let Completion::Saved { follow_up } = done {
                        saved = true;
                        next = follow_up;
                    }
                }
                Err(e) => {
                    warn!(id, error = %e, "pair save failed");
                    entry.correction.complete(ticket.generation, Err(e.to_string()));
                    failure = Some(e);
                }
            }
        }

        let state = entry.correction.state();
        if let Some(e) = &failure {
            self.state.status = StatusLine::from_client_error(&format!("save failed id={}", id), e);
        } else if saved {
            info!(id, "pair saved");
            self.state.status = StatusLine::ok(format!("saved id={}", id));
        }
        if saved {
            if let Err(e) = api.reindex(ReindexTarget::Pairs).await {
                warn!(error = %e, "pairs reindex request failed");
            }
        }
        Ok(state)
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(["id", "name_tek", "name_tep_korr"]).empty_text("no rows");
        for entry in &self.state.entries {
            let mut row = TableRow::new(vec![
                entry.id.to_string(),
                entry.name_tek.clone(),
                entry.correction.draft().clone(),
            ]);
            row.id = Some(entry.id.to_string());
            row.class = state_class(entry.correction.state());
            table.push(row);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_client::InMemoryPortal;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn pair(id: i64, tek: &str, korr: Option<&str>) -> PairRow {
        PairRow {
            id,
            name_tek: Some(tek.to_string()),
            name_tep_korr: korr.map(String::from),
        }
    }

    fn portal() -> InMemoryPortal {
        InMemoryPortal::new()
            .with_pairs(vec![
                pair(10, "Болт М12", None),
                pair(11, "Гайка М12", Some("Гайка М12 оцинк.")),
                pair(12, "Шайба", None),
            ])
            .with_index(
                "v_nomenclature_spec_pairs_v1",
                vec![
                    json!({"id": 10, "name_tek": "Болт М12"}),
                    json!({"id": "11", "name_tek": "Гайка М12"}),
                ],
            )
    }

    fn page() -> PairsPage {
        PairsPage::new(&PortalConfig::default())
    }

    #[tokio::test]
    async fn test_blank_query_lists() {
        let portal = portal();
        let mut page = page().with_limits(2, SEARCH_SIZE);
        page.load(&portal, "").await;
        assert_eq!(page.state.status.text, "shown: 2 of 3");
        assert_eq!(page.state.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_search_fetches_rows_by_id() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "м12").await;
        assert_eq!(page.state.status.text, "found: 2 (shown: 2)");
        let ids: Vec<i64> = page.state.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 11]);
        assert_eq!(page.state.entry(11).unwrap().correction.draft(), "Гайка М12 оцинк.");
    }

    #[tokio::test]
    async fn test_search_without_hits_skips_row_fetch() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "кабель").await;
        assert_eq!(page.state.status.text, "found: 0 (shown: 0)");
        assert!(!portal.calls().iter().any(|c| c.starts_with("GET pairs_rows")));
    }

    #[tokio::test]
    async fn test_save_updates_name_and_reindexes() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "").await;

        page.edit(10, "Болт М12х50").unwrap();
        let state = page.save(&portal, 10).await.unwrap();

        assert_eq!(state, EditState::Saved);
        assert_eq!(page.state.entry(10).unwrap().name_tek, "Болт М12х50");
        assert_eq!(portal.reindexed(), vec![ReindexTarget::Pairs]);
        assert_eq!(page.state.status.text, "saved id=10");
    }

    #[tokio::test]
    async fn test_unchanged_value_is_not_sent() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "").await;
        page.edit(11, "Гайка М12 оцинк.").unwrap();
        page.save(&portal, 11).await.unwrap();
        assert!(!portal.calls().iter().any(|c| c.starts_with("PATCH")));
        assert!(portal.reindexed().is_empty());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft_and_skips_reindex() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "").await;

        page.edit(12, "Шайба 12").unwrap();
        portal.fail_next(500, "boom");
        let state = page.save(&portal, 12).await.unwrap();

        assert_eq!(state, EditState::Errored);
        let entry = page.state.entry(12).unwrap();
        assert_eq!(entry.correction.draft(), "Шайба 12");
        assert_eq!(entry.correction.committed(), "");
        assert_eq!(page.state.status.text, "save failed id=12: HTTP 500");
        assert!(portal.reindexed().is_empty());
        assert_eq!(portal.pair(12).unwrap().name_tep_korr, None);
    }

    #[tokio::test]
    async fn test_failed_follow_up_still_reindexes() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "").await;

        page.edit(12, "Шайба 12").unwrap();
        let correction = &mut page.state.entry_mut(12).unwrap().correction;
        let first = correction.begin_save();
        // typed again while the first write is in flight
        correction.edit("Шайба 12 оцинк.".to_string());

        portal.pass_next();
        portal.fail_next(500, "boom");
        let state = page.drain_saves(&portal, 12, first).await.unwrap();

        assert_eq!(state, EditState::Errored);
        assert_eq!(portal.pair(12).unwrap().name_tep_korr.as_deref(), Some("Шайба 12"));
        assert_eq!(page.state.entry(12).unwrap().correction.committed(), "Шайба 12");
        assert_eq!(page.state.status.text, "save failed id=12: HTTP 500");
        assert_eq!(portal.reindexed(), vec![ReindexTarget::Pairs]);
    }

    #[tokio::test]
    async fn test_undo_reverts_and_unknown_row() {
        let portal = portal();
        let mut page = page();
        page.load(&portal, "").await;
        page.edit(10, "x").unwrap();
        page.undo(10).unwrap();
        assert_eq!(page.state.entry(10).unwrap().correction.state(), EditState::Clean);
        assert!(matches!(page.edit(99, "y"), Err(PortalError::UnknownRow(_))));
    }
}
