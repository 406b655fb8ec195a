//! Nomenclature search and the start page's quick search.

use std::sync::LazyLock;

use portal_client::{OpsApi, ReindexTarget, SearchApi, SearchHits, SearchQuery};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::cell_text;
use crate::present::{Table, TableRow};
use crate::status::StatusLine;

static CODE_QUERY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9.]+$").unwrap());

/// Hits shown by the quick search.
pub const QUICK_SEARCH_TOP: usize = 5;
const QUICK_SEARCH_SIZE: usize = 10;

/// Field a nomenclature query targets: digits and dots search codes.
pub fn search_field(query: &str) -> &'static str {
    if CODE_QUERY.is_match(query) {
        "l4_code"
    } else {
        "item_name"
    }
}

/// `field:value` query string for the nomenclature index.
pub fn field_query(query: &str) -> String {
    format!("{}:{}", search_field(query), query)
}

// =============================================================================
// NOMENCLATURE SEARCH
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub rows: Vec<Value>,
    pub total: u64,
    pub status: StatusLine,
    /// Shown in the table body instead of rows
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    /// Query submitted but blank; nothing is sent
    EmptyQuery,
    Found(SearchHits),
    Failed(StatusLine),
}

pub fn reduce(mut state: SearchState, event: SearchEvent) -> SearchState {
    match event {
        SearchEvent::EmptyQuery => {
            state.rows.clear();
            state.total = 0;
            state.status = StatusLine::idle();
            state.message = Some("enter a query and press search".into());
        }
        SearchEvent::Found(hits) => {
            state.total = hits.total;
            state.rows = hits.hits.into_iter().map(|h| h.source).collect();
            state.status = StatusLine::ok(format!("found: {}", state.total));
            state.message = state.rows.is_empty().then(|| "nothing found".to_string());
        }
        SearchEvent::Failed(status) => {
            state.rows.clear();
            state.message = Some("request failed".into());
            state.status = status;
        }
    }
    state
}

pub struct SearchPage {
    pub state: SearchState,
    index: String,
}

impl SearchPage {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            state: SearchState::default(),
            index: index.into(),
        }
    }

    pub async fn search<A: SearchApi + ?Sized>(&mut self, api: &A, query: &str) {
        let query = query.trim();
        self.state.query = query.to_string();

        let event = if query.is_empty() {
            SearchEvent::EmptyQuery
        } else {
            self.state.status = StatusLine::busy("searching…");
            let request = SearchQuery::new(field_query(query)).index(self.index.clone());
            match api.search(&request).await {
                Ok(hits) => {
                    info!(index = %self.index, query, total = hits.total, "search done");
                    SearchEvent::Found(hits)
                }
                Err(e) => {
                    warn!(index = %self.index, query, error = %e, "search failed");
                    SearchEvent::Failed(StatusLine::from_client_error("search failed", &e))
                }
            }
        };
        self.state = reduce(std::mem::take(&mut self.state), event);
    }

    /// Ask the portal to rebuild the nomenclature index.
    pub async fn reindex<A: OpsApi + ?Sized>(&mut self, api: &A) {
        self.state.status = match api.reindex(ReindexTarget::Nomenclature).await {
            Ok(_) => StatusLine::info("sync started, results refresh in a few seconds"),
            Err(e) => StatusLine::from_client_error("reindex failed", &e),
        };
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(["code", "name"]);
        if let Some(message) = &self.state.message {
            table = table.empty_text(message.clone());
        }
        for row in &self.state.rows {
            table.push(TableRow::new(vec![
                cell_text(row.get("l4_code")),
                cell_text(row.get("item_name")),
            ]));
        }
        table
    }
}

// =============================================================================
// QUICK SEARCH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickHit {
    pub score: Option<f64>,
    pub code: String,
    pub name: String,
}

/// First non-empty value among `keys`.
fn first_text(source: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| cell_text(source.get(*k)))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// Top hits with code and name picked from whichever fields the index has.
pub fn quick_hits(hits: &SearchHits) -> Vec<QuickHit> {
    hits.hits
        .iter()
        .take(QUICK_SEARCH_TOP)
        .map(|h| QuickHit {
            score: h.score,
            code: first_text(&h.source, &["code", "l4_code", "kod", "id"]),
            name: first_text(&h.source, &["name", "l4_name", "naimenovanie"]),
        })
        .collect()
}

/// Run the quick search against the default index.
pub async fn quick_search<A: SearchApi + ?Sized>(
    api: &A,
    query: &str,
) -> portal_client::Result<(u64, Vec<QuickHit>)> {
    let hits = api
        .search(&SearchQuery::new(query.trim()).size(QUICK_SEARCH_SIZE))
        .await?;
    Ok((hits.total, quick_hits(&hits)))
}

/// One bullet line per hit, or a note that nothing matched.
pub fn format_quick_hits(total: u64, hits: &[QuickHit]) -> String {
    let mut out = format!("found: {}\n\n", total);
    if hits.is_empty() {
        out.push_str("empty (no hits)");
        return out;
    }
    let lines: Vec<String> = hits
        .iter()
        .map(|h| {
            let score = h.score.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
            format!("• {} — {} (score {})", h.code, h.name, score)
        })
        .collect();
    out.push_str(&lines.join("\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_client::{InMemoryPortal, SearchHit};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_search_field() {
        assert_eq!(search_field("01.02.03"), "l4_code");
        assert_eq!(search_field("123"), "l4_code");
        assert_eq!(search_field("болт м12"), "item_name");
        assert_eq!(search_field("01.02a"), "item_name");
        assert_eq!(field_query("01.02"), "l4_code:01.02");
    }

    #[tokio::test]
    async fn test_blank_query_sends_nothing() {
        let portal = InMemoryPortal::new();
        let mut page = SearchPage::new("class_tree_nomen_v1");
        page.search(&portal, "   ").await;
        assert!(portal.calls().is_empty());
        assert_eq!(
            page.state.message.as_deref(),
            Some("enter a query and press search")
        );
    }

    #[tokio::test]
    async fn test_search_by_code_and_name() {
        let portal = InMemoryPortal::new().with_index(
            "class_tree_nomen_v1",
            vec![
                json!({"id": 1, "l4_code": "01.02.03.04", "item_name": "Болт 0102"}),
                json!({"id": 2, "l4_code": "05.06.07.08", "item_name": "Гайка"}),
            ],
        );
        let mut page = SearchPage::new("class_tree_nomen_v1");

        page.search(&portal, "0102").await;
        // digits only: searched in codes, where "0102" does not occur
        assert_eq!(page.state.total, 0);
        assert_eq!(page.state.message.as_deref(), Some("nothing found"));

        page.search(&portal, "гайка").await;
        assert_eq!(page.state.status.text, "found: 1");
        assert_eq!(page.table().rows[0].cells, vec!["05.06.07.08", "Гайка"]);
    }

    #[tokio::test]
    async fn test_search_failure_sets_status() {
        let portal = InMemoryPortal::new();
        portal.fail_next(500, "{\"error\":\"boom\"}");
        let mut page = SearchPage::new("class_tree_nomen_v1");
        page.search(&portal, "x").await;
        assert_eq!(page.state.status.text, "search failed: HTTP 500");
    }

    #[test]
    fn test_quick_hits_pick_fields() {
        let hits = SearchHits {
            total: 7,
            hits: (0..7)
                .map(|i| SearchHit {
                    score: Some(i as f64),
                    source: json!({"kod": format!("K{}", i), "naimenovanie": "N", "id": i}),
                })
                .collect(),
        };
        let top = quick_hits(&hits);
        assert_eq!(top.len(), QUICK_SEARCH_TOP);
        assert_eq!(top[2].code, "K2");
        assert_eq!(top[2].name, "N");
        assert_eq!(
            format_quick_hits(7, &top[..1]),
            "found: 7\n\n• K0 — N (score 0)"
        );
    }
}
