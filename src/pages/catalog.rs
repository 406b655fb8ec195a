//! Nomenclature catalog (`nomenclature_spec_all_v1`): filtered, sorted,
//! server-paged table.

use std::time::{Duration, Instant};

use portal_client::query::{and, eq, icontains, null, or};
use portal_client::{ItemsApi, ItemsQuery};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use url::form_urlencoded;

use super::cell_text;
use crate::edit::Debounce;
use crate::present::{Table, TableRow};
use crate::status::StatusLine;

pub const CATALOG_FIELDS: [&str; 4] = ["item_name", "type_mark", "uom", "class_l3_id"];
pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_SORT: &str = "item_name";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    fn flipped(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            Self::Asc => "▲",
            Self::Desc => "▼",
        }
    }
}

/// Filter inputs of the catalog page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    /// Global query over every column
    Query,
    ItemName,
    TypeMark,
    Uom,
    ClassL3Id,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogState {
    pub q: String,
    pub f_item_name: String,
    pub f_type_mark: String,
    pub f_uom: String,
    pub f_class_l3_id: String,
    /// 1-based
    pub page: usize,
    pub limit: usize,
    pub sort: String,
    pub dir: SortDir,
    /// Unknown until a response carried a count
    pub total: Option<u64>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            q: String::new(),
            f_item_name: String::new(),
            f_type_mark: String::new(),
            f_uom: String::new(),
            f_class_l3_id: String::new(),
            page: 1,
            limit: DEFAULT_LIMIT,
            sort: DEFAULT_SORT.to_string(),
            dir: SortDir::Asc,
            total: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    FilterChanged(FilterField, String),
    SortBy(String),
    PageSize(usize),
    PrevPage,
    NextPage,
    Reset,
    Loaded { total: Option<u64> },
}

/// JSON number for input that reads as a finite number.
fn numeric(text: &str) -> Option<Value> {
    let n: f64 = text.parse().ok().filter(|n: &f64| n.is_finite())?;
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        Some(Value::from(n))
    }
}

impl CatalogState {
    fn field_mut(&mut self, field: FilterField) -> &mut String {
        match field {
            FilterField::Query => &mut self.q,
            FilterField::ItemName => &mut self.f_item_name,
            FilterField::TypeMark => &mut self.f_type_mark,
            FilterField::Uom => &mut self.f_uom,
            FilterField::ClassL3Id => &mut self.f_class_l3_id,
        }
    }

    /// Directus filter, or None when no input is set.
    pub fn build_filter(&self) -> Option<Value> {
        let mut parts = Vec::new();

        let q = self.q.trim();
        if !q.is_empty() {
            let mut any = vec![
                icontains("item_name", q),
                icontains("type_mark", q),
                icontains("uom", q),
            ];
            if let Some(n) = numeric(q) {
                any.push(eq("class_l3_id", n));
            }
            parts.extend(or(any));
        }

        for (field, value) in [
            ("item_name", &self.f_item_name),
            ("type_mark", &self.f_type_mark),
            ("uom", &self.f_uom),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                parts.push(icontains(field, value));
            }
        }

        let class = self.f_class_l3_id.trim();
        if !class.is_empty() {
            // non-numeric input narrows to classified rows instead of failing
            parts.push(match numeric(class) {
                Some(n) => eq("class_l3_id", n),
                None => null("class_l3_id", false),
            });
        }

        and(parts)
    }

    /// `field` ascending, or `-field` descending.
    pub fn sort_param(&self) -> String {
        match self.dir {
            SortDir::Asc => self.sort.clone(),
            SortDir::Desc => format!("-{}", self.sort),
        }
    }

    pub fn to_query(&self) -> ItemsQuery {
        ItemsQuery::new()
            .fields(CATALOG_FIELDS)
            .limit(self.limit)
            .page(self.page)
            .sort(self.sort_param())
            .filter(self.build_filter())
            .with_total_count()
    }

    /// Page count when the total is known.
    pub fn pages(&self) -> Option<usize> {
        let total = self.total?;
        if self.limit == 0 {
            return None;
        }
        Some((total as usize).div_ceil(self.limit).max(1))
    }

    pub fn can_prev(&self) -> bool {
        self.page > 1
    }

    pub fn can_next(&self) -> bool {
        self.pages().map_or(true, |pages| self.page < pages)
    }

    pub fn page_info(&self) -> String {
        match self.pages() {
            Some(pages) => format!("page {} / {}", self.page, pages),
            None => format!("page {}", self.page),
        }
    }

    /// Sort indicator for a column header.
    pub fn sort_indicator(&self, field: &str) -> &'static str {
        if self.sort == field {
            self.dir.glyph()
        } else {
            ""
        }
    }

    /// URL query string. Blank filters are left out.
    pub fn to_query_string(&self) -> String {
        let mut out = form_urlencoded::Serializer::new(String::new());
        out.append_pair("page", &self.page.to_string())
            .append_pair("limit", &self.limit.to_string())
            .append_pair("sort", &self.sort)
            .append_pair("dir", self.dir.as_str());
        for (key, value) in [
            ("q", &self.q),
            ("f_item_name", &self.f_item_name),
            ("f_type_mark", &self.f_type_mark),
            ("f_uom", &self.f_uom),
            ("f_class_l3_id", &self.f_class_l3_id),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                out.append_pair(key, value);
            }
        }
        out.finish()
    }

    /// Restore from a URL query string. Missing or invalid values fall back
    /// to defaults; unknown keys are ignored.
    pub fn from_query_string(query: &str) -> Self {
        let mut state = Self::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "page" => state.page = value.parse().ok().filter(|p| *p > 0).unwrap_or(1),
                "limit" => {
                    state.limit = value.parse().ok().filter(|l| *l > 0).unwrap_or(DEFAULT_LIMIT)
                }
                "sort" if !value.is_empty() => state.sort = value,
                "dir" => state.dir = if value == "desc" { SortDir::Desc } else { SortDir::Asc },
                "q" => state.q = value,
                "f_item_name" => state.f_item_name = value,
                "f_type_mark" => state.f_type_mark = value,
                "f_uom" => state.f_uom = value,
                "f_class_l3_id" => state.f_class_l3_id = value,
                _ => {}
            }
        }
        state
    }
}

pub fn reduce(mut state: CatalogState, event: CatalogEvent) -> CatalogState {
    match event {
        CatalogEvent::FilterChanged(field, value) => {
            *state.field_mut(field) = value;
            state.page = 1;
        }
        CatalogEvent::SortBy(field) => {
            if state.sort == field {
                state.dir = state.dir.flipped();
            } else {
                state.sort = field;
                state.dir = SortDir::Asc;
            }
            state.page = 1;
        }
        CatalogEvent::PageSize(limit) => {
            state.limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
            state.page = 1;
        }
        CatalogEvent::PrevPage => {
            if state.can_prev() {
                state.page -= 1;
            }
        }
        CatalogEvent::NextPage => {
            if state.can_next() {
                state.page += 1;
            }
        }
        CatalogEvent::Reset => {
            state = CatalogState {
                limit: state.limit,
                sort: state.sort,
                dir: state.dir,
                total: state.total,
                ..CatalogState::default()
            };
        }
        CatalogEvent::Loaded { total } => {
            state.total = total;
        }
    }
    state
}

pub struct CatalogPage {
    pub state: CatalogState,
    pub rows: Vec<Value>,
    pub status: StatusLine,
    collection: String,
    reload: Debounce,
}

impl CatalogPage {
    pub fn new(collection: impl Into<String>, debounce: Duration) -> Self {
        Self {
            state: CatalogState::default(),
            rows: Vec::new(),
            status: StatusLine::idle(),
            collection: collection.into(),
            reload: Debounce::new(debounce),
        }
    }

    pub fn with_state(mut self, state: CatalogState) -> Self {
        self.state = state;
        self
    }

    pub fn dispatch(&mut self, event: CatalogEvent) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, event);
    }

    /// Typing into a filter schedules a reload after the quiet period.
    pub fn type_filter(&mut self, field: FilterField, value: impl Into<String>, now: Instant) {
        self.dispatch(CatalogEvent::FilterChanged(field, value.into()));
        self.reload.poke(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.reload.deadline()
    }

    /// Reload if the filter quiet period has passed. Returns whether a
    /// request was made.
    pub async fn tick<A: ItemsApi + ?Sized>(&mut self, api: &A, now: Instant) -> bool {
        if !self.reload.fire(now) {
            return false;
        }
        self.state.page = 1;
        self.load(api).await;
        true
    }

    pub async fn load<A: ItemsApi + ?Sized>(&mut self, api: &A) {
        self.status = StatusLine::busy("loading…");
        let query = self.state.to_query();
        match api.read_items(&self.collection, &query).await {
            Ok(page) => {
                let total = page
                    .meta
                    .as_ref()
                    .and_then(|m| m.filter_count.or(m.total_count));
                self.rows = page.data;
                self.dispatch(CatalogEvent::Loaded { total });
                let total_text = total.map_or_else(|| "?".to_string(), |t| t.to_string());
                info!(collection = %self.collection, page = self.state.page, rows = self.rows.len(), "catalog page loaded");
                self.status = StatusLine::ok(format!(
                    "found: {} · shown: {} · page: {}",
                    total_text,
                    self.rows.len(),
                    self.state.page
                ));
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "catalog load failed");
                self.rows.clear();
                self.status = StatusLine::from_client_error("error", &e);
            }
        }
    }

    pub fn table(&self) -> Table {
        let columns: Vec<String> = CATALOG_FIELDS
            .iter()
            .map(|f| format!("{}{}", f, self.state.sort_indicator(f)))
            .collect();
        let mut table = Table::new(columns).empty_text("nothing found");
        for row in &self.rows {
            table.push(TableRow::new(
                CATALOG_FIELDS.iter().map(|f| cell_text(row.get(*f))).collect(),
            ));
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_client::InMemoryPortal;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn state() -> CatalogState {
        CatalogState::default()
    }

    #[test]
    fn test_no_inputs_no_filter() {
        assert_eq!(state().build_filter(), None);
        let blank = reduce(state(), CatalogEvent::FilterChanged(FilterField::Uom, "  ".into()));
        assert_eq!(blank.build_filter(), None);
    }

    #[test]
    fn test_global_numeric_query_adds_class_eq() {
        let s = reduce(state(), CatalogEvent::FilterChanged(FilterField::Query, "42".into()));
        assert_eq!(
            s.build_filter(),
            Some(json!({"_and": [{"_or": [
                {"item_name": {"_icontains": "42"}},
                {"type_mark": {"_icontains": "42"}},
                {"uom": {"_icontains": "42"}},
                {"class_l3_id": {"_eq": 42}},
            ]}]}))
        );
    }

    #[test]
    fn test_field_filters_and_soft_class_filter() {
        let mut s = state();
        s.q = "болт".into();
        s.f_uom = " шт ".into();
        s.f_class_l3_id = "abc".into();
        assert_eq!(
            s.build_filter(),
            Some(json!({"_and": [
                {"_or": [
                    {"item_name": {"_icontains": "болт"}},
                    {"type_mark": {"_icontains": "болт"}},
                    {"uom": {"_icontains": "болт"}},
                ]},
                {"uom": {"_icontains": "шт"}},
                {"class_l3_id": {"_null": false}},
            ]}))
        );
    }

    #[test]
    fn test_sort_toggles_and_resets_page() {
        let mut s = state();
        s.page = 4;
        let s = reduce(s, CatalogEvent::SortBy("item_name".into()));
        assert_eq!((s.dir, s.page), (SortDir::Desc, 1));
        assert_eq!(s.sort_param(), "-item_name");

        let s = reduce(s, CatalogEvent::SortBy("uom".into()));
        assert_eq!(s.dir, SortDir::Asc);
        assert_eq!(s.sort_param(), "uom");
        assert_eq!(s.sort_indicator("uom"), "▲");
        assert_eq!(s.sort_indicator("item_name"), "");
    }

    #[test]
    fn test_pager() {
        let mut s = state();
        assert_eq!(s.pages(), None);
        assert!(s.can_next());
        assert_eq!(s.page_info(), "page 1");

        s = reduce(s, CatalogEvent::Loaded { total: Some(250) });
        assert_eq!(s.pages(), Some(3));
        s = reduce(s, CatalogEvent::NextPage);
        s = reduce(s, CatalogEvent::NextPage);
        s = reduce(s, CatalogEvent::NextPage);
        assert_eq!(s.page, 3);
        assert!(!s.can_next());
        assert_eq!(s.page_info(), "page 3 / 3");

        s = reduce(s, CatalogEvent::Loaded { total: Some(0) });
        assert_eq!(s.pages(), Some(1));
    }

    #[test]
    fn test_url_state() {
        let mut s = state();
        s.q = "гайка м12".into();
        s.f_class_l3_id = "7".into();
        s.page = 2;
        s.dir = SortDir::Desc;
        let qs = s.to_query_string();
        assert!(!qs.contains("f_uom"));

        let back = CatalogState::from_query_string(&format!("?{}", qs));
        assert_eq!(back, s);

        let junk = CatalogState::from_query_string("page=0&limit=x&dir=up&zzz=1");
        assert_eq!(junk, state());
    }

    #[test]
    fn test_reset_clears_filters_keeps_sort() {
        let mut s = state();
        s.q = "x".into();
        s.f_type_mark = "y".into();
        s.page = 5;
        s = reduce(s, CatalogEvent::SortBy("uom".into()));
        let s = reduce(s, CatalogEvent::Reset);
        assert_eq!(s.q, "");
        assert_eq!(s.f_type_mark, "");
        assert_eq!(s.page, 1);
        assert_eq!(s.sort, "uom");
    }

    fn portal() -> InMemoryPortal {
        let rows = (1..=5)
            .map(|i| {
                json!({
                    "id": i,
                    "item_name": format!("Болт {}", i),
                    "type_mark": "ГОСТ 7798",
                    "uom": if i % 2 == 0 { "кг" } else { "шт" },
                    "class_l3_id": i,
                })
            })
            .collect();
        InMemoryPortal::new().with_collection("nomenclature_spec_all_v1", rows)
    }

    #[tokio::test]
    async fn test_load_uses_filtered_count() {
        let portal = portal();
        let mut page = CatalogPage::new("nomenclature_spec_all_v1", Duration::from_millis(300));
        page.dispatch(CatalogEvent::FilterChanged(FilterField::Uom, "шт".into()));
        page.dispatch(CatalogEvent::PageSize(2));
        page.load(&portal).await;

        assert_eq!(page.state.total, Some(3));
        assert_eq!(page.status.text, "found: 3 · shown: 2 · page: 1");
        assert_eq!(page.table().rows[0].cells[0], "Болт 1");
        assert_eq!(page.table().columns[0], "item_name▲");
    }

    #[tokio::test]
    async fn test_typing_debounces_reload() {
        let portal = portal();
        let mut page = CatalogPage::new("nomenclature_spec_all_v1", Duration::from_millis(300));
        page.state.page = 3;
        let t0 = Instant::now();

        page.type_filter(FilterField::Query, "Бол", t0);
        page.type_filter(FilterField::Query, "Болт 4", t0 + Duration::from_millis(200));
        assert!(!page.tick(&portal, t0 + Duration::from_millis(400)).await);
        assert!(page.tick(&portal, t0 + Duration::from_millis(500)).await);
        assert!(!page.tick(&portal, t0 + Duration::from_millis(900)).await);

        assert_eq!(portal.calls().len(), 1);
        assert_eq!(page.state.page, 1);
        assert_eq!(page.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_load_failure() {
        let portal = portal();
        portal.fail_next(403, "forbidden");
        let mut page = CatalogPage::new("nomenclature_spec_all_v1", Duration::from_millis(300));
        page.load(&portal).await;
        assert_eq!(page.status.text, "error: HTTP 403");
        assert!(page.rows.is_empty());
    }

    proptest! {
        #[test]
        fn prop_pager_bounds(total in 0u64..10_000, limit in 1usize..500, clicks in 0usize..200) {
            let mut s = reduce(state(), CatalogEvent::PageSize(limit));
            s = reduce(s, CatalogEvent::Loaded { total: Some(total) });
            for _ in 0..clicks {
                s = reduce(s, CatalogEvent::NextPage);
            }
            let pages = s.pages().unwrap();
            prop_assert!(pages >= 1);
            prop_assert!(s.page >= 1 && s.page <= pages);
            prop_assert_eq!(s.can_next(), s.page < pages);
        }
    }
}
