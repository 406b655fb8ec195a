//! In-process portal for tests and offline runs.
//!
//! Evaluates the Directus filter subset the pages emit (`_and`, `_or`,
//! `_icontains`, `_eq`, `_null`), multi-field sort and offset/page paging.
//! Failures can be queued with [`InMemoryPortal::fail_next`]; every call is
//! logged so tests can assert on request counts.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::ClientError;
use crate::query::ItemsQuery;
use crate::types::{
    ItemsMeta, ItemsPage, PairRow, PairsPage, ReindexTarget, SearchHit, SearchHits, SearchQuery,
};
use crate::{ItemsApi, OpsApi, Result, SearchApi};

const NAME_TEK_MAX: usize = 150;
const PAIRS_LIMIT_MAX: usize = 2000;
const DEFAULT_SEARCH_SIZE: usize = 10;

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Value>>,
    indexes: HashMap<String, Vec<Value>>,
    pairs: BTreeMap<i64, PairRow>,
    report: Vec<Value>,
    /// One slot per upcoming call; `None` lets the call through
    failures: VecDeque<Option<(u16, String)>>,
    calls: Vec<String>,
    reindexed: Vec<ReindexTarget>,
}

#[derive(Debug, Default)]
pub struct InMemoryPortal {
    state: Mutex<State>,
}

impl InMemoryPortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, name: &str, rows: Vec<Value>) -> Self {
        self.lock().collections.insert(name.to_string(), rows);
        self
    }

    pub fn with_index(self, name: &str, docs: Vec<Value>) -> Self {
        self.lock().indexes.insert(name.to_string(), docs);
        self
    }

    pub fn with_pairs(self, rows: Vec<PairRow>) -> Self {
        {
            let mut state = self.lock();
            for row in rows {
                state.pairs.insert(row.id, row);
            }
        }
        self
    }

    pub fn with_report(self, rows: Vec<Value>) -> Self {
        self.lock().report = rows;
        self
    }

    /// Make the next call fail with this status and body.
    pub fn fail_next(&self, status: u16, body: impl Into<String>) {
        self.lock().failures.push_back(Some((status, body.into())));
    }

    /// Let the next call through untouched; queue it ahead of `fail_next`
    /// to fail a later call instead.
    pub fn pass_next(&self) {
        self.lock().failures.push_back(None);
    }

    /// Log of calls as `"METHOD path"` strings, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Current contents of a collection.
    pub fn collection(&self, name: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pair(&self, id: i64) -> Option<PairRow> {
        self.lock().pairs.get(&id).cloned()
    }

    pub fn reindexed(&self) -> Vec<ReindexTarget> {
        self.lock().reindexed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Log the call and pop a queued failure, if any.
    fn enter(&self, call: String) -> Result<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(call);
        match state.failures.pop_front().flatten() {
            Some((status, body)) => Err(ClientError::Http { status, body }),
            None => Ok(state),
        }
    }
}

fn not_found(what: &str) -> ClientError {
    ClientError::Http {
        status: 404,
        body: json!({ "errors": [{ "message": format!("{} not found", what) }] }).to_string(),
    }
}

#[async_trait]
impl ItemsApi for InMemoryPortal {
    async fn read_items(&self, collection: &str, query: &ItemsQuery) -> Result<ItemsPage> {
        let state = self.enter(format!("GET items/{}", collection))?;
        let rows = state.collections.get(collection).cloned().unwrap_or_default();
        let total = rows.len() as u64;

        let mut matched: Vec<Value> = rows
            .into_iter()
            .filter(|row| query.filter.as_ref().map_or(true, |f| matches_filter(f, row)))
            .collect();
        if let Some(sort) = &query.sort {
            sort_rows(&mut matched, sort);
        }
        let filtered = matched.len() as u64;

        let offset = match (query.offset, query.page, query.limit) {
            (Some(offset), _, _) => offset,
            (None, Some(page), Some(limit)) => page.saturating_sub(1) * limit,
            _ => 0,
        };
        let data: Vec<Value> = matched
            .into_iter()
            .skip(offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|row| project(row, &query.fields))
            .collect();

        Ok(ItemsPage {
            data,
            meta: query.with_total_count.then(|| ItemsMeta {
                total_count: Some(total),
                filter_count: Some(filtered),
            }),
        })
    }

    async fn update_item(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let mut state = self.enter(format!("PATCH items/{}/{}", collection, id))?;
        let record = state
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|row| id_matches(row, id)))
            .ok_or_else(|| not_found(&format!("{}/{}", collection, id)))?;

        if let (Value::Object(target), Value::Object(fields)) = (&mut *record, patch) {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        Ok(record.clone())
    }
}

#[async_trait]
impl SearchApi for InMemoryPortal {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits> {
        let index = query.index.clone().unwrap_or_default();
        let state = self.enter(format!("GET search/{}", index))?;
        let docs = state.indexes.get(&index).cloned().unwrap_or_default();

        let (field, needle) = match query.q.split_once(':') {
            Some((f, v)) if !f.is_empty() && !f.contains(' ') => (Some(f), v),
            _ => (None, query.q.as_str()),
        };
        let needle = needle.trim().to_lowercase();

        let matched: Vec<Value> = docs
            .into_iter()
            .filter(|doc| match field {
                Some(f) => doc.get(f).map_or(false, |v| contains_ci(v, &needle)),
                None => doc
                    .as_object()
                    .map_or(false, |m| m.values().any(|v| contains_ci(v, &needle))),
            })
            .collect();

        let total = matched.len() as u64;
        Ok(SearchHits {
            total,
            hits: matched
                .into_iter()
                .take(query.size.unwrap_or(DEFAULT_SEARCH_SIZE))
                .map(|source| SearchHit {
                    score: Some(1.0),
                    source,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl OpsApi for InMemoryPortal {
    async fn health(&self) -> Result<Value> {
        self.enter("GET health".to_string())?;
        Ok(json!({ "ok": true, "opensearch_status": 200 }))
    }

    async fn pairs_list(&self, limit: usize, offset: usize) -> Result<PairsPage> {
        let state = self.enter(format!("GET pairs_list?limit={}&offset={}", limit, offset))?;
        let limit = limit.clamp(1, PAIRS_LIMIT_MAX);
        Ok(PairsPage {
            rows: state.pairs.values().skip(offset).take(limit).cloned().collect(),
            total: state.pairs.len() as u64,
            limit: Some(limit),
            offset: Some(offset),
        })
    }

    async fn pairs_rows(&self, ids: &[i64]) -> Result<Vec<PairRow>> {
        let state = self.enter(format!("GET pairs_rows?n={}", ids.len()))?;
        Ok(state
            .pairs
            .values()
            .filter(|row| ids.contains(&row.id))
            .cloned()
            .collect())
    }

    async fn pairs_update(&self, id: i64, name_tep_korr: &str) -> Result<PairRow> {
        let mut state = self.enter(format!("PATCH pairs_update/{}", id))?;
        let row = state
            .pairs
            .get_mut(&id)
            .ok_or_else(|| not_found(&format!("pair {}", id)))?;
        row.name_tep_korr = Some(name_tep_korr.to_string());
        row.name_tek = Some(name_tep_korr.chars().take(NAME_TEK_MAX).collect());
        Ok(row.clone())
    }

    async fn reindex(&self, target: ReindexTarget) -> Result<Value> {
        let mut state = self.enter(format!("POST {}", target.path()))?;
        state.reindexed.push(target);
        Ok(json!({ "ok": true, "started": true }))
    }

    async fn nomenclature_by_object(&self) -> Result<Vec<Value>> {
        let state = self.enter("GET reports/nomenclature_by_object".to_string())?;
        Ok(state.report.clone())
    }
}

// =============================================================================
// FILTER / SORT EVALUATION
// =============================================================================

fn matches_filter(filter: &Value, row: &Value) -> bool {
    let Some(clauses) = filter.as_object() else {
        return true;
    };
    clauses.iter().all(|(key, cond)| match key.as_str() {
        "_and" => cond
            .as_array()
            .map_or(true, |parts| parts.iter().all(|p| matches_filter(p, row))),
        "_or" => cond
            .as_array()
            .map_or(true, |parts| parts.iter().any(|p| matches_filter(p, row))),
        field => matches_field(row.get(field), cond),
    })
}

fn matches_field(value: Option<&Value>, cond: &Value) -> bool {
    let Some(ops) = cond.as_object() else {
        return true;
    };
    let value = value.unwrap_or(&Value::Null);
    ops.iter().all(|(op, arg)| match op.as_str() {
        "_icontains" => contains_ci(value, &scalar_text(arg).to_lowercase()),
        "_eq" => !value.is_null() && scalar_text(value) == scalar_text(arg),
        "_null" => value.is_null() == arg.as_bool().unwrap_or(true),
        _ => true,
    })
}

fn contains_ci(value: &Value, needle_lower: &str) -> bool {
    !value.is_null() && scalar_text(value).to_lowercase().contains(needle_lower)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn id_matches(row: &Value, id: &str) -> bool {
    row.get("id").map_or(false, |v| scalar_text(v) == id)
}

fn sort_rows(rows: &mut [Value], sort: &str) {
    let keys: Vec<(&str, bool)> = sort
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| match k.strip_prefix('-') {
            Some(field) => (field, true),
            None => (k, false),
        })
        .collect();

    rows.sort_by(|a, b| {
        for (field, desc) in &keys {
            let ord = cmp_values(a.get(*field), b.get(*field));
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Nulls first, then numbers numerically, everything else as text.
fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => scalar_text(a).cmp(&scalar_text(b)),
        },
    }
}

fn project(row: Value, fields: &[String]) -> Value {
    if fields.is_empty() || fields.iter().any(|f| f == "*") {
        return row;
    }
    match row {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(k, _)| fields.iter().any(|f| f == k))
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}
