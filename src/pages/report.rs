//! Start page: nomenclature-by-object report and the portal health line.

use portal_client::OpsApi;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::cell_text;
use crate::present::{Table, TableRow};
use crate::status::StatusLine;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectCount {
    pub object_name: String,
    pub cnt: u64,
}

/// Count as a number whether it arrived as a number or numeric text.
fn count_of(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalise report rows: the count column is `cnt`, `count` or `count_id`
/// depending on the query that produced it. Sorted by count, largest first.
pub fn normalize(rows: &[Value]) -> Vec<ObjectCount> {
    let mut out: Vec<ObjectCount> = rows
        .iter()
        .map(|row| ObjectCount {
            object_name: cell_text(row.get("object_name")),
            cnt: ["cnt", "count", "count_id"]
                .iter()
                .find_map(|key| count_of(row.get(*key)))
                .unwrap_or(0),
        })
        .collect();
    out.sort_by(|a, b| b.cnt.cmp(&a.cnt));
    out
}

/// `12345` -> `12 345`
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectReport {
    pub rows: Vec<ObjectCount>,
    pub total: u64,
}

impl ObjectReport {
    pub fn from_rows(raw: &[Value]) -> Self {
        let rows = normalize(raw);
        let total = rows.iter().map(|r| r.cnt).sum();
        Self { rows, total }
    }

    pub fn summary(&self) -> String {
        format!("rows: {} • total: {}", self.rows.len(), group_thousands(self.total))
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new(["object", "count"]).empty_text("no data");
        for row in &self.rows {
            table.push(TableRow::new(vec![
                row.object_name.clone(),
                group_thousands(row.cnt),
            ]));
        }
        table
    }
}

/// Fetch the report; failures become an error status.
pub async fn load_report<A: OpsApi + ?Sized>(api: &A) -> (ObjectReport, StatusLine) {
    match api.nomenclature_by_object().await {
        Ok(raw) => {
            let report = ObjectReport::from_rows(&raw);
            let status = StatusLine::ok(report.summary());
            (report, status)
        }
        Err(e) => {
            warn!(error = %e, "report load failed");
            (ObjectReport::default(), StatusLine::from_client_error("error", &e))
        }
    }
}

/// One-line health of the portal API and its search backend.
pub async fn health_line<A: OpsApi + ?Sized>(api: &A) -> StatusLine {
    match api.health().await {
        Ok(body) => {
            let ok = body.get("ok").and_then(Value::as_bool).unwrap_or(false);
            let backend = cell_text(body.get("opensearch_status"));
            let backend = if backend.is_empty() { "?".to_string() } else { backend };
            if ok {
                StatusLine::ok(format!("ok (search backend: {})", backend))
            } else {
                StatusLine::error(format!("degraded (search backend: {})", backend))
            }
        }
        Err(e) => StatusLine::from_client_error("unreachable", &e),
    }
}
