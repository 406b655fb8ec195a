//! Response envelopes.
//!
//! Every envelope defaults its collections to empty so that an unexpected
//! body shape degrades to "no rows" rather than a failed page.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `GET /items/{collection}` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ItemsMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemsMeta {
    #[serde(default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub filter_count: Option<u64>,
}

impl ItemsPage {
    pub fn total_count(&self) -> Option<u64> {
        self.meta.as_ref().and_then(|m| m.total_count)
    }
}

/// Search request against `/v1/search`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub index: Option<String>,
    pub size: Option<usize>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
}

/// One search hit: the stored document plus its score when known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source: Value,
}

/// Normalised search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<SearchHit>,
}

impl SearchHits {
    /// Accept the portal shape `{ rows, total }` or a raw search-engine body
    /// `{ hits: { total: { value } | n, hits: [{ _source, _score }] } }`.
    pub fn from_value(body: &Value) -> Self {
        if let Some(rows) = body.get("rows").and_then(Value::as_array) {
            return Self {
                total: body
                    .get("total")
                    .and_then(Value::as_u64)
                    .unwrap_or(rows.len() as u64),
                hits: rows
                    .iter()
                    .map(|r| SearchHit {
                        score: None,
                        source: r.clone(),
                    })
                    .collect(),
            };
        }

        let raw_hits = body
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = body
            .pointer("/hits/total/value")
            .and_then(Value::as_u64)
            .or_else(|| body.pointer("/hits/total").and_then(Value::as_u64))
            .or_else(|| body.get("total").and_then(Value::as_u64))
            .unwrap_or(raw_hits.len() as u64);

        Self {
            total,
            hits: raw_hits
                .iter()
                .map(|h| SearchHit {
                    score: h.get("_score").and_then(Value::as_f64),
                    source: h.get("_source").cloned().unwrap_or_else(|| Value::Object(Default::default())),
                })
                .collect(),
        }
    }

    pub fn sources(&self) -> impl Iterator<Item = &Value> {
        self.hits.iter().map(|h| &h.source)
    }
}

/// Row of the `v_nomenclature_spec_pairs_v1` view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairRow {
    pub id: i64,
    /// Current name (server mirrors the first 150 chars of the correction)
    #[serde(default)]
    pub name_tek: Option<String>,
    /// Corrected name, the editable column
    #[serde(default)]
    pub name_tep_korr: Option<String>,
}

/// `GET /pairs_list` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairsPage {
    #[serde(default)]
    pub rows: Vec<PairRow>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: Option<usize>,
}

/// `GET /pairs_rows` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairRows {
    #[serde(default)]
    pub rows: Vec<PairRow>,
}

/// Which search index a reindex request rebuilds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexTarget {
    /// Pairs index (`POST /reindex`)
    Pairs,
    /// Nomenclature index (`POST /reindex_nomen`)
    Nomenclature,
}

impl ReindexTarget {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Pairs => "reindex",
            Self::Nomenclature => "reindex_nomen",
        }
    }
}
