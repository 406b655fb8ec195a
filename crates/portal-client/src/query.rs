//! Directus item queries and JSON filter construction.

use serde_json::{json, Value};

/// Parameters of `GET /items/{collection}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemsQuery {
    pub fields: Vec<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// 1-based page number (alternative to `offset`)
    pub page: Option<usize>,
    /// Comma-separated sort fields, `-field` for descending
    pub sort: Option<String>,
    pub filter: Option<Value>,
    /// Ask for `meta.total_count` and `meta.filter_count`
    pub with_total_count: bool,
}

impl ItemsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = Some(page);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filter(mut self, filter: Option<Value>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.with_total_count = true;
        self
    }

    /// Query-string pairs in a stable order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if !self.fields.is_empty() {
            pairs.push(("fields", self.fields.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.clone()));
        }
        if self.with_total_count {
            pairs.push(("meta", "total_count,filter_count".to_string()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("filter", filter.to_string()));
        }
        pairs
    }
}

// =============================================================================
// FILTER BUILDERS
// =============================================================================

/// `{ field: { _icontains: value } }`
pub fn icontains(field: &str, value: &str) -> Value {
    json!({ field: { "_icontains": value } })
}

/// `{ field: { _eq: value } }`
pub fn eq(field: &str, value: impl Into<Value>) -> Value {
    json!({ field: { "_eq": value.into() } })
}

/// `{ field: { _null: is_null } }`
pub fn null(field: &str, is_null: bool) -> Value {
    json!({ field: { "_null": is_null } })
}

/// `{ _and: [...] }`, or None for an empty list
pub fn and(parts: Vec<Value>) -> Option<Value> {
    if parts.is_empty() {
        None
    } else {
        Some(json!({ "_and": parts }))
    }
}

/// `{ _or: [...] }`, or None for an empty list
pub fn or(parts: Vec<Value>) -> Option<Value> {
    if parts.is_empty() {
        None
    } else {
        Some(json!({ "_or": parts }))
    }
}
