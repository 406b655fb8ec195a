//! HTTP implementation of the portal collaborators.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::query::ItemsQuery;
use crate::types::{
    ItemsPage, PairRow, PairRows, PairsPage, ReindexTarget, SearchHits, SearchQuery,
};
use crate::{ItemsApi, OpsApi, Result, SearchApi};

/// reqwest-backed client for the Directus API and the portal API.
#[derive(Debug, Clone)]
pub struct HttpPortalClient {
    http: Client,
    api_base: Url,
    directus_base: Url,
}

impl HttpPortalClient {
    /// Create a client. `api_base` is the portal API root (e.g.
    /// `http://localhost:8010`), `directus_base` the Directus root.
    pub fn new(api_base: &str, directus_base: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: Url::parse(api_base)?,
            directus_base: Url::parse(directus_base)?,
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn directus_base(&self) -> &Url {
        &self.directus_base
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Accept", "application/json")
    }

    /// Send and read the body as JSON.
    ///
    /// Non-2xx statuses become `ClientError::Http` with the raw body. A 2xx
    /// body that is not JSON is kept as `{"_raw": text}`.
    async fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().clone();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "request failed");
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(%url, status = status.as_u16(), bytes = text.len(), "request ok");
        Ok(serde_json::from_str(&text).unwrap_or_else(|_| json!({ "_raw": text })))
    }

    async fn get_json(&self, url: Url) -> Result<Value> {
        self.send(self.request(Method::GET, url)).await
    }
}

/// Append path segments to a base URL, percent-encoding each segment.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::Url(format!("{} cannot be a base", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Decode an envelope, falling back to its default on a shape mismatch.
fn decode_lenient<T: DeserializeOwned + Default>(body: Value, what: &str) -> T {
    match serde_json::from_value(body) {
        Ok(v) => v,
        Err(e) => {
            warn!(what, error = %e, "unexpected response shape, using empty result");
            T::default()
        }
    }
}

/// Unwrap Directus' `{ data: ... }` envelope.
fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[async_trait]
impl ItemsApi for HttpPortalClient {
    async fn read_items(&self, collection: &str, query: &ItemsQuery) -> Result<ItemsPage> {
        let mut url = endpoint(&self.directus_base, &["items", collection])?;
        url.query_pairs_mut().extend_pairs(query.to_pairs());
        let body = self.get_json(url).await?;
        Ok(decode_lenient(body, "items page"))
    }

    async fn update_item(&self, collection: &str, id: &str, patch: Value) -> Result<Value> {
        let url = endpoint(&self.directus_base, &["items", collection, id])?;
        let body = self
            .send(self.request(Method::PATCH, url).json(&patch))
            .await?;
        Ok(unwrap_data(body))
    }
}

#[async_trait]
impl SearchApi for HttpPortalClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits> {
        let mut url = endpoint(&self.api_base, &["v1", "search"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.q);
            if let Some(index) = &query.index {
                pairs.append_pair("index", index);
            }
            if let Some(size) = query.size {
                pairs.append_pair("size", &size.to_string());
            }
        }
        let body = self.get_json(url).await?;
        Ok(SearchHits::from_value(&body))
    }
}

#[async_trait]
impl OpsApi for HttpPortalClient {
    async fn health(&self) -> Result<Value> {
        self.get_json(endpoint(&self.api_base, &["health"])?).await
    }

    async fn pairs_list(&self, limit: usize, offset: usize) -> Result<PairsPage> {
        let mut url = endpoint(&self.api_base, &["pairs_list"])?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let body = self.get_json(url).await?;
        Ok(decode_lenient(body, "pairs page"))
    }

    async fn pairs_rows(&self, ids: &[i64]) -> Result<Vec<PairRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = endpoint(&self.api_base, &["pairs_rows"])?;
        url.query_pairs_mut().append_pair("ids", &joined);
        let body = self.get_json(url).await?;
        Ok(decode_lenient::<PairRows>(body, "pair rows").rows)
    }

    async fn pairs_update(&self, id: i64, name_tep_korr: &str) -> Result<PairRow> {
        let url = endpoint(&self.api_base, &["pairs_update", &id.to_string()])?;
        let body = self
            .send(
                self.request(Method::PATCH, url)
                    .json(&json!({ "name_tep_korr": name_tep_korr })),
            )
            .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn reindex(&self, target: ReindexTarget) -> Result<Value> {
        let url = endpoint(&self.api_base, &[target.path()])?;
        self.send(self.request(Method::POST, url)).await
    }

    async fn nomenclature_by_object(&self) -> Result<Vec<Value>> {
        let url = endpoint(&self.api_base, &["reports", "nomenclature_by_object"])?;
        let body = self.get_json(url).await?;
        Ok(match body {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        })
    }
}
