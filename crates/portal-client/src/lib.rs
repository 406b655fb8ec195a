//! Portal collaborator traits - the API boundary between page controllers
//! and the services behind the portal.
//!
//! - `ItemsApi` reads and patches Directus collections (row source / sink)
//! - `SearchApi` queries the search index through the portal API
//! - `OpsApi` covers the portal's own endpoints (pairs, reports, reindex)
//!
//! `HttpPortalClient` implements all three over reqwest; `InMemoryPortal`
//! implements them over in-process data for tests and offline demos.

pub mod error;
pub mod http;
pub mod memory;
pub mod query;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

pub use error::ClientError;
pub use http::HttpPortalClient;
pub use memory::InMemoryPortal;
pub use query::ItemsQuery;
pub use types::{
    ItemsMeta, ItemsPage, PairRow, PairRows, PairsPage, ReindexTarget, SearchHit, SearchHits,
    SearchQuery,
};

pub type Result<T> = std::result::Result<T, ClientError>;

#[async_trait]
pub trait ItemsApi: Send + Sync {
    /// Read one page of a collection.
    async fn read_items(&self, collection: &str, query: &ItemsQuery) -> Result<ItemsPage>;

    /// Patch fields of one record. Returns the updated record
    /// (the `data` member of the response when present).
    async fn update_item(&self, collection: &str, id: &str, patch: Value) -> Result<Value>;
}

#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchHits>;
}

#[async_trait]
pub trait OpsApi: Send + Sync {
    /// Liveness of the portal API and its search backend.
    async fn health(&self) -> Result<Value>;

    async fn pairs_list(&self, limit: usize, offset: usize) -> Result<PairsPage>;

    /// Fetch pair rows by id, ordered by id.
    async fn pairs_rows(&self, ids: &[i64]) -> Result<Vec<PairRow>>;

    /// Store a corrected name. The response echoes the stored row.
    async fn pairs_update(&self, id: i64, name_tep_korr: &str) -> Result<PairRow>;

    /// Start a background reindex.
    async fn reindex(&self, target: ReindexTarget) -> Result<Value>;

    /// `[{ object_name, cnt }]` rows of the nomenclature-by-object report.
    async fn nomenclature_by_object(&self) -> Result<Vec<Value>>;
}

/// Read every page of a collection with an offset loop.
///
/// Stops at the first page shorter than `page_size`. `on_page` sees the
/// running row count after each page.
pub async fn read_all_items<A>(
    api: &A,
    collection: &str,
    query: &ItemsQuery,
    page_size: usize,
    mut on_page: impl FnMut(usize) + Send,
) -> Result<Vec<Value>>
where
    A: ItemsApi + ?Sized,
{
    let page_size = page_size.max(1);
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
        let page_query = query.clone().limit(page_size).offset(offset);
        let page = api.read_items(collection, &page_query).await?;
        let count = page.data.len();
        all.extend(page.data);
        on_page(all.len());
        tracing::debug!(collection, offset, count, total = all.len(), "page loaded");

        if count < page_size {
            break;
        }
        offset += page_size;
    }

    Ok(all)
}
