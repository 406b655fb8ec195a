//! HttpPortalClient against a local mock of the Directus and portal APIs.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, patch, post},
    Router,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use portal_client::{
    HttpPortalClient, ItemsApi, ItemsQuery, OpsApi, ReindexTarget, SearchApi, SearchQuery,
};

async fn read_items(
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    Json(json!({
        "data": [{ "collection": collection, "params": params }],
        "meta": { "total_count": 41 }
    }))
}

async fn update_item(
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Json<Value> {
    Json(json!({ "data": { "collection": collection, "id": id, "patch": patch } }))
}

async fn health() -> &'static str {
    "ok"
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "total": 3,
        "rows": [{ "q": params.get("q"), "index": params.get("index"), "size": params.get("size") }]
    }))
}

async fn pairs_update(Path(id): Path<i64>) -> impl IntoResponse {
    if id == 13 {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string()).into_response();
    }
    Json(json!({ "id": id, "name_tek": "new", "name_tep_korr": "new" })).into_response()
}

async fn pairs_rows(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let rows: Vec<Value> = params
        .get("ids")
        .map(|s| s.split(',').filter_map(|p| p.parse::<i64>().ok()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|id| json!({ "id": id }))
        .collect();
    Json(json!({ "rows": rows }))
}

async fn reindex() -> Json<Value> {
    Json(json!({ "ok": true, "started": true }))
}

async fn report() -> Json<Value> {
    Json(json!([{ "object_name": "A", "cnt": 2 }]))
}

async fn spawn_mock() -> HttpPortalClient {
    let app = Router::new()
        .route("/directus/items/:collection", get(read_items))
        .route("/directus/items/:collection/:id", patch(update_item))
        .route("/api/health", get(health))
        .route("/api/v1/search", get(search))
        .route("/api/pairs_update/:id", patch(pairs_update))
        .route("/api/pairs_rows", get(pairs_rows))
        .route("/api/reindex_nomen", post(reindex))
        .route("/api/reports/nomenclature_by_object", get(report));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    HttpPortalClient::new(
        &format!("http://{}/api", addr),
        &format!("http://{}/directus", addr),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_read_items_sends_query_parameters() {
    let client = spawn_mock().await;
    let query = ItemsQuery::new()
        .fields(["id", "level"])
        .limit(2000)
        .offset(0)
        .sort("l1_num,level")
        .with_total_count();

    let page = client.read_items("class_tree_v1", &query).await.unwrap();

    assert_eq!(page.total_count(), Some(41));
    let params = &page.data[0]["params"];
    assert_eq!(page.data[0]["collection"], "class_tree_v1");
    assert_eq!(params["fields"], "id,level");
    assert_eq!(params["limit"], "2000");
    assert_eq!(params["sort"], "l1_num,level");
    assert_eq!(params["meta"], "total_count,filter_count");
}

#[tokio::test]
async fn test_update_item_unwraps_data_and_encodes_id() {
    let client = spawn_mock().await;
    let updated = client
        .update_item("class_tree_nomen_v1", "L4 x", json!({ "approved": true }))
        .await
        .unwrap();

    assert_eq!(updated["id"], "L4 x");
    assert_eq!(updated["patch"], json!({ "approved": true }));
}

#[tokio::test]
async fn test_non_json_success_body_is_kept_raw() {
    let client = spawn_mock().await;
    let body = client.health().await.unwrap();
    assert_eq!(body, json!({ "_raw": "ok" }));
}

#[tokio::test]
async fn test_search_passes_index_and_size() {
    let client = spawn_mock().await;
    let hits = client
        .search(&SearchQuery::new("l4_code:01.02").index("class_tree_nomen_v1").size(50))
        .await
        .unwrap();

    assert_eq!(hits.total, 3);
    assert_eq!(
        hits.hits[0].source,
        json!({ "q": "l4_code:01.02", "index": "class_tree_nomen_v1", "size": "50" })
    );
}

#[tokio::test]
async fn test_error_status_carries_body() {
    let client = spawn_mock().await;
    let err = client.pairs_update(13, "x").await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "HTTP 500: boom");

    let row = client.pairs_update(7, "new").await.unwrap();
    assert_eq!(row.name_tek.as_deref(), Some("new"));
}

#[tokio::test]
async fn test_missing_route_is_http_error() {
    let client = spawn_mock().await;
    let err = client.pairs_list(10, 0).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_ops_endpoints() {
    let client = spawn_mock().await;

    let rows = client.pairs_rows(&[3, 1]).await.unwrap();
    assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3, 1]);
    assert!(client.pairs_rows(&[]).await.unwrap().is_empty());

    let started = client.reindex(ReindexTarget::Nomenclature).await.unwrap();
    assert_eq!(started["started"], true);

    let report = client.nomenclature_by_object().await.unwrap();
    assert_eq!(report.len(), 1);
}
