//! Page controllers.
//!
//! Every page owns a state struct. Pure view events go through the page's
//! `reduce`; loads and saves are async methods on the page that talk to the
//! collaborator traits and feed their outcome back as events.

pub mod catalog;
pub mod hierarchy;
pub mod nomenclature;
pub mod pairs;
pub mod report;
pub mod search;

use class_tree::HierarchyRow;
use portal_client::{read_all_items, ItemsApi, ItemsQuery};
use serde_json::Value;
use tracing::{debug, warn};

/// Sibling order of tree collections.
pub const TREE_SORT: &str = "l1_num,l2_num,l3_num,l4_num,level";

/// Decode raw records into rows, skipping records without a usable id.
pub fn decode_rows(values: Vec<Value>) -> Vec<HierarchyRow> {
    let total = values.len();
    let rows: Vec<HierarchyRow> = values
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<HierarchyRow>(v) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(error = %e, "skipping undecodable row");
                None
            }
        })
        .collect();
    if rows.len() != total {
        warn!(total, decoded = rows.len(), "some rows were skipped");
    }
    rows
}

/// Load a whole tree collection in `TREE_SORT` order with an offset loop.
pub async fn load_tree_rows<A>(
    api: &A,
    collection: &str,
    fields: &[String],
    page_size: usize,
) -> portal_client::Result<Vec<HierarchyRow>>
where
    A: ItemsApi + ?Sized,
{
    let query = ItemsQuery::new()
        .fields(fields.iter().cloned())
        .sort(TREE_SORT);
    let values = read_all_items(api, collection, &query, page_size, |loaded| {
        debug!(loaded, "loading rows");
    })
    .await?;
    Ok(decode_rows(values))
}

/// Text of a JSON scalar as shown in a table cell.
pub(crate) fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
