//! Read-only catalog queries: paginated listing and batch-by-id
//! lookup, normalized into [`RecordState`] snapshots.

use bulkpress_core::record::{RecordState, VariantState};
use bulkpress_core::transformation::round2;

use crate::api::GraphqlExecute;
use crate::batch::{execute_batched, BatchCall, BatchConfig};
use crate::transport::Transport;
use crate::CatalogError;

/// Ids per batch-by-id lookup call.
const NODES_CHUNK_SIZE: usize = 50;

/// Paginated product listing with optional status/tag filtering.
pub const PRODUCTS_QUERY: &str = "\
query products($first: Int, $last: Int, $after: String, $before: String, $query: String) {
  products(first: $first, last: $last, after: $after, before: $before, query: $query) {
    edges {
      node {
        id
        title
        status
        tags
        variants(first: 100) {
          edges { node { id title price } }
        }
      }
    }
    pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
  }
}";

/// Batch-by-id record lookup.
pub const NODES_QUERY: &str = "\
query nodes($ids: [ID!]!) {
  nodes(ids: $ids) {
    ... on Product {
      id
      title
      status
      tags
      variants(first: 100) {
        edges { node { id title price } }
      }
    }
  }
}";

/// Shop-wide currency code.
pub const SHOP_CURRENCY_QUERY: &str = "query { shop { currencyCode } }";

/// Listing filter; both parts are optional and AND-combined.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Remote status label, e.g. `"ACTIVE"`.
    pub status: Option<String>,
    /// Records must carry this tag.
    pub tag: Option<String>,
}

impl ListFilter {
    /// Render the remote search-query string, or `None` when unfiltered.
    fn to_query_string(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(status) = &self.status {
            parts.push(format!("status:{status}"));
        }
        if let Some(tag) = &self.tag {
            parts.push(format!("tag:'{tag}'"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" AND "))
        }
    }
}

/// Cursor position for a listing request.
#[derive(Debug, Clone, Default)]
pub enum PageCursor {
    /// First page.
    #[default]
    Start,
    /// Page after the given cursor (forward).
    After(String),
    /// Page before the given cursor (backward).
    Before(String),
}

/// One page of listed records.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<RecordState>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// List records matching `filter`, one page at a time.
pub async fn list_records<E: GraphqlExecute>(
    exec: &E,
    filter: &ListFilter,
    page_size: u32,
    cursor: &PageCursor,
) -> Result<RecordPage, CatalogError> {
    let mut variables = serde_json::json!({
        "query": filter.to_query_string(),
    });
    match cursor {
        PageCursor::Start => {
            variables["first"] = serde_json::json!(page_size);
        }
        PageCursor::After(after) => {
            variables["first"] = serde_json::json!(page_size);
            variables["after"] = serde_json::json!(after);
        }
        PageCursor::Before(before) => {
            variables["last"] = serde_json::json!(page_size);
            variables["before"] = serde_json::json!(before);
        }
    }

    let response = exec.execute(PRODUCTS_QUERY, variables).await?;
    if !response.errors.is_empty() {
        return Err(CatalogError::Graphql(response.error_text()));
    }
    let data = response
        .data
        .ok_or_else(|| CatalogError::Malformed("response missing data".into()))?;

    parse_record_page(&data["products"])
}

/// Fetch full records for a set of ids, for preview computation.
///
/// Ids are chunked and issued through the windowed batch helper so a
/// large selection paces itself against the rate budget. Ids unknown
/// to the remote side are skipped with a warning.
pub async fn fetch_by_ids<T: GraphqlExecute>(
    transport: &Transport<T>,
    ids: &[String],
) -> Result<Vec<RecordState>, CatalogError> {
    let calls: Vec<BatchCall> = ids
        .chunks(NODES_CHUNK_SIZE)
        .map(|chunk| BatchCall {
            query: NODES_QUERY.to_string(),
            variables: serde_json::json!({ "ids": chunk }),
        })
        .collect();

    let responses =
        execute_batched(transport, &calls, &BatchConfig::default(), |_, _| {}).await;

    let mut records = Vec::with_capacity(ids.len());
    for response in responses {
        let response = response?;
        if !response.errors.is_empty() {
            return Err(CatalogError::Graphql(response.error_text()));
        }
        let data = response
            .data
            .ok_or_else(|| CatalogError::Malformed("response missing data".into()))?;
        let nodes = data["nodes"]
            .as_array()
            .ok_or_else(|| CatalogError::Malformed("nodes is not an array".into()))?;

        for node in nodes {
            if node.is_null() || node.get("id").is_none() {
                tracing::warn!("Batch lookup returned an unknown or non-record id");
                continue;
            }
            records.push(parse_record(node)?);
        }
    }

    Ok(records)
}

/// The shop's currency code.
pub async fn shop_currency<E: GraphqlExecute>(exec: &E) -> Result<String, CatalogError> {
    let response = exec
        .execute(SHOP_CURRENCY_QUERY, serde_json::json!({}))
        .await?;
    if !response.errors.is_empty() {
        return Err(CatalogError::Graphql(response.error_text()));
    }
    response
        .data
        .as_ref()
        .and_then(|d| d["shop"]["currencyCode"].as_str())
        .map(str::to_string)
        .ok_or_else(|| CatalogError::Malformed("missing shop currency".into()))
}

/// Parse a `products` connection into a page.
fn parse_record_page(connection: &serde_json::Value) -> Result<RecordPage, CatalogError> {
    let edges = connection["edges"]
        .as_array()
        .ok_or_else(|| CatalogError::Malformed("products.edges is not an array".into()))?;

    let records = edges
        .iter()
        .map(|edge| parse_record(&edge["node"]))
        .collect::<Result<Vec<_>, _>>()?;

    let page_info = &connection["pageInfo"];
    Ok(RecordPage {
        records,
        has_next_page: page_info["hasNextPage"].as_bool().unwrap_or(false),
        has_previous_page: page_info["hasPreviousPage"].as_bool().unwrap_or(false),
        start_cursor: page_info["startCursor"].as_str().map(str::to_string),
        end_cursor: page_info["endCursor"].as_str().map(str::to_string),
    })
}

/// Parse one record node into a normalized snapshot.
fn parse_record(node: &serde_json::Value) -> Result<RecordState, CatalogError> {
    let id = node["id"]
        .as_str()
        .ok_or_else(|| CatalogError::Malformed("record missing id".into()))?
        .to_string();

    let variants = node["variants"]["edges"]
        .as_array()
        .map(|edges| {
            edges
                .iter()
                .map(|edge| parse_variant(&edge["node"]))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(RecordState {
        id,
        title: node["title"].as_str().unwrap_or_default().to_string(),
        status: node["status"].as_str().unwrap_or_default().to_string(),
        tags: node["tags"]
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        variants,
    })
}

fn parse_variant(node: &serde_json::Value) -> Result<VariantState, CatalogError> {
    let id = node["id"]
        .as_str()
        .ok_or_else(|| CatalogError::Malformed("variant missing id".into()))?
        .to_string();

    Ok(VariantState {
        id,
        title: node["title"].as_str().unwrap_or_default().to_string(),
        price: parse_price(&node["price"])?,
    })
}

/// Normalize a money field (string or number) to a 2-decimal float.
fn parse_price(value: &serde_json::Value) -> Result<f64, CatalogError> {
    let price = match value {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| CatalogError::Malformed(format!("unparsable price '{s}'")))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CatalogError::Malformed("non-finite price".into()))?,
        other => {
            return Err(CatalogError::Malformed(format!(
                "unexpected price value {other}"
            )))
        }
    };
    Ok(round2(price))
}
