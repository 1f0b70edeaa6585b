//! Handlers for browsing the remote catalog.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use bulkpress_catalog::queries::{ListFilter, PageCursor};
use bulkpress_core::record::RecordState;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 25;
const MAX_PAGE_SIZE: u32 = 100;

/// Listing parameters (`?status=&tag=&page_size=&after=&before=`).
#[derive(Debug, Deserialize)]
pub struct RecordListParams {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub page_size: Option<u32>,
    pub after: Option<String>,
    pub before: Option<String>,
}

/// One page of records plus what the UI needs to render and paginate.
#[derive(Debug, Serialize)]
pub struct RecordPageResponse {
    pub records: Vec<RecordState>,
    pub currency: String,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

/// GET /api/v1/records
///
/// Browse the remote catalog, one page at a time. Cursors come from the
/// previous page; `after` and `before` are mutually exclusive.
pub async fn list_records(
    State(state): State<AppState>,
    Query(params): Query<RecordListParams>,
) -> AppResult<impl IntoResponse> {
    let cursor = match (params.after, params.before) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "after and before are mutually exclusive".into(),
            ))
        }
        (Some(after), None) => PageCursor::After(after),
        (None, Some(before)) => PageCursor::Before(before),
        (None, None) => PageCursor::Start,
    };

    let filter = ListFilter {
        status: params.status,
        tag: params.tag,
    };
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (page, currency) = state
        .engine
        .list_records(&filter, page_size, &cursor)
        .await?;

    Ok(Json(DataResponse {
        data: RecordPageResponse {
            records: page.records,
            currency,
            has_next_page: page.has_next_page,
            has_previous_page: page.has_previous_page,
            start_cursor: page.start_cursor,
            end_cursor: page.end_cursor,
        },
    }))
}
