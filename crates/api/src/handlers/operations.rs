//! Handlers for the `/operations` resource.
//!
//! Everything that creates or mutates operations goes through the
//! engine; handlers only translate HTTP in and out.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use bulkpress_core::transformation::TransformationSpec;
use bulkpress_core::types::DbId;
use bulkpress_db::models::OperationFilters;

use crate::error::AppResult;
use crate::query::{OperationListParams, TenantParams};
use crate::response::{DataResponse, PagedResponse};
use crate::state::AppState;

/// Request body for preview computation.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub spec: TransformationSpec,
    pub record_ids: Vec<String>,
}

/// Request body for starting a bulk job.
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub tenant: String,
    pub spec: TransformationSpec,
    pub record_ids: Vec<String>,
}

/// POST /api/v1/operations/preview
///
/// Compute the before/after view for a proposed transformation.
/// Read-only; nothing is persisted or submitted.
pub async fn preview(
    State(state): State<AppState>,
    Json(input): Json<PreviewRequest>,
) -> AppResult<impl IntoResponse> {
    let preview = state
        .engine
        .build_preview(&input.spec, &input.record_ids)
        .await?;
    Ok(Json(DataResponse { data: preview }))
}

/// POST /api/v1/operations
///
/// Validate, admit, and submit a new bulk job. Returns 201 with the
/// operation in `running`. 409 when the tenant already has an active
/// job, 422 when the remote side rejects the submission.
pub async fn start_operation(
    State(state): State<AppState>,
    Json(input): Json<StartRequest>,
) -> AppResult<impl IntoResponse> {
    let operation = state
        .engine
        .start_job(&input.tenant, &input.spec, &input.record_ids)
        .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: operation })))
}

/// GET /api/v1/operations
///
/// Operation history for a tenant, newest first. Supports optional
/// `kind`, `status`, `limit`, and `offset` query parameters.
pub async fn list_operations(
    State(state): State<AppState>,
    Query(params): Query<OperationListParams>,
) -> AppResult<impl IntoResponse> {
    let filters = OperationFilters {
        kind: params.kind,
        status: params.status,
    };
    let (operations, total) = state
        .engine
        .list_operations(&params.tenant, &filters, params.limit, params.offset)
        .await?;

    Ok(Json(PagedResponse {
        data: operations,
        total,
    }))
}

/// GET /api/v1/operations/stats
pub async fn operation_stats(
    State(state): State<AppState>,
    Query(params): Query<TenantParams>,
) -> AppResult<impl IntoResponse> {
    let stats = state.engine.stats(&params.tenant).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/operations/{id}
pub async fn get_operation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<TenantParams>,
) -> AppResult<impl IntoResponse> {
    let operation = state.engine.get_operation(&params.tenant, id).await?;
    Ok(Json(DataResponse { data: operation }))
}

/// POST /api/v1/operations/{id}/refresh
///
/// Poll the remote job behind an operation and reconcile any terminal
/// state. Intended for UI status timers; safe to call repeatedly.
pub async fn refresh_operation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let operation = state.engine.refresh(id).await?;
    Ok(Json(DataResponse { data: operation }))
}

/// POST /api/v1/operations/{id}/undo
///
/// Submit the precomputed inverse of a completed operation as a new
/// bulk job. Returns 201 with the new operation.
pub async fn undo_operation(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Query(params): Query<TenantParams>,
) -> AppResult<impl IntoResponse> {
    let operation = state.engine.undo(&params.tenant, id).await?;

    tracing::info!(
        tenant = %params.tenant,
        original_id = id,
        undo_id = operation.id,
        "Undo operation submitted",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: operation })))
}
