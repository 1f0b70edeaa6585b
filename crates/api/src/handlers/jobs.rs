//! Handlers for remote-job plumbing that is not tied to a single
//! operation row: raw status reads and the stale-job sweep.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::query::TenantParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Query for a raw remote-job status read. Remote job ids are opaque
/// URI-like strings, so they travel as a query parameter rather than
/// a path segment.
#[derive(Debug, Deserialize)]
pub struct JobStatusParams {
    pub remote_job_id: String,
}

/// GET /api/v1/jobs/status?remote_job_id=...
///
/// One poll of remote job state, no side effects. Never fails: an
/// unknown job reads as expired, a transport failure as failed.
pub async fn job_status(
    State(state): State<AppState>,
    Query(params): Query<JobStatusParams>,
) -> AppResult<impl IntoResponse> {
    let poll = state.engine.poll_status(&params.remote_job_id).await;
    Ok(Json(DataResponse { data: poll }))
}

/// GET /api/v1/jobs/current
///
/// The remote side's view of any in-flight mutation job, including
/// jobs submitted outside this service. `null` when nothing is
/// running.
pub async fn current_job(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let poll = state.engine.current_remote_job().await?;
    Ok(Json(DataResponse { data: poll }))
}

/// POST /api/v1/jobs/reconcile?tenant=...
///
/// Sweep the tenant's stale active operations into terminal states.
/// Returns the operations that were resolved. The same sweep runs
/// automatically before every new job submission.
pub async fn reconcile_stale(
    State(state): State<AppState>,
    Query(params): Query<TenantParams>,
) -> AppResult<impl IntoResponse> {
    let resolved = state.engine.reconcile_stuck(&params.tenant).await?;

    if !resolved.is_empty() {
        tracing::info!(
            tenant = %params.tenant,
            resolved = resolved.len(),
            "Stale operations reconciled",
        );
    }

    Ok(Json(DataResponse { data: resolved }))
}
