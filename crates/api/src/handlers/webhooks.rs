//! Inbound webhook handlers.
//!
//! The bulk-completion webhook is a hint, not a source of truth: the
//! handler re-polls the remote job and reconciles through the same
//! idempotent path as the UI timer, so a webhook racing a poll (or
//! arriving twice) settles on one terminal state.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Payload of the bulk-completion notification.
#[derive(Debug, Deserialize)]
pub struct BulkCompletePayload {
    /// The remote job id the notification refers to.
    pub remote_job_id: String,
}

/// POST /api/v1/webhooks/bulk-complete
///
/// Reconcile the operation behind a finished remote job. A job we have
/// no row for is acknowledged and dropped — failing would only make
/// the sender retry a notification we can never use.
pub async fn bulk_complete(
    State(state): State<AppState>,
    Json(payload): Json<BulkCompletePayload>,
) -> AppResult<impl IntoResponse> {
    match state.engine.reconcile_remote(&payload.remote_job_id).await {
        Ok(operation) => Ok(Json(DataResponse {
            data: Some(operation),
        })),
        Err(AppError::Core(bulkpress_core::error::CoreError::NotFound { .. })) => {
            tracing::warn!(
                remote_job_id = %payload.remote_job_id,
                "Completion webhook for unknown job, ignoring",
            );
            Ok(Json(DataResponse { data: None }))
        }
        Err(err) => Err(err),
    }
}
