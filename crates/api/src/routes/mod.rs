pub mod health;
pub mod jobs;
pub mod operations;
pub mod records;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /records                         browse the remote catalog
///
/// /operations/preview              preview a transformation (POST)
/// /operations                      list (GET), start a bulk job (POST)
/// /operations/stats                per-tenant lifecycle counts
/// /operations/{id}                 operation detail
/// /operations/{id}/refresh         poll + reconcile (POST)
/// /operations/{id}/undo            submit the inverse job (POST)
///
/// /jobs/status                     raw remote-job status read
/// /jobs/current                    remote side's in-flight job, if any
/// /jobs/reconcile                  stale-job sweep (POST)
///
/// /webhooks/bulk-complete          bulk-completion notification (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/records", records::router())
        .nest("/operations", operations::router())
        .nest("/jobs", jobs::router())
        .nest("/webhooks", webhooks::router())
}
