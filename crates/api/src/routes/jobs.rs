//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /status          -> job_status
/// GET    /current         -> current_job
/// POST   /reconcile       -> reconcile_stale
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(jobs::job_status))
        .route("/current", get(jobs::current_job))
        .route("/reconcile", post(jobs::reconcile_stale))
}
