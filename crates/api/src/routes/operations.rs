//! Route definitions for the `/operations` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::operations;
use crate::state::AppState;

/// Routes mounted at `/operations`.
///
/// ```text
/// POST   /preview         -> preview
/// GET    /                -> list_operations
/// POST   /                -> start_operation
/// GET    /stats           -> operation_stats
/// GET    /{id}            -> get_operation
/// POST   /{id}/refresh    -> refresh_operation
/// POST   /{id}/undo       -> undo_operation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/preview", post(operations::preview))
        .route(
            "/",
            get(operations::list_operations).post(operations::start_operation),
        )
        .route("/stats", get(operations::operation_stats))
        .route("/{id}", get(operations::get_operation))
        .route("/{id}/refresh", post(operations::refresh_operation))
        .route("/{id}/undo", post(operations::undo_operation))
}
