//! Route definitions for inbound webhooks.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /bulk-complete   -> bulk_complete
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/bulk-complete", post(webhooks::bulk_complete))
}
