use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::AppEngine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: bulkpress_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The bulk-job engine as wired in production.
    pub engine: Arc<AppEngine>,
    /// Centralized event bus for publishing operation lifecycle events.
    pub event_bus: Arc<bulkpress_events::EventBus>,
}
