//! Shared query parameter types for API handlers.

use serde::Deserialize;

use bulkpress_db::models::{OperationKind, OperationStatus};

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped in the repository layer.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Tenant scope, required on every operation endpoint.
///
/// The tenant is supplied by the (external) session layer; this core
/// treats it as an opaque identifier.
#[derive(Debug, Deserialize)]
pub struct TenantParams {
    pub tenant: String,
}

/// History listing filters (`?tenant=&kind=&status=&limit=&offset=`).
#[derive(Debug, Deserialize)]
pub struct OperationListParams {
    pub tenant: String,
    pub kind: Option<OperationKind>,
    pub status: Option<OperationStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
