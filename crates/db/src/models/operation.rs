//! Operation models and DTOs.
//!
//! Maps to the `operations` table from migration 0001. One row per
//! bulk-job attempt; the orchestrator is the only writer. Payload
//! blobs are schema-versioned `OperationPayload` JSON (see
//! `bulkpress_core::payload`), decoded on read rather than cast.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use bulkpress_core::transformation::TransformationSpec;
use bulkpress_core::types::{DbId, Timestamp};

/// What a bulk operation changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "operation_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    PriceAdjustment,
    TagUpdate,
    /// Reserved for a future transformation kind; never written today.
    StatusChange,
}

impl OperationKind {
    /// The kind matching a transformation spec.
    pub fn from_spec(spec: &TransformationSpec) -> Self {
        match spec {
            TransformationSpec::PriceAdjustment { .. } => OperationKind::PriceAdjustment,
            TransformationSpec::TagUpdate { .. } => OperationKind::TagUpdate,
        }
    }
}

/// Operation lifecycle states.
///
/// `created -> running -> completed | failed | expired`; no state is
/// re-entrant, and a new user action (including undo) produces a new
/// row rather than reusing a terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "operation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Created,
    Running,
    Completed,
    Failed,
    Expired,
}

impl OperationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OperationStatus::Created | OperationStatus::Running)
    }
}

/// A row from the `operations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Operation {
    pub id: DbId,
    pub tenant: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub payload: serde_json::Value,
    pub inverse_payload: Option<serde_json::Value>,
    pub remote_job_id: Option<String>,
    pub result_summary: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub undone: bool,
    pub undone_at: Option<Timestamp>,
    pub undone_by_operation_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// DTO for inserting a new operation (always starts in `created`).
#[derive(Debug, Clone)]
pub struct CreateOperation {
    pub tenant: String,
    pub kind: OperationKind,
    pub payload: serde_json::Value,
    pub inverse_payload: Option<serde_json::Value>,
}

/// Optional filters for history listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OperationFilters {
    pub kind: Option<OperationKind>,
    pub status: Option<OperationStatus>,
}

/// Per-tenant operation counts.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OperationStats {
    pub total: i64,
    pub completed: i64,
    pub failed: i64,
    pub running: i64,
}
