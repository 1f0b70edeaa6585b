//! Repository for the `operations` table.

use sqlx::PgPool;

use bulkpress_core::types::{DbId, Timestamp};

use crate::models::operation::{
    CreateOperation, Operation, OperationFilters, OperationStats, OperationStatus,
};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, tenant, kind, status, payload, inverse_payload, remote_job_id, \
    result_summary, error_message, undone, undone_at, undone_by_operation_id, \
    created_at, updated_at, completed_at";

/// Hard cap on history page size.
const MAX_LIMIT: i64 = 100;
const DEFAULT_LIMIT: i64 = 25;

/// Clamp a caller-supplied limit into `[1, MAX_LIMIT]`.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Clamp a caller-supplied offset to be non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// Provides CRUD operations for bulk-job operations.
pub struct OperationRepo;

impl OperationRepo {
    /// Insert a new operation in `created`, admitting it only if the
    /// tenant has no active (created/running) operation.
    ///
    /// The insert targets the partial unique index on active rows, so
    /// the admission check and the insert are one atomic statement;
    /// `None` means another operation is already active.
    pub async fn create_active(
        pool: &PgPool,
        body: &CreateOperation,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!(
            "INSERT INTO operations (tenant, kind, payload, inverse_payload) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant) WHERE status IN ('created', 'running') DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(&body.tenant)
            .bind(body.kind)
            .bind(&body.payload)
            .bind(&body.inverse_payload)
            .fetch_optional(pool)
            .await
    }

    /// Find a single operation by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operations WHERE id = $1");
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the operation bound to a remote job id (webhook lookup).
    pub async fn find_by_remote_job_id(
        pool: &PgPool,
        remote_job_id: &str,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM operations WHERE remote_job_id = $1");
        sqlx::query_as::<_, Operation>(&query)
            .bind(remote_job_id)
            .fetch_optional(pool)
            .await
    }

    /// Active operations created before `cutoff` (stale-sweep input).
    pub async fn find_stale(
        pool: &PgPool,
        tenant: &str,
        cutoff: Timestamp,
    ) -> Result<Vec<Operation>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operations \
             WHERE tenant = $1 AND status IN ('created', 'running') AND created_at < $2 \
             ORDER BY created_at"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(tenant)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Bind the accepted remote job id and move the row to `running`.
    pub async fn mark_running(
        pool: &PgPool,
        id: DbId,
        remote_job_id: &str,
    ) -> Result<Operation, sqlx::Error> {
        let query = format!(
            "UPDATE operations \
             SET status = 'running', remote_job_id = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .bind(remote_job_id)
            .fetch_one(pool)
            .await
    }

    /// Write a terminal state.
    ///
    /// Only matches rows that are still active or already carry the
    /// same terminal status, so racing reconcilers (poll vs webhook)
    /// converge instead of flipping state; `None` means the row is
    /// already terminal with a different status and should be re-read.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        status: OperationStatus,
        result_summary: Option<&serde_json::Value>,
        error_message: Option<&str>,
        completed_at: Timestamp,
    ) -> Result<Option<Operation>, sqlx::Error> {
        let query = format!(
            "UPDATE operations \
             SET status = $2, result_summary = $3, error_message = $4, \
                 completed_at = $5, updated_at = now() \
             WHERE id = $1 AND (status IN ('created', 'running') OR status = $2) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .bind(status)
            .bind(result_summary)
            .bind(error_message)
            .bind(completed_at)
            .fetch_optional(pool)
            .await
    }

    /// Mark an operation failed with a human-readable reason.
    pub async fn mark_failed(
        pool: &PgPool,
        id: DbId,
        error_message: &str,
    ) -> Result<Operation, sqlx::Error> {
        let query = format!(
            "UPDATE operations \
             SET status = 'failed', error_message = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .bind(error_message)
            .fetch_one(pool)
            .await
    }

    /// Flag an operation as undone by a later operation.
    pub async fn mark_undone(
        pool: &PgPool,
        id: DbId,
        undone_by_operation_id: DbId,
        undone_at: Timestamp,
    ) -> Result<Operation, sqlx::Error> {
        let query = format!(
            "UPDATE operations \
             SET undone = TRUE, undone_at = $3, undone_by_operation_id = $2, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Operation>(&query)
            .bind(id)
            .bind(undone_by_operation_id)
            .bind(undone_at)
            .fetch_one(pool)
            .await
    }

    /// List a tenant's operations, newest first, with optional
    /// kind/status filters. Returns the page and the unpaged total.
    pub async fn list(
        pool: &PgPool,
        tenant: &str,
        filters: &OperationFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<Operation>, i64), sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM operations \
             WHERE tenant = $1 \
               AND ($2::operation_kind IS NULL OR kind = $2) \
               AND ($3::operation_status IS NULL OR status = $3) \
             ORDER BY created_at DESC \
             LIMIT $4 OFFSET $5"
        );
        let operations = sqlx::query_as::<_, Operation>(&query)
            .bind(tenant)
            .bind(filters.kind)
            .bind(filters.status)
            .bind(clamp_limit(limit))
            .bind(clamp_offset(offset))
            .fetch_all(pool)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM operations \
             WHERE tenant = $1 \
               AND ($2::operation_kind IS NULL OR kind = $2) \
               AND ($3::operation_status IS NULL OR status = $3)",
        )
        .bind(tenant)
        .bind(filters.kind)
        .bind(filters.status)
        .fetch_one(pool)
        .await?;

        Ok((operations, total))
    }

    /// Per-tenant counts for the history dashboard.
    pub async fn stats(pool: &PgPool, tenant: &str) -> Result<OperationStats, sqlx::Error> {
        sqlx::query_as::<_, OperationStats>(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                    COUNT(*) FILTER (WHERE status IN ('created', 'running')) AS running \
             FROM operations WHERE tenant = $1",
        )
        .bind(tenant)
        .fetch_one(pool)
        .await
    }
}
