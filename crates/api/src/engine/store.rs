//! Persistence seam for the engine.
//!
//! The orchestrator is the only writer of operation rows; this trait
//! keeps the repository an external collaborator so the state machine
//! can run against an in-memory store in tests.

use async_trait::async_trait;
use sqlx::PgPool;

use bulkpress_core::types::{DbId, Timestamp};
use bulkpress_db::models::{
    CreateOperation, Operation, OperationFilters, OperationStats, OperationStatus,
};
use bulkpress_db::repositories::OperationRepo;

use crate::error::AppError;

/// Everything the orchestrator needs from durable storage.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Atomic admission: insert a `created` row unless the tenant
    /// already has an active one. `None` means admission was refused.
    async fn create_active(&self, body: CreateOperation)
        -> Result<Option<Operation>, AppError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Operation>, AppError>;

    async fn find_by_remote_job_id(
        &self,
        remote_job_id: &str,
    ) -> Result<Option<Operation>, AppError>;

    /// Active operations created before `cutoff`.
    async fn find_stale(&self, tenant: &str, cutoff: Timestamp)
        -> Result<Vec<Operation>, AppError>;

    async fn mark_running(&self, id: DbId, remote_job_id: &str) -> Result<Operation, AppError>;

    /// Idempotent terminal write; `None` when the row is already
    /// terminal with a different status.
    async fn complete(
        &self,
        id: DbId,
        status: OperationStatus,
        result_summary: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at: Timestamp,
    ) -> Result<Option<Operation>, AppError>;

    async fn mark_failed(&self, id: DbId, error_message: &str) -> Result<Operation, AppError>;

    async fn mark_undone(
        &self,
        id: DbId,
        undone_by_operation_id: DbId,
        undone_at: Timestamp,
    ) -> Result<Operation, AppError>;

    async fn list(
        &self,
        tenant: &str,
        filters: &OperationFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<Operation>, i64), AppError>;

    async fn stats(&self, tenant: &str) -> Result<OperationStats, AppError>;
}

/// Postgres-backed store delegating to [`OperationRepo`].
pub struct PgOperationStore {
    pool: PgPool,
}

impl PgOperationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OperationStore for PgOperationStore {
    async fn create_active(
        &self,
        body: CreateOperation,
    ) -> Result<Option<Operation>, AppError> {
        Ok(OperationRepo::create_active(&self.pool, &body).await?)
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Operation>, AppError> {
        Ok(OperationRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_remote_job_id(
        &self,
        remote_job_id: &str,
    ) -> Result<Option<Operation>, AppError> {
        Ok(OperationRepo::find_by_remote_job_id(&self.pool, remote_job_id).await?)
    }

    async fn find_stale(
        &self,
        tenant: &str,
        cutoff: Timestamp,
    ) -> Result<Vec<Operation>, AppError> {
        Ok(OperationRepo::find_stale(&self.pool, tenant, cutoff).await?)
    }

    async fn mark_running(&self, id: DbId, remote_job_id: &str) -> Result<Operation, AppError> {
        Ok(OperationRepo::mark_running(&self.pool, id, remote_job_id).await?)
    }

    async fn complete(
        &self,
        id: DbId,
        status: OperationStatus,
        result_summary: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at: Timestamp,
    ) -> Result<Option<Operation>, AppError> {
        Ok(OperationRepo::complete(
            &self.pool,
            id,
            status,
            result_summary.as_ref(),
            error_message.as_deref(),
            completed_at,
        )
        .await?)
    }

    async fn mark_failed(&self, id: DbId, error_message: &str) -> Result<Operation, AppError> {
        Ok(OperationRepo::mark_failed(&self.pool, id, error_message).await?)
    }

    async fn mark_undone(
        &self,
        id: DbId,
        undone_by_operation_id: DbId,
        undone_at: Timestamp,
    ) -> Result<Operation, AppError> {
        Ok(OperationRepo::mark_undone(&self.pool, id, undone_by_operation_id, undone_at).await?)
    }

    async fn list(
        &self,
        tenant: &str,
        filters: &OperationFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<(Vec<Operation>, i64), AppError> {
        Ok(OperationRepo::list(&self.pool, tenant, filters, limit, offset).await?)
    }

    async fn stats(&self, tenant: &str) -> Result<OperationStats, AppError> {
        Ok(OperationRepo::stats(&self.pool, tenant).await?)
    }
}
