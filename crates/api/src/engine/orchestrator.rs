//! The bulk-job lifecycle state machine.
//!
//! Operations move `created -> running -> completed | failed |
//! expired`. No state is re-entrant; a new user action (including
//! undo) always produces a new operation. Everything that happens
//! before a remote job id is obtained surfaces synchronously to the
//! caller; everything after is reconciled asynchronously (poll or
//! webhook) into a terminal row, never thrown back into a request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use bulkpress_catalog::bulk::{PollResult, RemoteJobStatus};
use bulkpress_catalog::queries::{ListFilter, PageCursor, RecordPage};
use bulkpress_core::error::CoreError;
use bulkpress_core::jobfile::{mutation_template, render_job_lines};
use bulkpress_core::payload::OperationPayload;
use bulkpress_core::preview::{self, PreviewResult};
use bulkpress_core::results::{parse_result_file, ResultError, ResultSummary};
use bulkpress_core::transformation::TransformationSpec;
use bulkpress_core::types::DbId;
use bulkpress_db::models::{
    CreateOperation, Operation, OperationFilters, OperationKind, OperationStats, OperationStatus,
};
use bulkpress_events::{EventBus, OperationEvent};

use crate::config::EngineConfig;
use crate::engine::gateway::CatalogGateway;
use crate::engine::store::OperationStore;
use crate::error::{AppError, AppResult};

/// Owns the bulk-job lifecycle for all tenants.
pub struct Orchestrator<S, C> {
    store: S,
    catalog: C,
    events: Arc<EventBus>,
    staleness_window: Duration,
}

impl<S: OperationStore, C: CatalogGateway> Orchestrator<S, C> {
    pub fn new(store: S, catalog: C, events: Arc<EventBus>, config: &EngineConfig) -> Self {
        Self {
            store,
            catalog,
            events,
            staleness_window: config.staleness_window,
        }
    }

    // -----------------------------------------------------------------
    // Browse
    // -----------------------------------------------------------------

    /// One page of the catalog listing, with the shop currency so the
    /// caller can render prices.
    pub async fn list_records(
        &self,
        filter: &ListFilter,
        page_size: u32,
        cursor: &PageCursor,
    ) -> AppResult<(RecordPage, String)> {
        let currency = self.catalog.shop_currency().await?;
        let page = self.catalog.list_records(filter, page_size, cursor).await?;
        Ok((page, currency))
    }

    /// The remote side's view of any in-flight mutation job, including
    /// jobs this service did not submit.
    pub async fn current_remote_job(&self) -> AppResult<Option<PollResult>> {
        Ok(self.catalog.current_job().await?)
    }

    // -----------------------------------------------------------------
    // Preview
    // -----------------------------------------------------------------

    /// Compute the before/after view for a proposed transformation.
    ///
    /// Read-only: fetches live records and computes in memory.
    pub async fn build_preview(
        &self,
        spec: &TransformationSpec,
        record_ids: &[String],
    ) -> AppResult<PreviewResult> {
        spec.validate()?;
        if record_ids.is_empty() {
            return Err(CoreError::Validation("no records selected".to_string()).into());
        }

        let currency = self.catalog.shop_currency().await?;
        let records = self.catalog.fetch_records(record_ids).await?;
        Ok(preview::build_preview(spec, &currency, &records)?)
    }

    // -----------------------------------------------------------------
    // Start
    // -----------------------------------------------------------------

    /// Submit a transformation as a new bulk job.
    ///
    /// Runs the stale-job sweep first so a crashed prior attempt never
    /// permanently blocks the tenant, then admits, snapshots, uploads,
    /// and submits. Returns the operation in `running`.
    pub async fn start_job(
        &self,
        tenant: &str,
        spec: &TransformationSpec,
        record_ids: &[String],
    ) -> AppResult<Operation> {
        self.reconcile_stuck(tenant).await?;
        let preview = self.build_preview(spec, record_ids).await?;
        self.start_from_preview(tenant, &preview).await
    }

    /// The shared submission path for fresh jobs and undo jobs.
    async fn start_from_preview(
        &self,
        tenant: &str,
        preview: &PreviewResult,
    ) -> AppResult<Operation> {
        if preview.items.is_empty() {
            return Err(CoreError::Validation("no records selected".to_string()).into());
        }

        let payload = OperationPayload::from_preview(preview);
        let inverse = payload.inverse();

        let operation = self
            .store
            .create_active(CreateOperation {
                tenant: tenant.to_string(),
                kind: OperationKind::from_spec(&payload.spec),
                payload: payload.to_json()?,
                inverse_payload: Some(inverse.to_json()?),
            })
            .await?
            .ok_or_else(|| {
                CoreError::Conflict("a bulk job is already in progress for this tenant".into())
            })?;

        self.events.publish(
            OperationEvent::new("operation.started", tenant, operation.id).with_payload(
                serde_json::json!({
                    "kind": payload.spec.kind_name(),
                    "records": payload.items.len(),
                }),
            ),
        );
        tracing::info!(
            tenant,
            operation_id = operation.id,
            kind = payload.spec.kind_name(),
            records = payload.items.len(),
            "Bulk operation created",
        );

        // From here on, any failure marks the row failed before the
        // error is surfaced to the caller.
        match self.submit_job(&operation, &payload).await {
            Ok(running) => Ok(running),
            Err(err) => {
                let message = err.to_string();
                if let Err(mark_err) = self.store.mark_failed(operation.id, &message).await {
                    tracing::error!(
                        operation_id = operation.id,
                        error = %mark_err,
                        "Could not mark operation failed",
                    );
                }
                self.events.publish(
                    OperationEvent::new("operation.failed", tenant, operation.id)
                        .with_payload(serde_json::json!({ "error": message })),
                );
                Err(err)
            }
        }
    }

    /// Render, upload, and submit the job file; move the row to
    /// `running` once the remote side accepts.
    async fn submit_job(
        &self,
        operation: &Operation,
        payload: &OperationPayload,
    ) -> AppResult<Operation> {
        let body = render_job_lines(payload)?;
        let filename = format!("bulk_operation_{}.jsonl", operation.id);
        let staged_path = self.catalog.stage_and_upload(&filename, body).await?;

        let submission = self
            .catalog
            .submit(mutation_template(&payload.spec), &staged_path)
            .await?;

        if !submission.user_errors.is_empty() {
            return Err(AppError::RemoteRejected(submission.user_errors.join("; ")));
        }
        let remote_job_id = submission.job_id.ok_or_else(|| {
            AppError::InternalError("bulk job submission returned no job id".into())
        })?;

        let running = self.store.mark_running(operation.id, &remote_job_id).await?;
        self.events.publish(
            OperationEvent::new("operation.running", &running.tenant, running.id)
                .with_payload(serde_json::json!({ "remote_job_id": remote_job_id })),
        );
        tracing::info!(
            operation_id = running.id,
            remote_job_id = %remote_job_id,
            "Bulk job accepted by catalog",
        );
        Ok(running)
    }

    // -----------------------------------------------------------------
    // Poll / reconcile
    // -----------------------------------------------------------------

    /// Side-effect-free read of remote job state. Never raises: a job
    /// the remote side no longer knows about reads as expired, and a
    /// transport failure reads as failed with a poll-error code.
    pub async fn poll_status(&self, remote_job_id: &str) -> PollResult {
        self.catalog.poll(remote_job_id).await
    }

    /// Apply a terminal poll result to an operation.
    ///
    /// Idempotent: the polling path and the webhook path may race to
    /// reconcile the same job; a second invocation with the same
    /// terminal result re-reads the settled row. A non-terminal poll
    /// result leaves the row untouched.
    pub async fn complete_job(&self, operation_id: DbId, poll: PollResult) -> AppResult<Operation> {
        let operation = self
            .store
            .find_by_id(operation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "operation",
                id: operation_id.to_string(),
            })?;

        if !poll.status.is_terminal() {
            return Ok(operation);
        }

        let mut status = match poll.status {
            RemoteJobStatus::Completed => OperationStatus::Completed,
            RemoteJobStatus::Expired => OperationStatus::Expired,
            _ => OperationStatus::Failed,
        };
        let mut error_message = match status {
            OperationStatus::Expired => {
                Some("remote job expired before results could be collected".to_string())
            }
            OperationStatus::Failed => Some("remote job failed".to_string()),
            _ => None,
        };

        let mut summary: Option<ResultSummary> = None;
        if status == OperationStatus::Completed {
            if let Some(url) = &poll.result_file_url {
                summary = Some(self.collect_results(url).await);
            } else {
                summary = Some(ResultSummary::default());
            }
        }

        // A remote error code forces failure, even over a completed
        // status: the code is the more specific signal.
        if let Some(code) = &poll.error_code {
            status = OperationStatus::Failed;
            error_message = Some(code.clone());
        }

        let completed_at = poll.completed_at.unwrap_or_else(Utc::now);
        let summary_json = summary
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| AppError::InternalError(format!("summary serialization failed: {e}")))?;

        let updated = match self
            .store
            .complete(operation.id, status, summary_json, error_message, completed_at)
            .await?
        {
            Some(updated) => updated,
            // Already terminal with a different status: the other
            // reconciler won the race; return what it settled on.
            None => self
                .store
                .find_by_id(operation.id)
                .await?
                .ok_or_else(|| CoreError::NotFound {
                    entity: "operation",
                    id: operation.id.to_string(),
                })?,
        };

        if !operation.status.is_terminal() && updated.status.is_terminal() {
            let event_type = match updated.status {
                OperationStatus::Completed => "operation.completed",
                OperationStatus::Expired => "operation.expired",
                _ => "operation.failed",
            };
            self.events.publish(
                OperationEvent::new(event_type, &updated.tenant, updated.id).with_payload(
                    serde_json::json!({
                        "result_summary": updated.result_summary,
                        "error": updated.error_message,
                    }),
                ),
            );
            tracing::info!(
                operation_id = updated.id,
                status = ?updated.status,
                "Bulk operation reached terminal state",
            );
        }

        Ok(updated)
    }

    /// Download and parse the result file. A download or parse failure
    /// does not downgrade a completed job — the mutations did execute
    /// even if we cannot summarize them — it becomes a note in the
    /// summary instead.
    async fn collect_results(&self, url: &str) -> ResultSummary {
        match self.catalog.download_results(url).await {
            Ok(body) => parse_result_file(&body),
            Err(err) => {
                tracing::warn!(error = %err, "Result file could not be downloaded");
                ResultSummary {
                    successful: 0,
                    failed: 0,
                    errors: vec![ResultError {
                        record_id: None,
                        field: None,
                        message: format!("result file could not be summarized: {err}"),
                    }],
                }
            }
        }
    }

    /// Webhook entry point: reconcile by remote job id.
    ///
    /// Idempotent with polling; an already-terminal operation is
    /// returned as-is without touching the remote side. The poll is
    /// authoritative — the notification only says "look now".
    pub async fn reconcile_remote(&self, remote_job_id: &str) -> AppResult<Operation> {
        let operation = self
            .store
            .find_by_remote_job_id(remote_job_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "operation",
                id: remote_job_id.to_string(),
            })?;

        if operation.status.is_terminal() {
            return Ok(operation);
        }

        let poll = self.catalog.poll(remote_job_id).await;
        self.complete_job(operation.id, poll).await
    }

    /// Poll-and-complete convenience for UI timers.
    pub async fn refresh(&self, operation_id: DbId) -> AppResult<Operation> {
        let operation = self
            .store
            .find_by_id(operation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "operation",
                id: operation_id.to_string(),
            })?;

        if operation.status.is_terminal() {
            return Ok(operation);
        }
        let Some(remote_job_id) = operation.remote_job_id.clone() else {
            return Ok(operation);
        };

        let poll = self.catalog.poll(&remote_job_id).await;
        self.complete_job(operation.id, poll).await
    }

    /// Resolve active operations older than the staleness window.
    ///
    /// Rows with a remote job id are polled and reconciled (downgrading
    /// to expired when the remote side no longer knows the job); rows
    /// that never obtained one failed during submission without being
    /// caught and are marked failed directly.
    pub async fn reconcile_stuck(&self, tenant: &str) -> AppResult<Vec<Operation>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.staleness_window)
                .map_err(|e| AppError::InternalError(format!("bad staleness window: {e}")))?;
        let stale = self.store.find_stale(tenant, cutoff).await?;

        let mut resolved = Vec::with_capacity(stale.len());
        for operation in stale {
            tracing::warn!(
                tenant,
                operation_id = operation.id,
                created_at = %operation.created_at,
                "Reconciling stale operation",
            );
            let settled = match &operation.remote_job_id {
                Some(remote_job_id) => {
                    let poll = self.catalog.poll(remote_job_id).await;
                    self.complete_job(operation.id, poll).await?
                }
                None => {
                    let failed = self
                        .store
                        .mark_failed(
                            operation.id,
                            "submission did not obtain a remote job id",
                        )
                        .await?;
                    self.events.publish(
                        OperationEvent::new("operation.failed", tenant, failed.id).with_payload(
                            serde_json::json!({ "error": failed.error_message }),
                        ),
                    );
                    failed
                }
            };
            resolved.push(settled);
        }
        Ok(resolved)
    }

    // -----------------------------------------------------------------
    // Undo
    // -----------------------------------------------------------------

    /// Undo a completed operation by submitting its precomputed
    /// inverse as a new job.
    ///
    /// Not a special code path: the reconstructed preview re-enters
    /// the same state machine, so the undo operation carries its own
    /// inverse and is itself undoable. The original is flagged once
    /// the new job is running.
    pub async fn undo(&self, tenant: &str, operation_id: DbId) -> AppResult<Operation> {
        let original = self
            .store
            .find_by_id(operation_id)
            .await?
            .filter(|op| op.tenant == tenant)
            .ok_or_else(|| CoreError::NotFound {
                entity: "operation",
                id: operation_id.to_string(),
            })?;

        if original.status != OperationStatus::Completed {
            return Err(
                CoreError::Validation("only completed operations can be undone".into()).into(),
            );
        }
        if original.undone {
            return Err(CoreError::Validation("operation was already undone".into()).into());
        }
        let inverse_blob = original.inverse_payload.as_ref().ok_or_else(|| {
            CoreError::Validation("operation does not support undo".to_string())
        })?;

        // Trust the snapshot taken at original-job time; no re-fetch.
        let inverse_preview = OperationPayload::from_json(inverse_blob)?.into_preview();

        self.events.publish(
            OperationEvent::new("operation.undo_initiated", tenant, original.id),
        );

        self.reconcile_stuck(tenant).await?;
        let undo_operation = self.start_from_preview(tenant, &inverse_preview).await?;

        self.store
            .mark_undone(original.id, undo_operation.id, Utc::now())
            .await?;

        Ok(undo_operation)
    }

    // -----------------------------------------------------------------
    // History
    // -----------------------------------------------------------------

    pub async fn list_operations(
        &self,
        tenant: &str,
        filters: &OperationFilters,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<(Vec<Operation>, i64)> {
        self.store.list(tenant, filters, limit, offset).await
    }

    pub async fn get_operation(&self, tenant: &str, operation_id: DbId) -> AppResult<Operation> {
        self.store
            .find_by_id(operation_id)
            .await?
            .filter(|op| op.tenant == tenant)
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "operation",
                    id: operation_id.to_string(),
                }
                .into()
            })
    }

    pub async fn stats(&self, tenant: &str) -> AppResult<OperationStats> {
        self.store.stats(tenant).await
    }
}
