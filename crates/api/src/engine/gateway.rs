//! Remote-catalog seam for the engine.

use async_trait::async_trait;

use bulkpress_catalog::api::CatalogApi;
use bulkpress_catalog::bulk::{self, BulkSubmission, FileTransfer, PollResult};
use bulkpress_catalog::queries::{self, ListFilter, PageCursor, RecordPage};
use bulkpress_catalog::{CatalogError, RetryConfig, Transport};
use bulkpress_core::record::RecordState;

use crate::config::CatalogConfig;

/// Everything the orchestrator needs from the remote catalog.
#[async_trait]
pub trait CatalogGateway: Send + Sync {
    /// One page of the catalog listing.
    async fn list_records(
        &self,
        filter: &ListFilter,
        page_size: u32,
        cursor: &PageCursor,
    ) -> Result<RecordPage, CatalogError>;

    /// Batch-by-id lookup for preview computation.
    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<RecordState>, CatalogError>;

    /// Shop-wide currency code.
    async fn shop_currency(&self) -> Result<String, CatalogError>;

    /// Whatever mutation job the remote side currently has in flight,
    /// regardless of whether this service submitted it.
    async fn current_job(&self) -> Result<Option<PollResult>, CatalogError>;

    /// Staged-upload handshake plus the file POST; returns the storage
    /// key to reference at submission.
    async fn stage_and_upload(
        &self,
        filename: &str,
        content: String,
    ) -> Result<String, CatalogError>;

    /// Submit a bulk job referencing a staged file.
    async fn submit(
        &self,
        mutation: &str,
        staged_path: &str,
    ) -> Result<BulkSubmission, CatalogError>;

    /// One idempotent read of remote job state; never raises.
    async fn poll(&self, remote_job_id: &str) -> PollResult;

    /// Download a terminal job's result file.
    async fn download_results(&self, url: &str) -> Result<String, CatalogError>;
}

/// Production gateway: retry transport for GraphQL calls, plain client
/// for the file side channels, one shared connection pool.
pub struct LiveCatalog {
    transport: Transport<CatalogApi>,
    files: CatalogApi,
}

impl LiveCatalog {
    pub fn new(config: &CatalogConfig) -> Self {
        Self::with_retry(config, config.retry.clone())
    }

    pub fn with_retry(config: &CatalogConfig, retry: RetryConfig) -> Self {
        let client = reqwest::Client::new();
        let transport = Transport::new(
            CatalogApi::with_client(
                client.clone(),
                config.endpoint.clone(),
                config.access_token.clone(),
            ),
            retry,
        );
        let files = CatalogApi::with_client(
            client,
            config.endpoint.clone(),
            config.access_token.clone(),
        );
        Self { transport, files }
    }
}

#[async_trait]
impl CatalogGateway for LiveCatalog {
    async fn list_records(
        &self,
        filter: &ListFilter,
        page_size: u32,
        cursor: &PageCursor,
    ) -> Result<RecordPage, CatalogError> {
        queries::list_records(&self.transport, filter, page_size, cursor).await
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<RecordState>, CatalogError> {
        queries::fetch_by_ids(&self.transport, ids).await
    }

    async fn shop_currency(&self) -> Result<String, CatalogError> {
        queries::shop_currency(&self.transport).await
    }

    async fn current_job(&self) -> Result<Option<PollResult>, CatalogError> {
        bulk::current_job(&self.transport).await
    }

    async fn stage_and_upload(
        &self,
        filename: &str,
        content: String,
    ) -> Result<String, CatalogError> {
        let target = bulk::staged_uploads_create(&self.transport, filename).await?;
        self.files.upload(&target, content).await?;
        target
            .key()
            .map(str::to_string)
            .ok_or_else(|| CatalogError::Malformed("staged target has no key parameter".into()))
    }

    async fn submit(
        &self,
        mutation: &str,
        staged_path: &str,
    ) -> Result<BulkSubmission, CatalogError> {
        bulk::submit_bulk_mutation(&self.transport, mutation, staged_path).await
    }

    async fn poll(&self, remote_job_id: &str) -> PollResult {
        bulk::poll_job(&self.transport, remote_job_id).await
    }

    async fn download_results(&self, url: &str) -> Result<String, CatalogError> {
        Ok(self.files.download(url).await?)
    }
}
