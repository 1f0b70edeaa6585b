//! The remote bulk-job protocol.
//!
//! A bulk job runs a mutation template once per line of a staged JSONL
//! file: request an upload target, POST the file, submit the job
//! referencing the staged path, then poll the job until it reaches a
//! terminal state and download the line-delimited result file.

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

use bulkpress_core::types::Timestamp;

use crate::api::{CatalogApi, CatalogApiError, GraphqlExecute};
use crate::CatalogError;

/// Error code used when polling itself fails; the job is treated as
/// failed and left for a human to investigate.
pub const POLL_ERROR_CODE: &str = "POLL_ERROR";

/// Request an upload target for one line-delimited job file.
pub const STAGED_UPLOAD_MUTATION: &str = "\
mutation stagedUploadsCreate($input: [StagedUploadInput!]!) {
  stagedUploadsCreate(input: $input) {
    stagedTargets {
      url
      resourceUrl
      parameters { name value }
    }
    userErrors { field message }
  }
}";

/// Submit a bulk job referencing a staged file.
pub const BULK_SUBMIT_MUTATION: &str = "\
mutation bulkOperationRunMutation($mutation: String!, $stagedUploadPath: String!) {
  bulkOperationRunMutation(mutation: $mutation, stagedUploadPath: $stagedUploadPath) {
    bulkOperation { id status }
    userErrors { field message }
  }
}";

/// Poll one job by id.
pub const JOB_STATUS_QUERY: &str = "\
query jobStatus($id: ID!) {
  node(id: $id) {
    ... on BulkOperation {
      id
      status
      errorCode
      objectCount
      fileSize
      url
      createdAt
      completedAt
    }
  }
}";

/// Defensive check: whatever mutation job the tenant currently has
/// in flight, if any.
pub const CURRENT_JOB_QUERY: &str = "\
query {
  currentBulkOperation(type: MUTATION) {
    id
    status
    errorCode
    objectCount
    url
    createdAt
    completedAt
  }
}";

/// Remote job states, as this core distinguishes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobStatus {
    Created,
    Running,
    Completed,
    Failed,
    Canceled,
    Expired,
}

impl RemoteJobStatus {
    /// Map the remote status label; unknown labels degrade to `Failed`
    /// so the operation still resolves to a terminal state.
    pub fn from_remote(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "CREATED" => RemoteJobStatus::Created,
            "RUNNING" => RemoteJobStatus::Running,
            "COMPLETED" => RemoteJobStatus::Completed,
            "CANCELED" | "CANCELING" => RemoteJobStatus::Canceled,
            "EXPIRED" => RemoteJobStatus::Expired,
            _ => RemoteJobStatus::Failed,
        }
    }

    /// Whether the remote side is done with this job.
    pub fn is_terminal(self) -> bool {
        !matches!(self, RemoteJobStatus::Created | RemoteJobStatus::Running)
    }
}

/// One idempotent read of remote job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResult {
    pub status: RemoteJobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl PollResult {
    /// Synthesized result for a job the remote side no longer knows
    /// about (result retention window elapsed).
    pub fn expired() -> Self {
        Self {
            status: RemoteJobStatus::Expired,
            error_code: None,
            object_count: None,
            result_file_url: None,
            created_at: None,
            completed_at: None,
        }
    }

    /// Synthesized result for a poll that could not reach the remote
    /// side at all.
    pub fn poll_failed() -> Self {
        Self {
            status: RemoteJobStatus::Failed,
            error_code: Some(POLL_ERROR_CODE.to_string()),
            object_count: None,
            result_file_url: None,
            created_at: None,
            completed_at: None,
        }
    }
}

/// One form parameter of a staged-upload target.
#[derive(Debug, Clone, Deserialize)]
pub struct StagedParameter {
    pub name: String,
    pub value: String,
}

/// Upload target returned by the staged-upload handshake.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedTarget {
    pub url: String,
    #[serde(default)]
    pub resource_url: Option<String>,
    pub parameters: Vec<StagedParameter>,
}

impl StagedTarget {
    /// The storage key to reference at job submission.
    pub fn key(&self) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == "key")
            .map(|p| p.value.as_str())
    }
}

/// Outcome of a bulk-job submission.
#[derive(Debug, Clone)]
pub struct BulkSubmission {
    /// Remote job id, when the job was accepted.
    pub job_id: Option<String>,
    /// User-facing validation errors, when it was not.
    pub user_errors: Vec<String>,
}

/// Seam over the plain-HTTP file side channels of the bulk protocol.
#[async_trait]
pub trait FileTransfer: Send + Sync {
    /// POST the job file to a staged-upload target as multipart form
    /// data, parameters first, then the file part.
    async fn upload(&self, target: &StagedTarget, content: String)
        -> Result<(), CatalogApiError>;

    /// Download a result file as text.
    async fn download(&self, url: &str) -> Result<String, CatalogApiError>;
}

#[async_trait]
impl FileTransfer for CatalogApi {
    async fn upload(
        &self,
        target: &StagedTarget,
        content: String,
    ) -> Result<(), CatalogApiError> {
        let mut form = reqwest::multipart::Form::new();
        for param in &target.parameters {
            form = form.text(param.name.clone(), param.value.clone());
        }
        form = form.part(
            "file",
            reqwest::multipart::Part::text(content)
                .file_name("bulk_job.jsonl")
                .mime_str("text/jsonl")?,
        );

        let response = self.http().post(&target.url).multipart(form).send().await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<String, CatalogApiError> {
        let response = self.http().get(url).send().await?;
        let response = Self::ensure_success(response).await?;
        Ok(response.text().await?)
    }
}

/// Request a staged-upload target for a JSONL job file.
pub async fn staged_uploads_create<E: GraphqlExecute>(
    exec: &E,
    filename: &str,
) -> Result<StagedTarget, CatalogError> {
    let variables = serde_json::json!({
        "input": [{
            "resource": "BULK_MUTATION_VARIABLES",
            "filename": filename,
            "mimeType": "text/jsonl",
            "httpMethod": "POST",
        }]
    });

    let response = exec.execute(STAGED_UPLOAD_MUTATION, variables).await?;
    if !response.errors.is_empty() {
        return Err(CatalogError::Graphql(response.error_text()));
    }
    let data = response
        .data
        .ok_or_else(|| CatalogError::Malformed("response missing data".into()))?;
    let payload = &data["stagedUploadsCreate"];

    let user_errors = collect_user_errors(&payload["userErrors"]);
    if !user_errors.is_empty() {
        return Err(CatalogError::Graphql(user_errors.join("; ")));
    }

    let target = payload["stagedTargets"]
        .as_array()
        .and_then(|targets| targets.first())
        .ok_or_else(|| CatalogError::Malformed("no staged target returned".into()))?;

    serde_json::from_value(target.clone())
        .map_err(|e| CatalogError::Malformed(format!("bad staged target: {e}")))
}

/// Submit the bulk job referencing a staged file.
///
/// Remote user-errors are returned in the submission, not as an `Err`:
/// the caller decides how to persist and surface them.
pub async fn submit_bulk_mutation<E: GraphqlExecute>(
    exec: &E,
    mutation: &str,
    staged_upload_path: &str,
) -> Result<BulkSubmission, CatalogError> {
    let variables = serde_json::json!({
        "mutation": mutation,
        "stagedUploadPath": staged_upload_path,
    });

    let response = exec.execute(BULK_SUBMIT_MUTATION, variables).await?;
    if !response.errors.is_empty() {
        return Err(CatalogError::Graphql(response.error_text()));
    }
    let data = response
        .data
        .ok_or_else(|| CatalogError::Malformed("response missing data".into()))?;
    let payload = &data["bulkOperationRunMutation"];

    Ok(BulkSubmission {
        job_id: payload["bulkOperation"]["id"].as_str().map(str::to_string),
        user_errors: collect_user_errors(&payload["userErrors"]),
    })
}

/// Poll one job. Never raises: a job the remote side no longer knows
/// about synthesizes EXPIRED, and a transport failure synthesizes a
/// FAILED result carrying [`POLL_ERROR_CODE`].
pub async fn poll_job<E: GraphqlExecute>(exec: &E, remote_job_id: &str) -> PollResult {
    let variables = serde_json::json!({ "id": remote_job_id });

    let response = match exec.execute(JOB_STATUS_QUERY, variables).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(remote_job_id, error = %err, "Job poll failed");
            return PollResult::poll_failed();
        }
    };

    if !response.errors.is_empty() {
        tracing::warn!(
            remote_job_id,
            errors = %response.error_text(),
            "Job poll returned errors",
        );
        return PollResult::poll_failed();
    }

    let node = response
        .data
        .as_ref()
        .map(|d| d["node"].clone())
        .unwrap_or(serde_json::Value::Null);

    if node.is_null() || node.get("id").is_none() {
        // Result files expire after a fixed retention window; a very
        // old job simply disappears from the remote side.
        return PollResult::expired();
    }

    parse_poll_node(&node)
}

/// The tenant's currently-running mutation job, if any.
pub async fn current_job<E: GraphqlExecute>(
    exec: &E,
) -> Result<Option<PollResult>, CatalogError> {
    let response = exec.execute(CURRENT_JOB_QUERY, serde_json::json!({})).await?;
    if !response.errors.is_empty() {
        return Err(CatalogError::Graphql(response.error_text()));
    }

    let node = response
        .data
        .as_ref()
        .map(|d| d["currentBulkOperation"].clone())
        .unwrap_or(serde_json::Value::Null);

    if node.is_null() {
        return Ok(None);
    }
    Ok(Some(parse_poll_node(&node)))
}

fn parse_poll_node(node: &serde_json::Value) -> PollResult {
    PollResult {
        status: RemoteJobStatus::from_remote(node["status"].as_str().unwrap_or_default()),
        error_code: node["errorCode"].as_str().map(str::to_string),
        object_count: parse_count(&node["objectCount"]),
        result_file_url: node["url"].as_str().map(str::to_string),
        created_at: parse_timestamp(&node["createdAt"]),
        completed_at: parse_timestamp(&node["completedAt"]),
    }
}

/// Counts arrive as JSON strings on some API versions.
fn parse_count(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_timestamp(value: &serde_json::Value) -> Option<Timestamp> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

fn collect_user_errors(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .map(|e| {
                    let message = e["message"].as_str().unwrap_or("unknown error");
                    match e["field"].as_array() {
                        Some(parts) if !parts.is_empty() => {
                            let path: Vec<&str> =
                                parts.iter().filter_map(|p| p.as_str()).collect();
                            format!("{}: {message}", path.join("."))
                        }
                        _ => message.to_string(),
                    }
                })
                .collect()
        })
        .unwrap_or_default()
}
