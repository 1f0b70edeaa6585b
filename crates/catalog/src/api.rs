//! Raw GraphQL endpoint client for the remote catalog API.
//!
//! Wraps the catalog's single GraphQL endpoint with [`reqwest`], plus
//! the two plain-HTTP side channels the bulk protocol needs: the
//! multipart staged-upload POST and the result-file download.

use async_trait::async_trait;
use serde::Deserialize;

/// HTTP client for one catalog API endpoint.
pub struct CatalogApi {
    client: reqwest::Client,
    endpoint: String,
    access_token: String,
}

/// Envelope of every GraphQL response.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse {
    /// The `data` object; absent when the query failed outright.
    pub data: Option<serde_json::Value>,
    /// Response-level errors (including throttling signals).
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
    /// Cost/throttle envelope, when the API reports one.
    pub extensions: Option<ResponseExtensions>,
}

/// One entry of a response's error list.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<ErrorExtensions>,
}

/// Machine-readable error metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorExtensions {
    pub code: Option<String>,
}

/// `extensions` block of a successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseExtensions {
    pub cost: Option<QueryCost>,
}

/// Query cost accounting reported by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCost {
    pub requested_query_cost: f64,
    #[serde(default)]
    pub actual_query_cost: Option<f64>,
    #[serde(default)]
    pub throttle_status: Option<ThrottleStatus>,
}

/// Current state of the tenant's rate budget.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStatus {
    pub maximum_available: f64,
    pub currently_available: f64,
    pub restore_rate: f64,
}

impl GraphqlResponse {
    /// Whether the error list carries the API's throttling signal.
    pub fn is_throttled(&self) -> bool {
        self.errors.iter().any(|e| {
            e.extensions
                .as_ref()
                .and_then(|x| x.code.as_deref())
                .map(|code| code.eq_ignore_ascii_case("THROTTLED"))
                .unwrap_or(false)
                || e.message.to_ascii_lowercase().contains("throttled")
        })
    }

    /// The throttle status from the cost envelope, if reported.
    pub fn throttle_status(&self) -> Option<ThrottleStatus> {
        self.extensions
            .as_ref()
            .and_then(|x| x.cost.as_ref())
            .and_then(|c| c.throttle_status)
    }

    /// Concatenated response-level error messages.
    pub fn error_text(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Errors from the raw catalog API layer.
#[derive(Debug, thiserror::Error)]
pub enum CatalogApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("catalog API error ({status}): {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Throttling persisted through the whole retry budget.
    #[error("request throttled after {attempts} attempts")]
    ThrottleExhausted { attempts: u32 },
}

/// Seam over a single GraphQL call, so the retry transport, the batch
/// helper, and the orchestrator can all be exercised against fakes.
#[async_trait]
pub trait GraphqlExecute: Send + Sync {
    /// Issue one GraphQL request.
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphqlResponse, CatalogApiError>;
}

impl CatalogApi {
    /// Create a client for an endpoint, authenticating with the given
    /// access token (supplied by the session layer, outside this core).
    pub fn new(endpoint: String, access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            access_token,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, endpoint: String, access_token: String) -> Self {
        Self {
            client,
            endpoint,
            access_token,
        }
    }

    /// The underlying HTTP client, for the plain-HTTP side channels.
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or [`CatalogApiError::Http`]
    /// containing the status and body text on failure.
    pub(crate) async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CatalogApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(CatalogApiError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GraphqlExecute for CatalogApi {
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<GraphqlResponse, CatalogApiError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Access-Token", &self.access_token)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.json::<GraphqlResponse>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(json: serde_json::Value) -> GraphqlResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn throttled_code_is_detected() {
        let resp = response_from(serde_json::json!({
            "errors": [
                { "message": "over quota", "extensions": { "code": "THROTTLED" } }
            ]
        }));
        assert!(resp.is_throttled());
    }

    #[test]
    fn plain_errors_are_not_throttling() {
        let resp = response_from(serde_json::json!({
            "errors": [{ "message": "field does not exist" }]
        }));
        assert!(!resp.is_throttled());
        assert_eq!(resp.error_text(), "field does not exist");
    }

    #[test]
    fn cost_envelope_parses() {
        let resp = response_from(serde_json::json!({
            "data": {},
            "extensions": {
                "cost": {
                    "requestedQueryCost": 102.0,
                    "actualQueryCost": 46.0,
                    "throttleStatus": {
                        "maximumAvailable": 1000.0,
                        "currentlyAvailable": 954.0,
                        "restoreRate": 50.0
                    }
                }
            }
        }));
        let status = resp.throttle_status().unwrap();
        assert_eq!(status.currently_available, 954.0);
        assert_eq!(status.restore_rate, 50.0);
    }
}
