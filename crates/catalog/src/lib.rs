//! Remote catalog client.
//!
//! Everything that talks to the catalog's GraphQL API lives here: the
//! raw endpoint client, the retry/backoff transport with throttle
//! detection, the cross-call rate-limit monitor, the windowed batch
//! helper, the paginated query client, and the asynchronous bulk-job
//! protocol (staged upload, submission, polling, result download).

pub mod api;
pub mod batch;
pub mod bulk;
pub mod queries;
pub mod rate_limit;
pub mod transport;

pub use api::{CatalogApi, CatalogApiError, GraphqlExecute, GraphqlResponse};
pub use transport::{RetryConfig, Transport};

/// Errors from the catalog client above the raw HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The underlying request failed.
    #[error(transparent)]
    Api(#[from] CatalogApiError),

    /// The API returned response-level GraphQL errors.
    #[error("catalog API error: {0}")]
    Graphql(String),

    /// The response did not have the expected shape.
    #[error("malformed catalog response: {0}")]
    Malformed(String),
}
