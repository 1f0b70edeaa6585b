//! Domain-level error type shared across the workspace.

/// Errors produced by domain logic, independent of any transport.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup found nothing.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"operation"`.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Caller input failed validation; nothing was persisted.
    #[error("{0}")]
    Validation(String),

    /// The request conflicts with current state (e.g. a job is
    /// already running for the tenant).
    #[error("{0}")]
    Conflict(String),

    /// An unexpected internal failure.
    #[error("{0}")]
    Internal(String),
}
