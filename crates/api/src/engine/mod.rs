//! The bulk-job engine.
//!
//! [`Orchestrator`] owns the operation lifecycle: admission, job-file
//! construction and upload, submission, polling, terminal-state
//! reconciliation, and undo. It is generic over the two external
//! collaborators — the [`CatalogGateway`] (remote API) and the
//! [`OperationStore`] (persistence) — so the whole state machine is
//! exercisable against in-memory fakes.

pub mod gateway;
pub mod orchestrator;
pub mod store;

pub use gateway::{CatalogGateway, LiveCatalog};
pub use orchestrator::Orchestrator;
pub use store::{OperationStore, PgOperationStore};

/// The engine as wired in production.
pub type AppEngine = Orchestrator<PgOperationStore, LiveCatalog>;
