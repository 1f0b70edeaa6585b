//! Bulkpress domain logic.
//!
//! Pure, I/O-free building blocks for the bulk-editing workflow:
//! transformation specs, preview computation, persisted payload
//! snapshots, job-file rendering, and result-file parsing. Everything
//! that talks to the network or the database lives in the sibling
//! crates (`bulkpress-catalog`, `bulkpress-db`).

pub mod error;
pub mod jobfile;
pub mod payload;
pub mod preview;
pub mod record;
pub mod results;
pub mod transformation;
pub mod types;
