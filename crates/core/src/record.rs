//! Normalized catalog record snapshot.
//!
//! The catalog client parses GraphQL responses into these shapes; the
//! preview engine and payload builder consume them without knowing
//! anything about the wire format.

use serde::{Deserialize, Serialize};

/// A product record as seen by the preview engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordState {
    /// Remote record id (opaque GID string).
    pub id: String,
    pub title: String,
    /// Remote status label, e.g. `"ACTIVE"` or `"DRAFT"`.
    pub status: String,
    pub tags: Vec<String>,
    pub variants: Vec<VariantState>,
}

/// One sellable variant of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantState {
    /// Remote variant id (opaque GID string).
    pub id: String,
    pub title: String,
    /// Current price, normalized to two decimal places.
    pub price: f64,
}
