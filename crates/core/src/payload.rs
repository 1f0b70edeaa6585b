//! Persisted operation payloads.
//!
//! An operation row stores two schema-versioned snapshots: the forward
//! transformation (what the job will do) and its precomputed inverse
//! (what undo would do). Both derive from the same preview snapshot so
//! they are exact opposites, and undo never re-fetches live state.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::preview::{PreviewItem, PreviewResult, VariantPreview};
use crate::transformation::TransformationSpec;

/// Current payload schema version. Bump on incompatible layout changes
/// so old rows can be migrated on read.
pub const PAYLOAD_SCHEMA_VERSION: u32 = 1;

/// The persisted snapshot of a transformation and its affected records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationPayload {
    pub version: u32,
    pub spec: TransformationSpec,
    pub currency: String,
    pub items: Vec<PayloadItem>,
}

/// One affected record's snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadItem {
    pub record_id: String,
    pub title: String,
    pub status: String,
    /// Tag set at snapshot time (before the transformation).
    pub tags_before: Vec<String>,
    /// Resulting tag set; `None` for price transformations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_after: Option<Vec<String>>,
    /// Per-variant price changes; empty for tag transformations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantChange>,
}

/// Before/after price of one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantChange {
    pub variant_id: String,
    pub title: String,
    pub before: f64,
    pub after: f64,
}

impl OperationPayload {
    /// Capture the forward payload from a confirmed preview.
    pub fn from_preview(preview: &PreviewResult) -> Self {
        let items = preview
            .items
            .iter()
            .map(|item| PayloadItem {
                record_id: item.record_id.clone(),
                title: item.title.clone(),
                status: item.status.clone(),
                tags_before: item.tags_before.clone(),
                tags_after: item.tags_after.clone(),
                variants: item
                    .variants
                    .iter()
                    .map(|v| VariantChange {
                        variant_id: v.variant_id.clone(),
                        title: v.title.clone(),
                        before: v.before,
                        after: v.after,
                    })
                    .collect(),
            })
            .collect();

        Self {
            version: PAYLOAD_SCHEMA_VERSION,
            spec: preview.spec.clone(),
            currency: preview.currency.clone(),
            items,
        }
    }

    /// The mathematically-opposite payload: spec inverted, every
    /// per-item before/after swapped.
    pub fn inverse(&self) -> OperationPayload {
        let items = self
            .items
            .iter()
            .map(|item| PayloadItem {
                record_id: item.record_id.clone(),
                title: item.title.clone(),
                status: item.status.clone(),
                tags_before: item
                    .tags_after
                    .clone()
                    .unwrap_or_else(|| item.tags_before.clone()),
                tags_after: item.tags_after.as_ref().map(|_| item.tags_before.clone()),
                variants: item
                    .variants
                    .iter()
                    .map(|v| VariantChange {
                        variant_id: v.variant_id.clone(),
                        title: v.title.clone(),
                        before: v.after,
                        after: v.before,
                    })
                    .collect(),
            })
            .collect();

        OperationPayload {
            version: PAYLOAD_SCHEMA_VERSION,
            spec: self.spec.inverse(),
            currency: self.currency.clone(),
            items,
        }
    }

    /// Reconstruct a preview-shaped result from this payload.
    ///
    /// Used by undo: the snapshot taken at original-job time is
    /// trusted as-is, so the reconstruction can diverge from current
    /// live state if other edits happened meanwhile.
    pub fn into_preview(self) -> PreviewResult {
        let items = self
            .items
            .into_iter()
            .map(|item| PreviewItem {
                record_id: item.record_id,
                title: item.title,
                status: item.status,
                tags_before: item.tags_before,
                tags_after: item.tags_after,
                variants: item
                    .variants
                    .into_iter()
                    .map(|v| VariantPreview {
                        variant_id: v.variant_id,
                        title: v.title,
                        before: v.before,
                        after: v.after,
                    })
                    .collect(),
            })
            .collect();

        PreviewResult {
            spec: self.spec,
            currency: self.currency,
            items,
        }
    }

    /// Decode a persisted JSON blob, checking the schema version.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        let payload: OperationPayload = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Internal(format!("malformed payload blob: {e}")))?;
        if payload.version != PAYLOAD_SCHEMA_VERSION {
            return Err(CoreError::Internal(format!(
                "unsupported payload schema version {}",
                payload.version
            )));
        }
        Ok(payload)
    }

    /// Encode for persistence as a JSONB column value.
    pub fn to_json(&self) -> Result<serde_json::Value, CoreError> {
        serde_json::to_value(self)
            .map_err(|e| CoreError::Internal(format!("payload serialization failed: {e}")))
    }

    /// Ids of all affected records, in payload order.
    pub fn record_ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.record_id.clone()).collect()
    }
}
