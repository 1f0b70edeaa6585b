//! In-memory preview computation.
//!
//! A preview is the before/after view shown to the user before a job
//! is submitted. It is never persisted and never mutates anything; it
//! is recomputed from live data for each confirmation round-trip, so
//! staleness between preview and submission is an accepted limitation.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::RecordState;
use crate::transformation::TransformationSpec;

/// The computed before/after view for a proposed transformation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub spec: TransformationSpec,
    /// Shop-wide currency code for price display.
    pub currency: String,
    pub items: Vec<PreviewItem>,
}

/// One record's before/after values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewItem {
    pub record_id: String,
    pub title: String,
    pub status: String,
    pub tags_before: Vec<String>,
    /// Present for tag transformations, `None` for price ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags_after: Option<Vec<String>>,
    /// Per-variant price changes; empty for tag transformations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<VariantPreview>,
}

/// Before/after price for a single variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantPreview {
    pub variant_id: String,
    pub title: String,
    pub before: f64,
    pub after: f64,
}

/// Compute the preview for `spec` over the given records.
///
/// Validates the spec and rejects an empty record set before doing any
/// work; neither path persists anything.
pub fn build_preview(
    spec: &TransformationSpec,
    currency: &str,
    records: &[RecordState],
) -> Result<PreviewResult, CoreError> {
    spec.validate()?;
    if records.is_empty() {
        return Err(CoreError::Validation(
            "no records selected".to_string(),
        ));
    }

    let items = records
        .iter()
        .map(|record| preview_item(spec, record))
        .collect();

    Ok(PreviewResult {
        spec: spec.clone(),
        currency: currency.to_string(),
        items,
    })
}

fn preview_item(spec: &TransformationSpec, record: &RecordState) -> PreviewItem {
    match spec {
        TransformationSpec::PriceAdjustment { .. } => {
            let variants = record
                .variants
                .iter()
                .map(|v| VariantPreview {
                    variant_id: v.id.clone(),
                    title: v.title.clone(),
                    before: v.price,
                    // apply_price is Some for price specs by construction.
                    after: spec.apply_price(v.price).unwrap_or(v.price),
                })
                .collect();
            PreviewItem {
                record_id: record.id.clone(),
                title: record.title.clone(),
                status: record.status.clone(),
                tags_before: record.tags.clone(),
                tags_after: None,
                variants,
            }
        }
        TransformationSpec::TagUpdate { .. } => PreviewItem {
            record_id: record.id.clone(),
            title: record.title.clone(),
            status: record.status.clone(),
            tags_before: record.tags.clone(),
            tags_after: spec.apply_tags(&record.tags),
            variants: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::VariantState;
    use crate::transformation::{PriceDirection, TagAction};
    use assert_matches::assert_matches;

    fn record(id: &str, prices: &[f64], tags: &[&str]) -> RecordState {
        RecordState {
            id: id.to_string(),
            title: format!("Record {id}"),
            status: "ACTIVE".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            variants: prices
                .iter()
                .enumerate()
                .map(|(i, p)| VariantState {
                    id: format!("{id}/v{i}"),
                    title: format!("Variant {i}"),
                    price: *p,
                })
                .collect(),
        }
    }

    #[test]
    fn price_preview_computes_after_values() {
        let spec = TransformationSpec::PriceAdjustment {
            direction: PriceDirection::Increase,
            percentage: 10.0,
        };
        let records = vec![record("p1", &[20.0], &[]), record("p2", &[50.0], &[])];

        let preview = build_preview(&spec, "EUR", &records).unwrap();
        assert_eq!(preview.currency, "EUR");
        assert_eq!(preview.items.len(), 2);
        assert_eq!(preview.items[0].variants[0].after, 22.0);
        assert_eq!(preview.items[1].variants[0].after, 55.0);
        assert!(preview.items[0].tags_after.is_none());
    }

    #[test]
    fn tag_preview_computes_after_tags() {
        let spec = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec!["sale".into()],
        };
        let records = vec![record("p1", &[], &["summer"])];

        let preview = build_preview(&spec, "EUR", &records).unwrap();
        assert_eq!(
            preview.items[0].tags_after,
            Some(vec!["summer".to_string(), "sale".to_string()])
        );
        assert!(preview.items[0].variants.is_empty());
    }

    #[test]
    fn empty_selection_rejected() {
        let spec = TransformationSpec::PriceAdjustment {
            direction: PriceDirection::Increase,
            percentage: 10.0,
        };
        assert_matches!(
            build_preview(&spec, "EUR", &[]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn invalid_spec_rejected_before_compute() {
        let spec = TransformationSpec::PriceAdjustment {
            direction: PriceDirection::Increase,
            percentage: 0.0,
        };
        let records = vec![record("p1", &[20.0], &[])];
        assert_matches!(
            build_preview(&spec, "EUR", &records),
            Err(CoreError::Validation(_))
        );
    }
}
