//! Transformation specs: what a bulk edit does to each record.
//!
//! The two supported kinds are price adjustments and tag updates.
//! Adding a third kind means adding one variant here and one match arm
//! at each of the four exhaustive matches (preview, job-line
//! serialization, inverse computation, undo reconstruction).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound on the percentage of a price adjustment.
pub const MAX_PERCENTAGE: f64 = 1000.0;

/// Direction of a price adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceDirection {
    Increase,
    Decrease,
}

impl PriceDirection {
    /// The opposite direction, used when deriving the inverse spec.
    pub fn flipped(self) -> Self {
        match self {
            PriceDirection::Increase => PriceDirection::Decrease,
            PriceDirection::Decrease => PriceDirection::Increase,
        }
    }
}

/// What a tag update does with its tag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagAction {
    Add,
    Remove,
    Replace,
}

/// A bulk transformation, tagged by `kind` in its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformationSpec {
    /// Multiply every variant price by `1 ± percentage/100`.
    PriceAdjustment {
        direction: PriceDirection,
        percentage: f64,
    },
    /// Add, remove, or replace the record's tag set.
    TagUpdate {
        action: TagAction,
        tags: Vec<String>,
    },
}

impl TransformationSpec {
    /// Validate caller input before anything is fetched or persisted.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            TransformationSpec::PriceAdjustment { percentage, .. } => {
                if !percentage.is_finite() || *percentage <= 0.0 {
                    return Err(CoreError::Validation(
                        "percentage must be greater than 0".to_string(),
                    ));
                }
                if *percentage > MAX_PERCENTAGE {
                    return Err(CoreError::Validation(format!(
                        "percentage must not exceed {MAX_PERCENTAGE}"
                    )));
                }
                Ok(())
            }
            TransformationSpec::TagUpdate { tags, .. } => {
                if tags.is_empty() {
                    return Err(CoreError::Validation(
                        "tags must not be empty".to_string(),
                    ));
                }
                if tags.iter().any(|t| t.trim().is_empty()) {
                    return Err(CoreError::Validation(
                        "tags must not contain blank entries".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Price multiplier derived from direction and percentage.
    ///
    /// Floored at 0 so a decrease can never produce a negative price.
    /// Only meaningful for `PriceAdjustment`.
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            TransformationSpec::PriceAdjustment {
                direction,
                percentage,
            } => {
                let delta = percentage / 100.0;
                let m = match direction {
                    PriceDirection::Increase => 1.0 + delta,
                    PriceDirection::Decrease => 1.0 - delta,
                };
                Some(m.max(0.0))
            }
            TransformationSpec::TagUpdate { .. } => None,
        }
    }

    /// Apply a price adjustment to a single price, rounded to cents.
    ///
    /// Returns `None` for non-price specs.
    pub fn apply_price(&self, price: f64) -> Option<f64> {
        self.multiplier().map(|m| round2(price * m))
    }

    /// Apply a tag update to a record's current tag set.
    ///
    /// Returns `None` for non-tag specs. Order of surviving tags is
    /// preserved; added tags append in spec order without duplicates.
    pub fn apply_tags(&self, current: &[String]) -> Option<Vec<String>> {
        match self {
            TransformationSpec::TagUpdate { action, tags } => {
                let result = match action {
                    TagAction::Add => {
                        let mut out = current.to_vec();
                        for tag in tags {
                            if !out.iter().any(|t| t == tag) {
                                out.push(tag.clone());
                            }
                        }
                        out
                    }
                    TagAction::Remove => current
                        .iter()
                        .filter(|t| !tags.contains(t))
                        .cloned()
                        .collect(),
                    TagAction::Replace => tags.clone(),
                };
                Some(result)
            }
            TransformationSpec::PriceAdjustment { .. } => None,
        }
    }

    /// The mathematically-opposite spec.
    ///
    /// For price adjustments the direction flips with the same
    /// percentage. For tag updates, add and remove swap; replace stays
    /// replace, with per-record restoration coming from the payload
    /// snapshot rather than this spec's tag list.
    pub fn inverse(&self) -> TransformationSpec {
        match self {
            TransformationSpec::PriceAdjustment {
                direction,
                percentage,
            } => TransformationSpec::PriceAdjustment {
                direction: direction.flipped(),
                percentage: *percentage,
            },
            TransformationSpec::TagUpdate { action, tags } => {
                let inverse_action = match action {
                    TagAction::Add => TagAction::Remove,
                    TagAction::Remove => TagAction::Add,
                    TagAction::Replace => TagAction::Replace,
                };
                TransformationSpec::TagUpdate {
                    action: inverse_action,
                    tags: tags.clone(),
                }
            }
        }
    }

    /// Stable snake_case kind label used for events and persistence.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TransformationSpec::PriceAdjustment { .. } => "price_adjustment",
            TransformationSpec::TagUpdate { .. } => "tag_update",
        }
    }
}

/// Round to two decimal places (cents).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn price_spec(direction: PriceDirection, percentage: f64) -> TransformationSpec {
        TransformationSpec::PriceAdjustment {
            direction,
            percentage,
        }
    }

    #[test]
    fn increase_applies_percentage_with_rounding() {
        let spec = price_spec(PriceDirection::Increase, 10.0);
        assert_eq!(spec.apply_price(20.0), Some(22.0));
        assert_eq!(spec.apply_price(19.99), Some(21.99));
    }

    #[test]
    fn decrease_floors_at_zero() {
        let spec = price_spec(PriceDirection::Decrease, 1000.0);
        assert_eq!(spec.apply_price(15.0), Some(0.0));

        let spec = price_spec(PriceDirection::Decrease, 100.0);
        assert_eq!(spec.apply_price(9.99), Some(0.0));
    }

    #[test]
    fn forward_then_inverse_returns_near_original() {
        let spec = price_spec(PriceDirection::Increase, 10.0);
        let inverse = spec.inverse();
        assert_matches!(
            inverse,
            TransformationSpec::PriceAdjustment {
                direction: PriceDirection::Decrease,
                ..
            }
        );
        // Inverse undoes forward at payload level (before/after swap),
        // so the property to hold here is direction/percentage symmetry.
        assert_eq!(inverse.inverse(), spec);
    }

    #[test]
    fn zero_percentage_rejected() {
        let spec = price_spec(PriceDirection::Increase, 0.0);
        assert_matches!(spec.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn excessive_percentage_rejected() {
        let spec = price_spec(PriceDirection::Increase, 1000.1);
        assert_matches!(spec.validate(), Err(CoreError::Validation(_)));
        assert!(price_spec(PriceDirection::Decrease, 1000.0).validate().is_ok());
    }

    #[test]
    fn empty_tag_list_rejected() {
        let spec = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec![],
        };
        assert_matches!(spec.validate(), Err(CoreError::Validation(_)));

        let spec = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec!["sale".into(), "  ".into()],
        };
        assert_matches!(spec.validate(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn tag_add_deduplicates() {
        let spec = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec!["sale".into(), "new".into()],
        };
        let current = vec!["sale".to_string(), "summer".to_string()];
        assert_eq!(
            spec.apply_tags(&current),
            Some(vec!["sale".into(), "summer".into(), "new".into()])
        );
    }

    #[test]
    fn tag_remove_and_replace() {
        let current = vec!["sale".to_string(), "summer".to_string()];

        let remove = TransformationSpec::TagUpdate {
            action: TagAction::Remove,
            tags: vec!["sale".into()],
        };
        assert_eq!(remove.apply_tags(&current), Some(vec!["summer".into()]));

        let replace = TransformationSpec::TagUpdate {
            action: TagAction::Replace,
            tags: vec!["clearance".into()],
        };
        assert_eq!(replace.apply_tags(&current), Some(vec!["clearance".into()]));
    }

    #[test]
    fn tag_inverse_swaps_add_and_remove() {
        let add = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec!["sale".into()],
        };
        assert_matches!(
            add.inverse(),
            TransformationSpec::TagUpdate {
                action: TagAction::Remove,
                ..
            }
        );
        assert_eq!(add.inverse().inverse(), add);
    }

    #[test]
    fn spec_serde_is_kind_tagged() {
        let spec = price_spec(PriceDirection::Increase, 10.0);
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "price_adjustment");
        assert_eq!(json["direction"], "increase");

        let back: TransformationSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }
}
