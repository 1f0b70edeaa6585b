//! Bulk-job input file construction.
//!
//! The remote catalog executes a bulk job by running one mutation per
//! line of a staged JSONL file. Each line holds exactly the variables
//! for the mutation applied to one record; the mutation template
//! itself is passed separately at submission time.

use crate::error::CoreError;
use crate::payload::OperationPayload;
use crate::transformation::TransformationSpec;

/// Mutation template for per-record variant price updates.
pub const PRICE_MUTATION: &str = "\
mutation call($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id }
    userErrors { field message }
  }
}";

/// Mutation template for per-record tag replacement.
pub const TAG_MUTATION: &str = "\
mutation call($input: ProductInput!) {
  productUpdate(input: $input) {
    product { id }
    userErrors { field message }
  }
}";

/// The mutation template matching a spec's kind.
pub fn mutation_template(spec: &TransformationSpec) -> &'static str {
    match spec {
        TransformationSpec::PriceAdjustment { .. } => PRICE_MUTATION,
        TransformationSpec::TagUpdate { .. } => TAG_MUTATION,
    }
}

/// Render the JSONL job file for a forward payload.
///
/// One line per affected record. Prices are rendered as two-decimal
/// strings, which is what the remote money scalar expects.
pub fn render_job_lines(payload: &OperationPayload) -> Result<String, CoreError> {
    let mut lines = Vec::with_capacity(payload.items.len());

    for item in &payload.items {
        let input = match &payload.spec {
            TransformationSpec::PriceAdjustment { .. } => {
                let variants: Vec<serde_json::Value> = item
                    .variants
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "id": v.variant_id,
                            "price": format!("{:.2}", v.after),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "id": item.record_id,
                    "variants": variants,
                })
            }
            TransformationSpec::TagUpdate { .. } => {
                let tags = item.tags_after.as_ref().ok_or_else(|| {
                    CoreError::Internal(format!(
                        "tag payload item {} missing tags_after",
                        item.record_id
                    ))
                })?;
                serde_json::json!({
                    "id": item.record_id,
                    "tags": tags,
                })
            }
        };

        let line = serde_json::to_string(&serde_json::json!({ "input": input }))
            .map_err(|e| CoreError::Internal(format!("job line serialization failed: {e}")))?;
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::build_preview;
    use crate::record::{RecordState, VariantState};
    use crate::transformation::{PriceDirection, TagAction};

    fn record(id: &str, price: f64, tags: &[&str]) -> RecordState {
        RecordState {
            id: id.to_string(),
            title: id.to_string(),
            status: "ACTIVE".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            variants: vec![VariantState {
                id: format!("{id}/v0"),
                title: "Default".to_string(),
                price,
            }],
        }
    }

    #[test]
    fn one_line_per_record_with_formatted_prices() {
        let spec = TransformationSpec::PriceAdjustment {
            direction: PriceDirection::Increase,
            percentage: 10.0,
        };
        let records = vec![record("p1", 20.0, &[]), record("p2", 50.0, &[])];
        let preview = build_preview(&spec, "USD", &records).unwrap();
        let payload = OperationPayload::from_preview(&preview);

        let body = render_job_lines(&payload).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["input"]["id"], "p1");
        assert_eq!(first["input"]["variants"][0]["price"], "22.00");
    }

    #[test]
    fn tag_lines_carry_final_tag_set() {
        let spec = TransformationSpec::TagUpdate {
            action: TagAction::Add,
            tags: vec!["sale".into()],
        };
        let records = vec![record("p1", 0.0, &["summer"])];
        let preview = build_preview(&spec, "USD", &records).unwrap();
        let payload = OperationPayload::from_preview(&preview);

        let body = render_job_lines(&payload).unwrap();
        let line: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            line["input"]["tags"],
            serde_json::json!(["summer", "sale"])
        );
    }
}
