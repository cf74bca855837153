//! The normalization pipeline: adapter, then calculator, then bundle.

use serde_json::Value;
use tracing::debug;

use crate::aggregate::summarize_subjects;
use crate::error::NormalizeError;
use crate::ids::IdGenerator;
use crate::providers::Provider;
use crate::schema::{AverageOverview, NormalizedGrades};

/// Normalizes one already-fetched provider payload.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedPayload`] when the payload lacks the
/// structure the provider expects. Unreadable individual fields never fail
/// the pass; they come back disabled.
#[tracing::instrument(skip_all, fields(provider = provider.name()))]
pub fn normalize(
    provider: &dyn Provider,
    payload: &Value,
    ids: &mut dyn IdGenerator,
) -> Result<NormalizedGrades, NormalizeError> {
    let extraction = provider.extract(payload, ids)?;
    let subjects = summarize_subjects(&extraction.groups, provider.policy());

    let records: Vec<_> = extraction
        .groups
        .into_iter()
        .flat_map(|g| g.records)
        .collect();

    debug!(
        records = records.len(),
        subjects = subjects.len(),
        "Payload normalized"
    );

    Ok(NormalizedGrades {
        records,
        averages: AverageOverview {
            overall: extraction.overall,
            class_overall: extraction.class_overall,
            subjects,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::providers::ProviderKind;
    use crate::schema::Field;
    use serde_json::json;

    #[test]
    fn test_records_keep_subject_order() {
        let payload = json!({
            "relevé": {
                "ressources": {
                    "R2": { "titre": "B", "evaluations": [{ "note": { "value": "10" } }] },
                    "R1": { "titre": "A", "evaluations": [{ "note": { "value": "12" } }] }
                }
            }
        });

        let provider = ProviderKind::Scodoc.provider();
        let result = normalize(&provider, &payload, &mut SequentialIds::default()).unwrap();

        let names: Vec<_> = result.records.iter().map(|r| r.subject_name()).collect();
        assert_eq!(names, vec!["B > R2", "A > R1"]);
        assert_eq!(result.averages.subjects[0].subject_name, "B > R2");
        assert_eq!(result.averages.subjects[1].average, Field::Present(12.0));
    }

    #[test]
    fn test_missing_grouping_aborts() {
        let provider = ProviderKind::Scodoc.provider();
        let err = normalize(&provider, &json!({}), &mut SequentialIds::default()).unwrap_err();
        assert!(matches!(err, NormalizeError::MalformedPayload { .. }));
    }
}
