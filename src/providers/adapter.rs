use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use super::{Extraction, Provider, SubjectGrades};
use crate::error::NormalizeError;
use crate::ids::IdGenerator;
use crate::mapping::{AggregationPolicy, BonusRule, GroupSource, MappingTable};
use crate::parse::{parse_flag, parse_number, parse_text, parse_timestamp};
use crate::schema::{Field, GradeRecord, Subject};

/// Runs a [`MappingTable`] against raw payloads.
#[derive(Debug, Clone)]
pub struct TableProvider {
    table: MappingTable,
}

impl TableProvider {
    /// Wraps a table after validating its pointers.
    pub fn new(table: MappingTable) -> Result<Self, NormalizeError> {
        table.validate()?;
        Ok(Self { table })
    }

    pub(crate) fn new_unchecked(table: MappingTable) -> Self {
        Self { table }
    }

    fn extract_groups(
        &self,
        source: &GroupSource,
        payload: &Value,
        ids: &mut dyn IdGenerator,
        out: &mut Vec<SubjectGrades>,
    ) -> Result<(), NormalizeError> {
        let groups = match payload.pointer(&source.pointer) {
            Some(groups) => groups,
            None if source.required => {
                return Err(NormalizeError::malformed(
                    &source.pointer,
                    "missing subject grouping",
                ));
            }
            None => {
                debug!(pointer = %source.pointer, "Optional group source absent");
                return Ok(());
            }
        };

        match groups {
            Value::Object(map) => {
                for (key, group) in map {
                    let path = format!("{}/{}", source.pointer, escape_token(key));
                    out.push(self.extract_group(key, group, &path, ids)?);
                }
            }
            Value::Array(items) => {
                for (index, group) in items.iter().enumerate() {
                    let path = format!("{}/{}", source.pointer, index);
                    out.push(self.extract_group(&index.to_string(), group, &path, ids)?);
                }
            }
            other => {
                return Err(NormalizeError::malformed(
                    &source.pointer,
                    format!("expected an object or array of subjects, found {}", kind(other)),
                ));
            }
        }

        Ok(())
    }

    fn extract_group(
        &self,
        key: &str,
        group: &Value,
        path: &str,
        ids: &mut dyn IdGenerator,
    ) -> Result<SubjectGrades, NormalizeError> {
        if !group.is_object() {
            return Err(NormalizeError::malformed(
                path,
                format!("expected a subject object, found {}", kind(group)),
            ));
        }

        let subject = Arc::new(Subject {
            id: ids.next_id(),
            name: self.subject_name(key, group),
        });

        let evaluations_path = format!("{}{}", path, self.table.evaluations);
        let entries = group
            .pointer(&self.table.evaluations)
            .ok_or_else(|| NormalizeError::malformed(&evaluations_path, "missing evaluation list"))?
            .as_array()
            .ok_or_else(|| {
                NormalizeError::malformed(&evaluations_path, "evaluation list is not an array")
            })?;

        let mut records = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if !entry.is_object() {
                return Err(NormalizeError::malformed(
                    format!("{evaluations_path}/{index}"),
                    format!("expected an evaluation object, found {}", kind(entry)),
                ));
            }
            records.push(self.build_record(entry, &subject, ids));
        }

        debug!(subject = %subject.name, records = records.len(), "Subject extracted");
        Ok(SubjectGrades { subject, records })
    }

    fn subject_name(&self, key: &str, group: &Value) -> String {
        let rule = &self.table.subject_name;
        let mut parts: Vec<String> = rule
            .parts
            .iter()
            .filter_map(|p| group.pointer(p).and_then(parse_text))
            .collect();

        if rule.append_key || parts.is_empty() {
            parts.push(key.to_string());
        }

        parts.join(&rule.separator)
    }

    fn build_record(
        &self,
        entry: &Value,
        subject: &Arc<Subject>,
        ids: &mut dyn IdGenerator,
    ) -> GradeRecord {
        let fields = &self.table.fields;
        let number = |pointer: Option<&str>, name: &'static str| -> Field<f64> {
            let Some(pointer) = pointer else {
                return Field::Disabled;
            };
            let parsed = entry.pointer(pointer).and_then(parse_number);
            if parsed.is_none() {
                trace!(field = name, pointer, raw = ?entry.pointer(pointer), "Field disabled");
            }
            parsed.into()
        };

        let out_of = match &fields.out_of {
            Some(pointer) => number(Some(pointer.as_str()), "out_of"),
            None => Field::Present(self.table.default_out_of),
        };

        let timestamp: Field<_> = fields
            .date
            .as_deref()
            .and_then(|p| entry.pointer(p))
            .and_then(parse_timestamp)
            .into();
        if timestamp.is_disabled() {
            trace!(field = "date", "Field disabled");
        }

        let is_bonus = match &fields.bonus {
            Some(BonusRule::Flag(pointer)) => entry.pointer(pointer).is_some_and(parse_flag),
            Some(BonusRule::Equals { pointer, equals }) => {
                entry.pointer(pointer).is_some_and(|v| values_match(v, equals))
            }
            None => false,
        };

        GradeRecord {
            id: ids.next_id(),
            student_value: number(Some(fields.student.as_str()), "student"),
            min_value: number(fields.min.as_deref(), "min"),
            max_value: number(fields.max.as_deref(), "max"),
            class_average_value: number(fields.class_average.as_deref(), "class_average"),
            is_out_of_20: out_of.get() == Some(20.0),
            out_of,
            default_out_of: self.table.default_out_of,
            coefficient: number(fields.coefficient.as_deref(), "coefficient"),
            timestamp,
            description: fields
                .description
                .as_deref()
                .and_then(|p| entry.pointer(p))
                .and_then(parse_text),
            subject: Arc::clone(subject),
            is_bonus,
            is_optional: fields
                .optional
                .as_deref()
                .and_then(|p| entry.pointer(p))
                .is_some_and(parse_flag),
        }
    }

    fn overall_field(&self, payload: &Value, pointer: Option<&str>) -> Field<f64> {
        pointer
            .and_then(|p| payload.pointer(p))
            .and_then(parse_number)
            .into()
    }
}

impl Provider for TableProvider {
    fn name(&self) -> &str {
        &self.table.name
    }

    fn policy(&self) -> AggregationPolicy {
        self.table.policy
    }

    fn extract(
        &self,
        payload: &Value,
        ids: &mut dyn IdGenerator,
    ) -> Result<Extraction, NormalizeError> {
        let mut groups = Vec::new();
        for source in &self.table.groups {
            self.extract_groups(source, payload, ids, &mut groups)?;
        }

        Ok(Extraction {
            groups,
            overall: self.overall_field(payload, self.table.overall.overall.as_deref()),
            class_overall: self.overall_field(payload, self.table.overall.class_overall.as_deref()),
        })
    }
}

/// Numbers compare numerically so `3` matches `"3"` and `3.0`.
fn values_match(value: &Value, expected: &Value) -> bool {
    match (parse_number(value), parse_number(expected)) {
        (Some(a), Some(b)) => a == b,
        _ => value == expected,
    }
}

fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::mapping::{FieldPointers, OverallPointers, SubjectNameRule};
    use serde_json::json;

    fn table() -> MappingTable {
        MappingTable {
            name: "test".to_string(),
            groups: vec![GroupSource {
                pointer: "/courses".to_string(),
                required: true,
            }],
            subject_name: SubjectNameRule {
                parts: vec!["/label".to_string()],
                separator: " > ".to_string(),
                append_key: false,
            },
            evaluations: "/marks".to_string(),
            fields: FieldPointers {
                student: "/score".to_string(),
                min: Some("/low".to_string()),
                out_of: Some("/scale".to_string()),
                date: Some("/when".to_string()),
                bonus: Some(BonusRule::Equals {
                    pointer: "/kind".to_string(),
                    equals: json!(3),
                }),
                optional: Some("/optional".to_string()),
                ..Default::default()
            },
            default_out_of: 20.0,
            overall: OverallPointers::default(),
            policy: AggregationPolicy::default(),
        }
    }

    fn extract(payload: Value) -> Result<Extraction, NormalizeError> {
        let provider = TableProvider::new(table()).unwrap();
        provider.extract(&payload, &mut SequentialIds::new("t"))
    }

    #[test]
    fn test_array_groups_use_index_keys() {
        let payload = json!({
            "courses": [
                { "marks": [] },
                { "label": "Physics", "marks": [] }
            ]
        });
        let extraction = extract(payload).unwrap();
        let names: Vec<_> = extraction.groups.iter().map(|g| g.subject.name.as_str()).collect();
        assert_eq!(names, vec!["0", "Physics"]);
    }

    #[test]
    fn test_record_fields_follow_pointers() {
        let payload = json!({
            "courses": [{
                "label": "Math",
                "marks": [{
                    "score": "8",
                    "low": 2,
                    "scale": 10,
                    "when": "2024-01-15",
                    "kind": "3",
                    "optional": true
                }]
            }]
        });
        let extraction = extract(payload).unwrap();
        let record = &extraction.groups[0].records[0];

        assert_eq!(record.student_value, Field::Present(8.0));
        assert_eq!(record.min_value, Field::Present(2.0));
        assert!(record.max_value.is_disabled());
        assert_eq!(record.out_of, Field::Present(10.0));
        assert!(!record.is_out_of_20);
        assert!(record.is_bonus);
        assert!(record.is_optional);
        assert!(!record.timestamp.is_disabled());
        assert!(record.coefficient.is_disabled());
        assert!(Arc::ptr_eq(&record.subject, &extraction.groups[0].subject));
    }

    #[test]
    fn test_missing_scale_disables_out_of() {
        let payload = json!({ "courses": [{ "marks": [{ "score": 5 }] }] });
        let extraction = extract(payload).unwrap();
        let record = &extraction.groups[0].records[0];
        assert!(record.out_of.is_disabled());
        assert_eq!(record.default_out_of, 20.0);
        assert!(!record.is_bonus);
    }

    #[test]
    fn test_non_object_evaluation_is_malformed() {
        let payload = json!({ "courses": [{ "marks": [12] }] });
        let err = extract(payload).unwrap_err();
        match err {
            NormalizeError::MalformedPayload { path, .. } => assert_eq!(path, "/courses/0/marks/0"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scalar_group_source_is_malformed() {
        let err = extract(json!({ "courses": "none" })).unwrap_err();
        assert!(err.to_string().contains("found a string"));
    }

    #[test]
    fn test_optional_group_source_may_be_absent() {
        let mut table = table();
        table.groups.push(GroupSource {
            pointer: "/extra".to_string(),
            required: false,
        });
        let provider = TableProvider::new(table).unwrap();
        let extraction = provider
            .extract(&json!({ "courses": [] }), &mut SequentialIds::default())
            .unwrap();
        assert!(extraction.groups.is_empty());
    }

    #[test]
    fn test_escape_token() {
        assert_eq!(escape_token("a/b~c"), "a~1b~0c");
    }
}
