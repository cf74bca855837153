//! The unified grade schema every provider adapter produces.
//!
//! Field names serialize in camelCase so the bundle can be handed to the UI
//! layer as-is.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Display colour used when the provider has no colour for a subject.
pub const DEFAULT_SUBJECT_COLOR: &str = "#888888";

/// Scale assumed by providers that carry no explicit out-of field.
pub const DEFAULT_OUT_OF: f64 = 20.0;

/// A value that is either present or disabled.
///
/// A disabled field has no value to read. On the wire it is written as
/// `{"value": null, "disabled": true}`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Field<T> {
    Present(T),
    #[default]
    Disabled,
}

impl<T> Field<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Field::Disabled)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Present(v) => Some(v),
            Field::Disabled => None,
        }
    }
}

impl<T: Copy> Field<T> {
    pub fn get(&self) -> Option<T> {
        self.value().copied()
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Present(v),
            None => Field::Disabled,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Field", 2)?;
        s.serialize_field("value", &self.value())?;
        s.serialize_field("disabled", &self.is_disabled())?;
        s.end()
    }
}

/// Grouping key for grade records. Shared by every record of the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subject {
    pub id: String,
    pub name: String,
}

/// One evaluated item for a student in a subject.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub id: String,
    pub student_value: Field<f64>,
    pub min_value: Field<f64>,
    pub max_value: Field<f64>,
    pub class_average_value: Field<f64>,
    pub out_of: Field<f64>,
    pub default_out_of: f64,
    pub coefficient: Field<f64>,
    pub timestamp: Field<DateTime<Utc>>,
    pub description: Option<String>,
    pub subject: Arc<Subject>,
    pub is_out_of_20: bool,
    pub is_bonus: bool,
    pub is_optional: bool,
}

impl GradeRecord {
    pub fn subject_name(&self) -> &str {
        &self.subject.name
    }
}

/// Aggregates computed over the filtered records of one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverageOverview {
    pub subject_name: String,
    pub class_average: Field<f64>,
    pub min: Field<f64>,
    pub max: Field<f64>,
    pub average: Field<f64>,
    pub out_of: Field<f64>,
    pub color: String,
}

/// Top-level aggregate bundle.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageOverview {
    pub overall: Field<f64>,
    pub class_overall: Field<f64>,
    pub subjects: Vec<SubjectAverageOverview>,
}

/// What the UI receives from one normalization pass.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizedGrades {
    pub records: Vec<GradeRecord>,
    pub averages: AverageOverview,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_present_field_serializes_with_value() {
        let value = serde_json::to_value(Field::Present(12.5)).unwrap();
        assert_eq!(value, json!({"value": 12.5, "disabled": false}));
    }

    #[test]
    fn test_disabled_field_serializes_null() {
        let value = serde_json::to_value(Field::<f64>::Disabled).unwrap();
        assert_eq!(value, json!({"value": null, "disabled": true}));
    }

    #[test]
    fn test_field_from_option() {
        assert_eq!(Field::from(Some(3.0)), Field::Present(3.0));
        assert!(Field::<f64>::from(None).is_disabled());
        assert_eq!(Field::Present(2.0).get(), Some(2.0));
        assert_eq!(Field::<f64>::Disabled.get(), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let subject = Arc::new(Subject {
            id: "s-1".to_string(),
            name: "Math".to_string(),
        });
        let record = GradeRecord {
            id: "g-1".to_string(),
            student_value: Field::Present(14.0),
            min_value: Field::Disabled,
            max_value: Field::Present(19.0),
            class_average_value: Field::Present(11.0),
            out_of: Field::Present(DEFAULT_OUT_OF),
            default_out_of: DEFAULT_OUT_OF,
            coefficient: Field::Present(1.0),
            timestamp: Field::Disabled,
            description: None,
            subject,
            is_out_of_20: true,
            is_bonus: false,
            is_optional: false,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["studentValue"]["value"], json!(14.0));
        assert_eq!(value["minValue"]["disabled"], json!(true));
        assert_eq!(value["subject"]["name"], json!("Math"));
        assert_eq!(value["isOutOf20"], json!(true));
        assert_eq!(record.subject_name(), "Math");
    }
}
