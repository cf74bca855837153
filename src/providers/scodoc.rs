//! ScoDoc bulletins, as served to IUT Lannion students.
//!
//! A bulletin (`relevé`) keys resources and SAÉs by module code; each holds
//! a `titre` and an `evaluations` list whose `note` object carries the
//! student's mark and the class min/max/mean as strings such as `"12.50"`,
//! or `"~"` when nothing was entered. Marks are always out of 20.

use serde_json::json;

use crate::mapping::{
    AggregationPolicy, BonusRule, FieldPointers, GroupSource, MappingTable, OverallPointers,
    SubjectNameRule,
};
use crate::schema::DEFAULT_OUT_OF;

pub const NAME: &str = "scodoc";

/// ScoDoc's `evaluation_type` for bonus evaluations.
const EVALUATION_BONUS: i64 = 3;

pub fn table() -> MappingTable {
    MappingTable {
        name: NAME.to_string(),
        groups: vec![
            GroupSource {
                pointer: "/relevé/ressources".to_string(),
                required: true,
            },
            GroupSource {
                pointer: "/relevé/saes".to_string(),
                required: false,
            },
        ],
        subject_name: SubjectNameRule {
            parts: vec!["/titre".to_string()],
            separator: " > ".to_string(),
            append_key: true,
        },
        evaluations: "/evaluations".to_string(),
        fields: FieldPointers {
            student: "/note/value".to_string(),
            min: Some("/note/min".to_string()),
            max: Some("/note/max".to_string()),
            class_average: Some("/note/moy".to_string()),
            coefficient: Some("/coef".to_string()),
            out_of: None,
            date: Some("/date".to_string()),
            description: Some("/description".to_string()),
            bonus: Some(BonusRule::Equals {
                pointer: "/evaluation_type".to_string(),
                equals: json!(EVALUATION_BONUS),
            }),
            optional: None,
        },
        default_out_of: DEFAULT_OUT_OF,
        overall: OverallPointers {
            overall: Some("/relevé/semestre/notes/value".to_string()),
            class_overall: Some("/relevé/semestre/notes/moy".to_string()),
        },
        policy: AggregationPolicy {
            include_bonus: false,
            include_optional: true,
        },
    }
}
