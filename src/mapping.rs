//! Per-provider field-mapping tables.
//!
//! A [`MappingTable`] says where every target field lives in a provider's
//! raw payload, as JSON pointers (RFC 6901). Built-in providers construct
//! their table in code; custom providers load one from a JSON file:
//!
//! ```json
//! {
//!   "name": "my-school",
//!   "groups": [{ "pointer": "/report/courses" }],
//!   "subject_name": { "parts": ["/label"], "append_key": false },
//!   "evaluations": "/marks",
//!   "fields": { "student": "/score", "date": "/when" }
//! }
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;
use crate::schema::DEFAULT_OUT_OF;

fn default_true() -> bool {
    true
}

fn default_out_of() -> f64 {
    DEFAULT_OUT_OF
}

fn default_separator() -> String {
    " > ".to_string()
}

/// Which records take part in subject averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    #[serde(default)]
    pub include_bonus: bool,
    #[serde(default = "default_true")]
    pub include_optional: bool,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            include_bonus: false,
            include_optional: true,
        }
    }
}

/// A place in the payload holding subjects, as an object keyed by subject
/// code or as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSource {
    pub pointer: String,
    /// Missing required sources make the payload malformed; missing optional
    /// ones contribute nothing.
    #[serde(default = "default_true")]
    pub required: bool,
}

/// How a subject's display name is composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectNameRule {
    /// Pointers relative to the subject object, joined with `separator`.
    #[serde(default)]
    pub parts: Vec<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Append the grouping key (or array index) as the last part.
    #[serde(default = "default_true")]
    pub append_key: bool,
}

/// Pointers relative to one evaluation entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPointers {
    pub student: String,
    #[serde(default)]
    pub min: Option<String>,
    #[serde(default)]
    pub max: Option<String>,
    #[serde(default)]
    pub class_average: Option<String>,
    #[serde(default)]
    pub coefficient: Option<String>,
    #[serde(default)]
    pub out_of: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bonus: Option<BonusRule>,
    #[serde(default)]
    pub optional: Option<String>,
}

/// Where the bonus classification comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BonusRule {
    /// The pointed value is read as a boolean flag.
    Flag(String),
    /// The entry is bonus when the pointed value equals `equals`.
    Equals {
        pointer: String,
        equals: serde_json::Value,
    },
}

/// Pointers into the whole payload for provider-computed overall averages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallPointers {
    #[serde(default)]
    pub overall: Option<String>,
    #[serde(default)]
    pub class_overall: Option<String>,
}

/// The complete description of one provider's payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    pub name: String,
    pub groups: Vec<GroupSource>,
    pub subject_name: SubjectNameRule,
    pub evaluations: String,
    pub fields: FieldPointers,
    #[serde(default = "default_out_of")]
    pub default_out_of: f64,
    #[serde(default)]
    pub overall: OverallPointers,
    #[serde(default)]
    pub policy: AggregationPolicy,
}

impl MappingTable {
    /// Loads a table from a JSON file and validates it.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mapping table {}", path.display()))?;
        let table: MappingTable = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse mapping table {}", path.display()))?;
        table.validate()?;
        Ok(table)
    }

    /// Checks that every pointer is a well-formed JSON pointer and that the
    /// table can produce at least one subject.
    pub fn validate(&self) -> Result<(), NormalizeError> {
        if self.groups.is_empty() {
            return Err(self.invalid("no group sources"));
        }
        if !(self.default_out_of.is_finite() && self.default_out_of > 0.0) {
            return Err(self.invalid("default_out_of must be a positive number"));
        }

        for pointer in self.pointers() {
            if !is_json_pointer(pointer) {
                return Err(self.invalid(format!("'{pointer}' is not a JSON pointer")));
            }
        }

        Ok(())
    }

    fn pointers(&self) -> impl Iterator<Item = &str> {
        let fields = &self.fields;
        let bonus = fields.bonus.as_ref().map(|rule| match rule {
            BonusRule::Flag(p) => p.as_str(),
            BonusRule::Equals { pointer, .. } => pointer.as_str(),
        });

        self.groups
            .iter()
            .map(|g| g.pointer.as_str())
            .chain(self.subject_name.parts.iter().map(String::as_str))
            .chain(std::iter::once(self.evaluations.as_str()))
            .chain(std::iter::once(fields.student.as_str()))
            .chain(
                [
                    &fields.min,
                    &fields.max,
                    &fields.class_average,
                    &fields.coefficient,
                    &fields.out_of,
                    &fields.date,
                    &fields.description,
                    &fields.optional,
                    &self.overall.overall,
                    &self.overall.class_overall,
                ]
                .into_iter()
                .flatten()
                .map(String::as_str),
            )
            .chain(bonus)
    }

    fn invalid(&self, reason: impl Into<String>) -> NormalizeError {
        NormalizeError::InvalidMapping {
            provider: self.name.clone(),
            reason: reason.into(),
        }
    }
}

/// `""` addresses the whole value; anything else must start with `/`.
fn is_json_pointer(pointer: &str) -> bool {
    pointer.is_empty() || pointer.starts_with('/')
}
