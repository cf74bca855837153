//! Rendering and export of normalized grades.
//!
//! Supports JSON serialization of the whole bundle and CSV append of the
//! grade records.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::schema::{GradeRecord, NormalizedGrades};

/// One CSV row per grade record. Disabled fields become empty cells.
#[derive(Debug, Serialize)]
pub struct GradeRow<'a> {
    pub id: &'a str,
    pub subject_id: &'a str,
    pub subject: &'a str,
    pub description: Option<&'a str>,
    pub timestamp: Option<DateTime<Utc>>,
    pub student: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub class_average: Option<f64>,
    pub out_of: Option<f64>,
    pub coefficient: Option<f64>,
    pub bonus: bool,
    pub optional: bool,
}

impl<'a> From<&'a GradeRecord> for GradeRow<'a> {
    fn from(record: &'a GradeRecord) -> Self {
        GradeRow {
            id: &record.id,
            subject_id: &record.subject.id,
            subject: &record.subject.name,
            description: record.description.as_deref(),
            timestamp: record.timestamp.get(),
            student: record.student_value.get(),
            min: record.min_value.get(),
            max: record.max_value.get(),
            class_average: record.class_average_value.get(),
            out_of: record.out_of.get(),
            coefficient: record.coefficient.get(),
            bonus: record.is_bonus,
            optional: record.is_optional,
        }
    }
}

/// Serializes the bundle as JSON, pretty-printed unless `compact`.
pub fn to_json(grades: &NormalizedGrades, compact: bool) -> Result<String> {
    let json = if compact {
        serde_json::to_string(grades)?
    } else {
        serde_json::to_string_pretty(grades)?
    };
    Ok(json)
}

/// Appends every record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records(path: &Path, records: &[GradeRecord]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    for record in records {
        writer.serialize(GradeRow::from(record))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::normalize::normalize;
    use crate::providers::ProviderKind;
    use serde_json::json;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn sample() -> NormalizedGrades {
        let payload = json!({
            "relevé": {
                "ressources": {
                    "R1.01": {
                        "titre": "Dev",
                        "evaluations": [
                            { "description": "TP", "note": { "value": "15", "min": "~" } },
                            { "description": "DS", "note": { "value": "11" } }
                        ]
                    }
                }
            }
        });
        normalize(
            &ProviderKind::Scodoc.provider(),
            &payload,
            &mut SequentialIds::new("t"),
        )
        .unwrap()
    }

    #[test]
    fn test_to_json_compact_is_single_line() {
        let json = to_json(&sample(), true).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"studentValue\""));
    }

    #[test]
    fn test_append_records_writes_header_once() {
        let path = temp_path("grade_normalizer_test_header.csv");
        let _ = fs::remove_file(&path);

        let grades = sample();
        append_records(&path, &grades.records).unwrap();
        append_records(&path, &grades.records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.starts_with("id,")).count();
        assert_eq!(header_count, 1);
        // 1 header + 2 appends of 2 rows
        assert_eq!(content.lines().count(), 5);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_disabled_fields_are_empty_cells() {
        let path = temp_path("grade_normalizer_test_cells.csv");
        let _ = fs::remove_file(&path);

        let grades = sample();
        append_records(&path, &grades.records[..1]).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        let row = reader.records().next().unwrap().unwrap();
        let min_index = headers.iter().position(|h| h == "min").unwrap();
        let student_index = headers.iter().position(|h| h == "student").unwrap();
        assert_eq!(&row[min_index], "");
        assert_eq!(&row[student_index], "15.0");

        fs::remove_file(&path).unwrap();
    }
}
