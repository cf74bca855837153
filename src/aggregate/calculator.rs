use tracing::debug;

use crate::aggregate::utility::{max, mean, min};
use crate::mapping::AggregationPolicy;
use crate::providers::SubjectGrades;
use crate::schema::{DEFAULT_SUBJECT_COLOR, Field, GradeRecord, SubjectAverageOverview};

/// Whether a record counts towards its subject's statistics.
///
/// Records without a student value never count; bonus and optional records
/// count only when the policy admits them.
pub fn is_counted(record: &GradeRecord, policy: AggregationPolicy) -> bool {
    if record.student_value.is_disabled() {
        return false;
    }
    if record.is_bonus && !policy.include_bonus {
        return false;
    }
    if record.is_optional && !policy.include_optional {
        return false;
    }
    true
}

/// Computes the statistics of one subject.
///
/// Returns `None` when no record survives filtering, so the subject is left
/// out of the overview instead of showing zeros.
pub fn summarize_subject(
    group: &SubjectGrades,
    policy: AggregationPolicy,
) -> Option<SubjectAverageOverview> {
    let counted: Vec<&GradeRecord> = group
        .records
        .iter()
        .filter(|r| is_counted(r, policy))
        .collect();

    if counted.is_empty() {
        debug!(subject = %group.subject.name, total = group.records.len(), "Subject skipped");
        return None;
    }

    let present = |f: fn(&GradeRecord) -> Field<f64>| -> Vec<f64> {
        counted.iter().filter_map(|r| f(r).get()).collect()
    };

    let students = present(|r| r.student_value);
    let mins = present(|r| r.min_value);
    let maxes = present(|r| r.max_value);
    let class_averages = present(|r| r.class_average_value);

    Some(SubjectAverageOverview {
        subject_name: group.subject.name.clone(),
        class_average: mean(&class_averages).into(),
        min: min(&mins).into(),
        max: max(&maxes).into(),
        average: mean(&students).into(),
        out_of: shared_scale(&counted),
        color: DEFAULT_SUBJECT_COLOR.to_string(),
    })
}

/// Statistics for every subject with at least one counted record, in the
/// order the subjects were extracted.
pub fn summarize_subjects(
    groups: &[SubjectGrades],
    policy: AggregationPolicy,
) -> Vec<SubjectAverageOverview> {
    groups
        .iter()
        .filter_map(|g| summarize_subject(g, policy))
        .collect()
}

/// The scale every record shares, or disabled when they disagree or any
/// record lacks one.
fn shared_scale(records: &[&GradeRecord]) -> Field<f64> {
    let mut scales = records.iter().map(|r| r.out_of.get());
    let Some(Some(first)) = scales.next() else {
        return Field::Disabled;
    };
    if scales.all(|s| s == Some(first)) {
        Field::Present(first)
    } else {
        Field::Disabled
    }
}
