//! The filter engine.

use crate::condition::FilterSpec;
use crate::record::Record;
use crate::schema::Schema;
use lumen_core::AppResult;

/// Result of a filtering pass.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome<'a> {
    /// Surviving records in their original relative order; never empty
    Matches(Vec<&'a Record>),
    NoResults,
}

impl<'a> FilterOutcome<'a> {
    fn from_matches(matches: Vec<&'a Record>) -> Self {
        if matches.is_empty() {
            Self::NoResults
        } else {
            Self::Matches(matches)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::NoResults)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Matches(records) => records.len(),
            Self::NoResults => 0,
        }
    }

    pub fn records(&self) -> &[&'a Record] {
        match self {
            Self::Matches(records) => records,
            Self::NoResults => &[],
        }
    }

    /// Matching records as owned JSON objects.
    pub fn to_json(&self) -> Vec<serde_json::Value> {
        self.records().iter().map(|r| r.to_json()).collect()
    }
}

/// Keep the records satisfying every non-null condition of `spec`.
///
/// Every field and condition is validated against `schema` before any record
/// is looked at, so an invalid spec never yields partial results. Conditions
/// are applied in spec order, each narrowing the previous candidates.
///
/// # Errors
/// - `AppError::Schema` if a field is unknown or a condition does not fit its column
pub fn filter_records<'a>(
    schema: &Schema,
    records: &'a [Record],
    spec: &FilterSpec,
) -> AppResult<FilterOutcome<'a>> {
    let mut plan = Vec::with_capacity(spec.len());
    for (name, condition) in spec.iter() {
        let field = schema.require(name)?;
        condition.validate(field)?;
        if !condition.is_null() {
            plan.push((field, condition));
        }
    }

    let mut candidates: Vec<&'a Record> = records.iter().collect();
    for (field, condition) in plan {
        candidates.retain(|record| condition.matches(&field.field_type, record.value(&field.name)));
        tracing::debug!(
            "Condition on '{}' leaves {} of {} records",
            field.name,
            candidates.len(),
            records.len()
        );
        if candidates.is_empty() {
            break;
        }
    }

    Ok(FilterOutcome::from_matches(candidates))
}
