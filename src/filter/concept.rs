//! Concept and code filtering
//!
//! OMOP tables identify everything by concept id, so most selections are set
//! membership tests on an integer column.

use std::collections::HashSet;

use anyhow::Context;
use arrow::array::{BooleanArray, StringArray};
use arrow::compute::kernels::cmp;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::utils::arrow::{int64_column, string_column};

/// A filter that keeps rows whose concept column is in a set
///
/// Null values never match.
#[derive(Debug, Clone)]
pub struct ConceptFilter {
    column: String,
    concepts: FxHashSet<i64>,
}

impl ConceptFilter {
    /// Create a filter on `column` accepting the given concept ids
    #[must_use]
    pub fn new(column: impl Into<String>, concepts: impl IntoIterator<Item = i64>) -> Self {
        Self {
            column: column.into(),
            concepts: concepts.into_iter().collect(),
        }
    }
}

impl BatchFilter for ConceptFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(values) = int64_column(batch, &self.column, true)? else {
            return Ok(batch.clone());
        };

        let mask: BooleanArray = values
            .iter()
            .map(|value| Some(value.is_some_and(|id| self.concepts.contains(&id))))
            .collect();

        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        HashSet::from([self.column.clone()])
    }
}

/// A filter that keeps rows whose string column equals a value
#[derive(Debug, Clone)]
pub struct StringEqualsFilter {
    column: String,
    value: String,
}

impl StringEqualsFilter {
    /// Create a filter on `column` accepting `value`
    #[must_use]
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl BatchFilter for StringEqualsFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(values) = string_column(batch, &self.column, true)? else {
            return Ok(batch.clone());
        };

        let target = StringArray::new_scalar(self.value.as_str());
        let mask = cmp::eq(&values, &target)
            .with_context(|| format!("Failed to compare column {}", self.column))?;

        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        HashSet::from([self.column.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("concept_id", DataType::Int32, true),
            Field::new("domain_id", DataType::Utf8, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int32Array::from(vec![Some(1), Some(2), None, Some(3)])),
                Arc::new(StringArray::from(vec![Some("Drug"), Some("Condition"), Some("Drug"), None])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_concept_filter_casts_and_skips_nulls() {
        let filter = ConceptFilter::new("concept_id", [1, 3]);
        let filtered = filter.filter(&batch()).unwrap();
        assert_eq!(filtered.num_rows(), 2);
    }

    #[test]
    fn test_string_equals_filter() {
        let filter = StringEqualsFilter::new("domain_id", "Drug");
        assert_eq!(filter.filter(&batch()).unwrap().num_rows(), 2);
        assert!(StringEqualsFilter::new("missing", "Drug").filter(&batch()).is_err());
    }
}
