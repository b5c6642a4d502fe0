//! Core filtering functionality
//!
//! Defines the [`BatchFilter`] trait and the helpers every filter uses to
//! apply a boolean mask to a record batch.

use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;

use anyhow::Context;
use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::filter as arrow_filter;
use arrow::record_batch::RecordBatch;
use rayon::prelude::*;

use crate::error::Result;

/// Filter a record batch with a boolean mask
///
/// Rows whose mask value is false or null are dropped.
pub fn filter_record_batch(batch: &RecordBatch, mask: &BooleanArray) -> Result<RecordBatch> {
    if batch.num_rows() != mask.len() {
        return Err(anyhow::anyhow!(
            "Mask length ({}) doesn't match batch row count ({})",
            mask.len(),
            batch.num_rows()
        ));
    }

    let filtered_columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| arrow_filter(col, mask))
        .collect::<arrow::error::Result<_>>()
        .with_context(|| "Failed to apply boolean filter to columns")?;

    RecordBatch::try_new(batch.schema(), filtered_columns)
        .with_context(|| "Failed to create filtered record batch")
}

/// Trait for objects that can filter record batches
pub trait BatchFilter: Debug {
    /// Filter a record batch
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch>;

    /// Column names this filter reads
    fn required_columns(&self) -> HashSet<String>;
}

/// A filter that keeps rows accepted by all of its filters
#[derive(Debug, Clone, Default)]
pub struct AndFilter {
    filters: Vec<Arc<dyn BatchFilter + Send + Sync>>,
}

impl AndFilter {
    /// Create a new AND filter
    #[must_use]
    pub fn new(filters: Vec<Arc<dyn BatchFilter + Send + Sync>>) -> Self {
        Self { filters }
    }

    /// Add a filter
    pub fn push(&mut self, filter: Arc<dyn BatchFilter + Send + Sync>) {
        self.filters.push(filter);
    }

    /// Whether no filter was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl BatchFilter for AndFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mut result_batch = batch.clone();
        for filter in &self.filters {
            if result_batch.num_rows() == 0 {
                break;
            }
            result_batch = filter.filter(&result_batch)?;
        }
        Ok(result_batch)
    }

    fn required_columns(&self) -> HashSet<String> {
        self.filters
            .iter()
            .flat_map(|filter| filter.required_columns())
            .collect()
    }
}

/// Apply a filter to batches in parallel, dropping batches left empty
pub fn apply_filter(batches: &[RecordBatch], filter: &(dyn BatchFilter + Send + Sync)) -> Result<Vec<RecordBatch>> {
    let filtered: Vec<RecordBatch> = batches
        .par_iter()
        .map(|batch| filter.filter(batch))
        .collect::<Result<_>>()?;

    Ok(filtered
        .into_iter()
        .filter(|batch| batch.num_rows() > 0)
        .collect())
}
