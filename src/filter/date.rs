//! Date range filtering

use std::collections::HashSet;

use anyhow::Context;
use arrow::array::{BooleanArray, Date32Array};
use arrow::compute::kernels::{boolean, cmp};
use arrow::compute::is_null;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;

use crate::error::Result;
use crate::filter::core::{BatchFilter, filter_record_batch};
use crate::utils::arrow::{date_column, naive_to_date32};

/// A filter that keeps rows with a date in an inclusive range
///
/// Rows with a null date are dropped unless [`DateRangeFilter::keeping_nulls`]
/// is used.
#[derive(Debug, Clone)]
pub struct DateRangeFilter {
    date_column: String,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    keep_nulls: bool,
}

impl DateRangeFilter {
    /// Create a new date range filter
    #[must_use]
    pub fn new(date_column: impl Into<String>, start_date: Option<NaiveDate>, end_date: Option<NaiveDate>) -> Self {
        Self {
            date_column: date_column.into(),
            start_date,
            end_date,
            keep_nulls: false,
        }
    }

    /// Keep rows whose date is null
    #[must_use]
    pub const fn keeping_nulls(mut self) -> Self {
        self.keep_nulls = true;
        self
    }

    /// The range mask; null where the date is null
    fn range_mask(&self, dates: &Date32Array) -> Result<BooleanArray> {
        let mut in_range = BooleanArray::from(vec![true; dates.len()]);

        if let Some(start) = self.start_date {
            let start_days = Date32Array::new_scalar(naive_to_date32(start));
            let ge = cmp::gt_eq(dates, &start_days).with_context(|| "Failed to compare dates")?;
            in_range = boolean::and(&in_range, &ge).with_context(|| "Failed to combine date filters")?;
        }

        if let Some(end) = self.end_date {
            let end_days = Date32Array::new_scalar(naive_to_date32(end));
            let le = cmp::lt_eq(dates, &end_days).with_context(|| "Failed to compare dates")?;
            in_range = boolean::and(&in_range, &le).with_context(|| "Failed to combine date filters")?;
        }

        Ok(in_range)
    }
}

impl BatchFilter for DateRangeFilter {
    fn filter(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(dates) = date_column(batch, &self.date_column, true)? else {
            return Ok(batch.clone());
        };

        let mut mask = self.range_mask(&dates)?;
        if self.keep_nulls {
            let nulls = is_null(&dates).with_context(|| "Failed to compute null mask")?;
            mask = boolean::or_kleene(&mask, &nulls).with_context(|| "Failed to combine masks")?;
        }

        filter_record_batch(batch, &mask)
    }

    fn required_columns(&self) -> HashSet<String> {
        HashSet::from([self.date_column.clone()])
    }
}
