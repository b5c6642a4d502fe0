//! Typed column extraction for Arrow record batches
//!
//! OMOP exports do not agree on physical types: identifiers may be stored as
//! Int32 or Int64, supply counts as integers or floats, and dates as Date32,
//! Date64 or timestamps. Each getter casts the column to the type the
//! analysis works with and fails with a typed error when no cast exists.

use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::compute::{can_cast_types, cast};
use arrow::datatypes::{DataType, Date32Type, Float64Type, Int32Type, Int64Type};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};

use crate::error::{Error, Result};

/// Days between 0001-01-01 (CE day 1) and the Unix epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a chrono date to Arrow Date32 (days since the Unix epoch)
#[must_use]
pub fn naive_to_date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert an Arrow Date32 value to a chrono date
#[must_use]
pub fn date32_to_naive(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

/// Look up a column and cast it to `target`
///
/// Returns `Ok(None)` for a missing optional column.
fn cast_column(
    batch: &RecordBatch,
    column_name: &str,
    target: &DataType,
    required: bool,
) -> Result<Option<ArrayRef>> {
    let Some(array) = batch.column_by_name(column_name) else {
        if required {
            return Err(Error::ColumnNotFound {
                column: column_name.to_string(),
            }
            .into());
        }
        return Ok(None);
    };

    if array.data_type() == target {
        return Ok(Some(array.clone()));
    }

    let invalid = || Error::InvalidColumnType {
        column: column_name.to_string(),
        expected: target.to_string(),
    };
    if !can_cast_types(array.data_type(), target) {
        return Err(invalid().into());
    }
    let casted = cast(array, target).map_err(|e| {
        log::debug!("Cast of column {column_name} failed: {e}");
        invalid()
    })?;
    Ok(Some(casted))
}

/// Get a column as Int64
pub fn int64_column(batch: &RecordBatch, column_name: &str, required: bool) -> Result<Option<Int64Array>> {
    Ok(cast_column(batch, column_name, &DataType::Int64, required)?
        .map(|array| array.as_primitive::<Int64Type>().clone()))
}

/// Get a column as Int32
///
/// Float columns are truncated towards zero by the cast.
pub fn int32_column(batch: &RecordBatch, column_name: &str, required: bool) -> Result<Option<Int32Array>> {
    Ok(cast_column(batch, column_name, &DataType::Int32, required)?
        .map(|array| array.as_primitive::<Int32Type>().clone()))
}

/// Get a column as Float64
pub fn float64_column(batch: &RecordBatch, column_name: &str, required: bool) -> Result<Option<Float64Array>> {
    Ok(cast_column(batch, column_name, &DataType::Float64, required)?
        .map(|array| array.as_primitive::<Float64Type>().clone()))
}

/// Get a column as Date32
///
/// Date64, timestamp and ISO date string columns are cast; the time of day
/// is dropped.
pub fn date_column(batch: &RecordBatch, column_name: &str, required: bool) -> Result<Option<Date32Array>> {
    Ok(cast_column(batch, column_name, &DataType::Date32, required)?
        .map(|array| array.as_primitive::<Date32Type>().clone()))
}

/// Get a column as Utf8
pub fn string_column(batch: &RecordBatch, column_name: &str, required: bool) -> Result<Option<StringArray>> {
    Ok(cast_column(batch, column_name, &DataType::Utf8, required)?
        .map(|array| array.as_string::<i32>().clone()))
}
