//! Async Parquet batch reading

use std::path::Path;
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;

use super::file_ops::open_parquet_file_async;
use crate::error::Result;
use crate::utils::io::parquet::projection_mask;
use crate::utils::io::{DEFAULT_BATCH_SIZE, get_batch_size};
use crate::utils::logging::{log_operation_complete, log_operation_start};

/// Read a Parquet file asynchronously into record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column names to project; absent columns are skipped
/// * `batch_size` - Batch size, falling back to `PARQUET_BATCH_SIZE` and then
///   [`DEFAULT_BATCH_SIZE`]
pub async fn read_parquet_async(
    path: &Path,
    columns: Option<&[&str]>,
    batch_size: Option<usize>,
) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading parquet file asynchronously", path);

    let file = open_parquet_file_async(path).await?;
    let mut builder = ParquetRecordBatchStreamBuilder::new(file)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create parquet reader for {}: {}", path.display(), e))?;

    if let Some(columns) = columns {
        if let Some(mask) = projection_mask(builder.schema(), builder.parquet_schema(), columns) {
            builder = builder.with_projection(mask);
        }
    }

    let batch_size = batch_size.or_else(get_batch_size).unwrap_or(DEFAULT_BATCH_SIZE);
    let stream = builder
        .with_batch_size(batch_size)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build parquet stream: {}", e))?;

    let batches = stream
        .try_collect::<Vec<_>>()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read record batches from {}: {}", path.display(), e))?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("read", path, rows, Some(start.elapsed()));

    Ok(batches)
}
