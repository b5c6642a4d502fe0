//! Parquet reading and writing
//!
//! A table export is either a single `.parquet` file or a directory of them.
//! Directory files are read in parallel on the rayon pool and their batches
//! concatenated in file name order.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::schema::types::SchemaDescriptor;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Batch size override from `PARQUET_BATCH_SIZE`
#[must_use]
pub fn get_batch_size() -> Option<usize> {
    std::env::var("PARQUET_BATCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
}

/// Check that a path is an existing directory
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::DataAccess(format!("Directory does not exist: {}", dir.display())).into());
    }
    Ok(())
}

/// Projection mask over the requested top-level columns present in the file
///
/// Returns `None` when none of the columns exist, in which case the whole
/// file is read and the caller's column checks report what is missing.
pub(crate) fn projection_mask(
    file_schema: &arrow::datatypes::Schema,
    parquet_schema: &SchemaDescriptor,
    columns: &[&str],
) -> Option<ProjectionMask> {
    let indices = columns
        .iter()
        .filter_map(|name| file_schema.index_of(name).ok())
        .sorted_unstable()
        .dedup()
        .collect_vec();

    if indices.is_empty() {
        log_warning("None of the requested columns found, reading all columns", None);
        return None;
    }
    Some(ProjectionMask::roots(parquet_schema, indices))
}

/// Read a Parquet file into record batches
///
/// # Arguments
/// * `path` - Path to the Parquet file
/// * `columns` - Optional column names to project; absent columns are skipped
pub fn read_parquet(path: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let start = Instant::now();
    log_operation_start("Reading parquet file", path);

    let file = File::open(path)
        .map_err(|e| Error::DataAccess(format!("Failed to open file {}: {e}", path.display())))?;

    let mut builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        Error::DataAccess(format!("Failed to read parquet file {}: {e}", path.display()))
    })?;

    if let Some(columns) = columns {
        if let Some(mask) = projection_mask(builder.schema(), builder.parquet_schema(), columns) {
            builder = builder.with_projection(mask);
        }
    }

    let reader = builder
        .with_batch_size(get_batch_size().unwrap_or(DEFAULT_BATCH_SIZE))
        .build()
        .map_err(|e| Error::DataAccess(format!("Failed to build parquet reader: {e}")))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            Error::DataAccess(format!("Failed to read record batch from {}: {e}", path.display()))
        })?;

    let rows = batches.iter().map(RecordBatch::num_rows).sum();
    log_operation_complete("read", path, rows, Some(start.elapsed()));
    Ok(batches)
}

/// Find all Parquet files in a directory, sorted by file name
pub fn find_parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    validate_directory(dir)?;

    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::DataAccess(format!("Failed to read directory {}: {e}", dir.display())))?;

    let mut parquet_files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::DataAccess(format!("Failed to read directory entry: {e}")))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "parquet") {
            parquet_files.push(path);
        }
    }
    parquet_files.sort();

    if parquet_files.is_empty() {
        log_warning("No Parquet files found in directory", Some(dir));
    } else {
        log::debug!("Found {} parquet files in {}", parquet_files.len(), dir.display());
    }

    Ok(parquet_files)
}

/// Load all Parquet files of a directory in parallel
pub fn load_parquet_files_parallel(dir: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let parquet_files = find_parquet_files(dir)?;
    if parquet_files.is_empty() {
        return Ok(Vec::new());
    }

    let per_file: Vec<Vec<RecordBatch>> = parquet_files
        .par_iter()
        .map(|path| read_parquet(path, columns))
        .collect::<Result<_>>()?;

    let batches = per_file.into_iter().flatten().collect_vec();
    log::info!(
        "Loaded {} batches from {} Parquet files in {}",
        batches.len(),
        parquet_files.len(),
        dir.display()
    );

    Ok(batches)
}

/// Load a table export that is either a file or a directory of files
pub fn load_parquet_path(path: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    if path.is_dir() {
        load_parquet_files_parallel(path, columns)
    } else if path.is_file() {
        read_parquet(path, columns)
    } else {
        Err(Error::DataAccess(format!("Path does not exist: {}", path.display())).into())
    }
}

/// Write a record batch to a Parquet file, replacing any existing file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::DataAccess(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let file = File::create(path)
        .map_err(|e| Error::DataAccess(format!("Failed to create file {}: {e}", path.display())))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .map_err(|e| Error::DataAccess(format!("Failed to create parquet writer: {e}")))?;
    writer
        .write(batch)
        .map_err(|e| Error::DataAccess(format!("Failed to write {}: {e}", path.display())))?;
    writer
        .close()
        .map_err(|e| Error::DataAccess(format!("Failed to finish {}: {e}", path.display())))?;

    log_operation_complete("wrote", path, batch.num_rows(), None);
    Ok(())
}
