//! Concurrent loading of fill records from several exports

use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use futures::future::try_join_all;
use itertools::Itertools;
use log::info;

use super::batch_ops::read_parquet_async;
use super::file_ops::find_parquet_files_async;
use crate::config::FillQuery;
use crate::error::Result;
use crate::models::FillRecord;
use crate::source::omop::drug_exposure;
use crate::source::parquet::select_fill_batches;

/// Load a table export that is a file or a directory of files
///
/// Directory files are read concurrently; batches keep file name order.
pub async fn load_parquet_path_async(path: &Path, columns: Option<&[&str]>) -> Result<Vec<RecordBatch>> {
    let files = if path.is_dir() {
        find_parquet_files_async(path).await?
    } else {
        vec![path.to_path_buf()]
    };

    let per_file = try_join_all(files.iter().map(|file| read_parquet_async(file, columns, None))).await?;
    Ok(per_file.into_iter().flatten().collect_vec())
}

/// Load and select fill records from several `DRUG_EXPOSURE` exports
///
/// Exports are read concurrently and the query is applied to their combined
/// rows, so `limit` counts across all exports in the order given.
pub async fn load_fills_async(paths: &[PathBuf], query: &FillQuery) -> Result<Vec<FillRecord>> {
    let columns = drug_exposure::COLUMNS.as_slice();
    let per_path = try_join_all(paths.iter().map(|path| load_parquet_path_async(path, Some(columns)))).await?;
    let batches = per_path.into_iter().flatten().collect_vec();

    let records = select_fill_batches(&batches, query)?;
    info!(
        "Loaded {} fill records from {} exports",
        records.len(),
        paths.len()
    );
    Ok(records)
}
