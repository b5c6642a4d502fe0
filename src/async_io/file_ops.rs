//! Listing and opening export files on the tokio runtime
//!
//! A site export directory holds one `.parquet` file per partition. Other
//! entries (checksums, `_SUCCESS` markers, nested folders) are skipped.

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};

use crate::error::{Error, Result};
use crate::utils::io::validate_directory;
use crate::utils::logging::log_warning;

/// Partition files of an export directory, in file name order
///
/// An empty directory is not an error; it yields no files and a warning.
pub async fn find_parquet_files_async(dir: &Path) -> Result<Vec<PathBuf>> {
    validate_directory(dir)?;

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::DataAccess(format!("Failed to list export {}: {e}", dir.display())))?;

    let mut partitions = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::DataAccess(format!("Failed to list export {}: {e}", dir.display())))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map_err(|e| Error::DataAccess(format!("Failed to stat {}: {e}", path.display())))?
            .is_file();

        if is_file && path.extension().is_some_and(|ext| ext == "parquet") {
            partitions.push(path);
        }
    }
    partitions.sort();

    if partitions.is_empty() {
        log_warning("Export directory has no Parquet partitions", Some(dir));
    }

    Ok(partitions)
}

pub async fn open_parquet_file_async(path: &Path) -> Result<File> {
    let file = File::open(path)
        .await
        .map_err(|e| Error::DataAccess(format!("Failed to open export {}: {e}", path.display())))?;
    Ok(file)
}
