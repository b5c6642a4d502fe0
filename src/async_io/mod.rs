//! Async Parquet loading
//!
//! Reads table exports on the tokio runtime so several exports (for
//! example one `DRUG_EXPOSURE` file per site) can be loaded concurrently.

pub mod batch_ops;
pub mod file_ops;
pub mod loader;

pub use batch_ops::read_parquet_async;
pub use file_ops::{find_parquet_files_async, open_parquet_file_async};
pub use loader::{load_fills_async, load_parquet_path_async};
