//! Shared helpers for Arrow, Parquet IO and logging

pub mod arrow;
pub mod io;
pub mod logging;

pub use io::{DEFAULT_BATCH_SIZE, get_batch_size, load_parquet_path, read_parquet, write_parquet};
