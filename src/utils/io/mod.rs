//! File IO helpers

pub mod parquet;

pub use self::parquet::{
    DEFAULT_BATCH_SIZE, find_parquet_files, get_batch_size, load_parquet_files_parallel,
    load_parquet_path, read_parquet, validate_directory, write_parquet,
};
