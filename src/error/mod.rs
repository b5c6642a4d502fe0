//! Error handling for adherence analysis.
//!
//! Fallible operations return [`Result`], an `anyhow` result, so failures
//! from the data-access layer (Parquet, Arrow, I/O) propagate to the caller
//! with their original error as the source. Domain failures raised by this
//! crate are variants of [`Error`] and can be recovered with
//! `err.downcast_ref::<Error>()`.

/// Domain errors raised by this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required column is missing from a record batch
    #[error("Column '{column}' not found")]
    ColumnNotFound { column: String },

    /// A column has a type that cannot be converted to the expected type
    #[error("Column '{column}' cannot be read as {expected}")]
    InvalidColumnType { column: String, expected: String },

    /// The analysis configuration is not usable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The data-access collaborator failed
    #[error("Data access error: {0}")]
    DataAccess(String),
}

/// Result type used throughout the crate
pub type Result<T> = anyhow::Result<T>;
