//! Arrow column helpers
//!
//! Typed access to record batch columns with casting of compatible numeric
//! and temporal types, plus date conversions between chrono and Arrow.

pub mod extractors;

pub use extractors::{
    date32_to_naive, date_column, float64_column, int32_column, int64_column, naive_to_date32,
    string_column,
};
