//! Record batch filtering
//!
//! Filters implement [`BatchFilter`] and evaluate their predicate with Arrow
//! compute kernels. They are combined with [`AndFilter`] and applied to each
//! batch of a table export before rows are converted to records.

pub mod concept;
pub mod core;
pub mod date;

pub use concept::{ConceptFilter, StringEqualsFilter};
pub use self::core::{AndFilter, BatchFilter, apply_filter, filter_record_batch};
pub use date::DateRangeFilter;
