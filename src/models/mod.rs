//! Domain models for adherence analysis
//!
//! Every model is a value object produced by a single linear pipeline:
//! fill records become coverage intervals, intervals are merged into
//! periods, and periods are summarized into summary and gap rows.

pub mod fill;
pub mod gap;
pub mod interval;
pub mod lookup;
pub mod period;
pub mod summary;

// Re-export commonly used types
pub use fill::{FillRecord, GroupKey};
pub use gap::{GapRecord, GapSeverity};
pub use interval::{CoverageInterval, SourceMethod, SupplySource};
pub use lookup::{ConditionOccurrence, Demographics, DrugConcepts, PersonDemographics};
pub use period::MergedPeriod;
pub use summary::{AdherenceStatus, AdherenceSummary};
