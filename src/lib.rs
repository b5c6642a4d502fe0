//! Medication adherence analysis over OMOP CDM drug exposures.
//!
//! Fill records are normalized into coverage intervals, merged per
//! (person, drug) and summarized as the proportion of days covered (PDC),
//! an adherence classification and the coverage gaps between fills.

pub mod algorithm;
pub mod async_io;
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod report;
pub mod source;
pub mod utils;

// Core types
pub use config::{AnalysisConfig, FillQuery, GapBasis};
pub use error::{Error, Result};
pub use models::{
    AdherenceStatus, AdherenceSummary, CoverageInterval, FillRecord, GapRecord, GapSeverity, MergedPeriod,
    SourceMethod,
};

// Analysis
pub use algorithm::adherence::{AdherenceReport, DrugMedianTable, Lookups, analyze_records, run_analysis};

// Data access
pub use source::{FillSource, InMemorySource, ParquetSource};

// Reporting
pub use report::{AdherenceStatistics, DatasetInfo, write_report};

// Async functionality
pub use async_io::load_fills_async;
