//! Configuration for adherence analysis runs.
//!
//! This module defines the typed query parameters handed to the data-access
//! layer and the thresholds used by the coverage aggregator.

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Drug type concepts kept when the drug type filter is enabled
/// (dispensed in outpatient office, prescription dispensed through mail order,
/// dispensed in pharmacy)
pub const DISPENSING_DRUG_TYPE_CONCEPTS: [i64; 3] = [38_000_175, 38_000_176, 581_373];

/// Default adherence threshold on the PDC ratio
pub const DEFAULT_PDC_THRESHOLD: f64 = 0.80;

/// Default minimum treatment duration (days) for a group to be reported
pub const DEFAULT_MIN_TREATMENT_DAYS: i64 = 30;

/// Default minimum gap duration (days) for a gap row to be reported
pub const DEFAULT_MIN_GAP_DAYS: i64 = 7;

/// Parameters selecting the fill records of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillQuery {
    /// Earliest fill start date (inclusive)
    pub start_date: Option<NaiveDate>,
    /// Latest fill start date (inclusive)
    pub end_date: Option<NaiveDate>,
    /// Keep only dispensing drug types ([`DISPENSING_DRUG_TYPE_CONCEPTS`])
    pub filter_drug_type: bool,
    /// Keep at most this many rows
    pub limit: Option<usize>,
}

impl FillQuery {
    /// Create an unrestricted query
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the date range for filtering
    #[must_use]
    pub const fn with_date_range(mut self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self.end_date = Some(end_date);
        self
    }

    /// Restrict to dispensing drug types
    #[must_use]
    pub const fn with_drug_type_filter(mut self, enabled: bool) -> Self {
        self.filter_drug_type = enabled;
        self
    }

    /// Keep at most `limit` rows
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check if a fill start date is within the configured range
    ///
    /// Returns true if:
    /// - No date range is configured, or
    /// - The date is within the configured range (inclusive)
    #[must_use]
    pub fn is_date_in_range(&self, date: &NaiveDate) -> bool {
        if let Some(start) = self.start_date {
            if *date < start {
                return false;
            }
        }

        if let Some(end) = self.end_date {
            if *date > end {
                return false;
            }
        }

        true
    }

    /// Check a drug type against the optional dispensing filter
    #[must_use]
    pub fn accepts_drug_type(&self, drug_type_concept_id: Option<i64>) -> bool {
        if !self.filter_drug_type {
            return true;
        }
        drug_type_concept_id.is_some_and(|id| DISPENSING_DRUG_TYPE_CONCEPTS.contains(&id))
    }
}

/// What consecutive items gap rows are measured between
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapBasis {
    /// Gaps between merged coverage periods (consistent with the summary rows)
    #[default]
    MergedPeriods,
    /// Gaps between each fill and the next fill's start
    ConsecutiveFills,
}

/// Configuration for an adherence analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Fill selection
    pub query: FillQuery,
    /// PDC at or above which a group is adherent
    pub pdc_threshold: f64,
    /// Groups with a shorter treatment duration are excluded
    pub min_treatment_days: i64,
    /// Gap rows shorter than this are not reported
    pub min_gap_days: i64,
    /// Basis for gap rows
    pub gap_basis: GapBasis,
    /// Process groups on the rayon thread pool
    pub parallel: bool,
    /// Show a progress bar while processing groups
    pub show_progress: bool,
    /// Drop summary rows whose drug has no known name
    pub require_drug_name: bool,
    /// Year used to derive patient age from year of birth
    pub age_reference_year: Option<i32>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            query: FillQuery::default(),
            pdc_threshold: DEFAULT_PDC_THRESHOLD,
            min_treatment_days: DEFAULT_MIN_TREATMENT_DAYS,
            min_gap_days: DEFAULT_MIN_GAP_DAYS,
            gap_basis: GapBasis::default(),
            parallel: true,
            show_progress: false,
            require_drug_name: false,
            age_reference_year: None,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Set the fill query
    #[must_use]
    pub fn with_query(mut self, query: FillQuery) -> Self {
        self.query = query;
        self
    }

    /// Set the adherence threshold
    #[must_use]
    pub const fn with_pdc_threshold(mut self, threshold: f64) -> Self {
        self.pdc_threshold = threshold;
        self
    }

    /// Set the minimum treatment duration
    #[must_use]
    pub const fn with_min_treatment_days(mut self, days: i64) -> Self {
        self.min_treatment_days = days;
        self
    }

    /// Set the minimum reported gap duration
    #[must_use]
    pub const fn with_min_gap_days(mut self, days: i64) -> Self {
        self.min_gap_days = days;
        self
    }

    /// Set the gap basis
    #[must_use]
    pub const fn with_gap_basis(mut self, basis: GapBasis) -> Self {
        self.gap_basis = basis;
        self
    }

    /// Enable or disable parallel group processing
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable or disable the progress bar
    #[must_use]
    pub const fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Drop summary rows for drugs without a name
    #[must_use]
    pub const fn with_require_drug_name(mut self, required: bool) -> Self {
        self.require_drug_name = required;
        self
    }

    /// Set the year used for age calculation
    #[must_use]
    pub const fn with_age_reference_year(mut self, year: i32) -> Self {
        self.age_reference_year = Some(year);
        self
    }

    /// Check thresholds and the date range
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pdc_threshold) {
            return Err(Error::InvalidConfig(format!(
                "pdc_threshold must be within [0, 1], got {}",
                self.pdc_threshold
            ))
            .into());
        }
        if self.min_treatment_days < 0 {
            return Err(Error::InvalidConfig(format!(
                "min_treatment_days must not be negative, got {}",
                self.min_treatment_days
            ))
            .into());
        }
        if self.min_gap_days < 0 {
            return Err(Error::InvalidConfig(format!(
                "min_gap_days must not be negative, got {}",
                self.min_gap_days
            ))
            .into());
        }
        if let (Some(start), Some(end)) = (self.query.start_date, self.query.end_date) {
            if start > end {
                return Err(Error::InvalidConfig(format!(
                    "query start date {start} is after end date {end}"
                ))
                .into());
            }
        }
        Ok(())
    }
}
