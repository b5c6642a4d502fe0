//! Coverage interval model
//!
//! A coverage interval is the inclusive span of days a single fill is
//! assumed to cover, together with the rule that produced its end date.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::fill::GroupKey;

/// Days assumed when no other supply information exists
pub const DEFAULT_SUPPLY_DAYS: i64 = 30;

/// Days of supply assumed per refill
pub const DAYS_PER_REFILL: i64 = 30;

/// The rule that resolved a fill's end date, with the value it used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupplySource {
    /// The record carried an end date
    ExplicitEnd,
    /// Derived from a positive days supply
    DaysSupply(i64),
    /// Derived from a positive refill count
    Refills(i64),
    /// Imputed from the drug's median days supply
    DrugMedian(i64),
    /// Fixed one-month default
    Default,
}

impl SupplySource {
    /// The audit tag for this source
    #[must_use]
    pub const fn method(self) -> SourceMethod {
        match self {
            Self::ExplicitEnd => SourceMethod::ExplicitEnd,
            Self::DaysSupply(_) => SourceMethod::DaysSupply,
            Self::Refills(_) => SourceMethod::Refills,
            Self::DrugMedian(_) => SourceMethod::DrugMedianImputed,
            Self::Default => SourceMethod::Default30,
        }
    }

    /// Days of supply this source resolved to, if it was supply-based
    #[must_use]
    pub const fn supply_days(self) -> Option<i64> {
        match self {
            Self::ExplicitEnd => None,
            Self::DaysSupply(days) | Self::DrugMedian(days) => Some(days),
            Self::Refills(refills) => Some(refills * DAYS_PER_REFILL),
            Self::Default => Some(DEFAULT_SUPPLY_DAYS),
        }
    }
}

/// Audit tag naming the branch of the end-date fallback chain that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMethod {
    /// `explicit_end`
    ExplicitEnd,
    /// `days_supply`
    DaysSupply,
    /// `refills`
    Refills,
    /// `drug_median_imputed`
    DrugMedianImputed,
    /// `default_30`
    #[serde(rename = "default_30")]
    Default30,
}

impl SourceMethod {
    /// All methods, in fallback order
    pub const ALL: [Self; 5] = [
        Self::ExplicitEnd,
        Self::DaysSupply,
        Self::Refills,
        Self::DrugMedianImputed,
        Self::Default30,
    ];

    /// The tag as reported in output tables
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExplicitEnd => "explicit_end",
            Self::DaysSupply => "days_supply",
            Self::Refills => "refills",
            Self::DrugMedianImputed => "drug_median_imputed",
            Self::Default30 => "default_30",
        }
    }

    /// Whether the end date was imputed rather than recorded or dispensed
    #[must_use]
    pub const fn is_imputed(self) -> bool {
        matches!(self, Self::DrugMedianImputed | Self::Default30)
    }
}

impl fmt::Display for SourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive span of days covered by one fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageInterval {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP drug concept identifier
    pub drug_id: i64,
    /// Source row identifier
    pub drug_exposure_id: Option<i64>,
    /// First covered day
    pub start_date: NaiveDate,
    /// Last covered day (inclusive)
    pub end_date: NaiveDate,
    /// Rule that produced `end_date`
    pub source: SupplySource,
    /// Raw days supply of the fill, if recorded
    pub raw_days_supply: Option<i32>,
}

impl CoverageInterval {
    /// Audit tag of the interval
    #[must_use]
    pub const fn source_method(&self) -> SourceMethod {
        self.source.method()
    }

    /// Number of days in the interval
    #[must_use]
    pub fn length_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    /// Grouping key of the interval
    #[must_use]
    pub const fn group_key(&self) -> GroupKey {
        GroupKey {
            person_id: self.person_id,
            drug_id: self.drug_id,
        }
    }

    /// Total order used before merging and gap detection
    ///
    /// Intervals sharing a span are ordered by source row and then by raw
    /// supply, so per-fill gap rows do not depend on input order.
    #[must_use]
    pub const fn order_key(&self) -> (GroupKey, NaiveDate, NaiveDate, Option<i64>, Option<i32>) {
        (
            self.group_key(),
            self.start_date,
            self.end_date,
            self.drug_exposure_id,
            self.raw_days_supply,
        )
    }
}
