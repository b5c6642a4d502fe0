//! Adherence summary model
//!
//! One summary row is produced per qualifying (person, drug) group. The
//! coverage fields come from the merged periods of the group; the
//! decoration fields (drug name, age, conditions) come from optional lookups
//! and never affect the coverage numbers.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Drug name used when the drug concept has no name
pub const UNKNOWN_DRUG_NAME: &str = "Unknown Drug";

/// Condition label used when a person has no recorded conditions
pub const NO_CONDITION_RECORDED: &str = "No Condition Recorded";

/// Adherence classification of a PDC value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AdherenceStatus {
    /// PDC at or above the threshold
    Adherent,
    /// PDC within 0.1 below the threshold
    ModeratelyAdherent,
    /// PDC further below the threshold
    NonAdherent,
}

impl AdherenceStatus {
    /// All statuses, best first
    pub const ALL: [Self; 3] = [Self::Adherent, Self::ModeratelyAdherent, Self::NonAdherent];

    /// Get a descriptive name for this status
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Adherent => "Adherent",
            Self::ModeratelyAdherent => "Moderately Adherent",
            Self::NonAdherent => "Non-Adherent",
        }
    }
}

impl fmt::Display for AdherenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Coverage and adherence figures for one (person, drug) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceSummary {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP drug concept identifier
    pub drug_id: i64,
    /// Drug display name
    pub drug_name: String,
    /// Age at the reference year, when the year of birth is known
    pub age: Option<i32>,
    /// Most frequently recorded condition of the person
    pub primary_condition: String,
    /// Number of distinct conditions recorded for the person
    pub comorbidity_count: u32,
    /// Proportion of days covered, 4 decimals, within [0, 1]
    pub pdc: f64,
    /// Classification of `pdc`
    pub adherence_status: AdherenceStatus,
    /// Distinct days with supply
    pub total_days_covered: i64,
    /// Inclusive days from first period start to last period end
    pub treatment_duration: i64,
    /// Number of fills in the group
    pub total_fills: usize,
    /// Number of gaps between merged periods
    pub num_gaps: usize,
    /// Sum of gap days
    pub total_gap_days: i64,
    /// Longest gap, 0 when there are no gaps
    pub max_gap_days: i64,
    /// Start of the first fill
    pub first_exposure_date: NaiveDate,
    /// End of the last covered day
    pub last_exposure_date: NaiveDate,
}
