//! Coverage gap model
//!
//! Gap rows describe runs of uncovered days between consecutive merged
//! periods (or consecutive fills), bucketed into fixed severity levels.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Severity levels for coverage gaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GapSeverity {
    /// Fewer than 7 days
    Minimal = 1,
    /// 7 to 13 days
    Minor = 2,
    /// 14 to 29 days
    Moderate = 3,
    /// 30 to 89 days
    Major = 4,
    /// 90 days or more
    Critical = 5,
}

impl GapSeverity {
    /// All severities, most severe first
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::Major,
        Self::Moderate,
        Self::Minor,
        Self::Minimal,
    ];

    /// Classify a gap length in days
    #[must_use]
    pub const fn from_gap_days(gap_days: i64) -> Self {
        if gap_days >= 90 {
            Self::Critical
        } else if gap_days >= 30 {
            Self::Major
        } else if gap_days >= 14 {
            Self::Moderate
        } else if gap_days >= 7 {
            Self::Minor
        } else {
            Self::Minimal
        }
    }

    /// Short name of the level
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Critical => "Critical Gap",
            Self::Major => "Major Gap",
            Self::Moderate => "Moderate Gap",
            Self::Minor => "Minor Gap",
            Self::Minimal => "Minimal Gap",
        }
    }

    /// Name of the level with its day range, as used in reports
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Critical => "Critical Gap (90+ days)",
            Self::Major => "Major Gap (30-89 days)",
            Self::Moderate => "Moderate Gap (14-29 days)",
            Self::Minor => "Minor Gap (7-13 days)",
            Self::Minimal => "Minimal Gap (<7 days)",
        }
    }
}

impl fmt::Display for GapSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One detected gap within a (person, drug) group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapRecord {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP drug concept identifier
    pub drug_id: i64,
    /// Drug display name
    pub drug_name: String,
    /// 1-based position of the period or fill preceding the gap
    pub sequence: usize,
    /// Source row of the fill preceding the gap (fill basis only)
    pub drug_exposure_id: Option<i64>,
    /// Start of the period or fill preceding the gap
    pub before_start: NaiveDate,
    /// End of the period or fill preceding the gap
    pub before_end: NaiveDate,
    /// First uncovered day
    pub gap_start: NaiveDate,
    /// Last uncovered day
    pub gap_end: NaiveDate,
    /// Number of uncovered days
    pub gap_days: i64,
    /// Severity bucket of `gap_days`
    pub severity: GapSeverity,
    /// Start of the period or fill following the gap
    pub next_start: NaiveDate,
    /// Raw days supply of the fill preceding the gap (fill basis only)
    pub days_supply_before_gap: Option<i32>,
}
