//! Merged coverage period model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A maximal run of overlapping or adjacent coverage intervals
/// within one (person, drug) group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedPeriod {
    /// First covered day
    pub period_start: NaiveDate,
    /// Last covered day (inclusive)
    pub period_end: NaiveDate,
    /// Number of intervals merged into the period
    pub num_fills_merged: usize,
    /// Distinct days covered by the period
    pub days_covered: i64,
}

impl MergedPeriod {
    /// Days between this period's end and the next period's start, exclusive
    #[must_use]
    pub fn days_until(&self, next: &Self) -> i64 {
        (next.period_start - self.period_end).num_days() - 1
    }
}
