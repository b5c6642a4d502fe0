//! Gap detection
//!
//! Gaps are measured either between the merged periods of a group or between
//! each fill and the next fill's start. Only gaps of at least one day that
//! reach the configured minimum are reported.

use chrono::Duration;

use super::coverage::CoverageGroup;
use crate::config::GapBasis;
use crate::models::{CoverageInterval, GapRecord, GapSeverity, GroupKey};

/// Gap rows between consecutive merged periods of a group
#[must_use]
pub fn period_gaps(group: &CoverageGroup, drug_name: &str, min_gap_days: i64) -> Vec<GapRecord> {
    group
        .periods
        .windows(2)
        .enumerate()
        .filter_map(|(idx, pair)| {
            let (before, after) = (&pair[0], &pair[1]);
            let gap_days = before.days_until(after);
            (gap_days >= 1 && gap_days >= min_gap_days).then(|| GapRecord {
                person_id: group.key.person_id,
                drug_id: group.key.drug_id,
                drug_name: drug_name.to_string(),
                sequence: idx + 1,
                drug_exposure_id: None,
                before_start: before.period_start,
                before_end: before.period_end,
                gap_start: before.period_end + Duration::days(1),
                gap_end: after.period_start - Duration::days(1),
                gap_days,
                severity: GapSeverity::from_gap_days(gap_days),
                next_start: after.period_start,
                days_supply_before_gap: None,
            })
        })
        .collect()
}

/// Gap rows between each fill and the next fill, for intervals sorted with
/// [`CoverageInterval::order_key`]
///
/// Each fill is compared with its successor only, so a gap can be reported
/// even when an earlier, longer fill still covers it.
#[must_use]
pub fn fill_gaps(
    key: GroupKey,
    sorted_intervals: &[CoverageInterval],
    drug_name: &str,
    min_gap_days: i64,
) -> Vec<GapRecord> {
    sorted_intervals
        .windows(2)
        .enumerate()
        .filter_map(|(idx, pair)| {
            let (before, after) = (&pair[0], &pair[1]);
            let gap_days = (after.start_date - before.end_date).num_days() - 1;
            (gap_days >= 1 && gap_days >= min_gap_days).then(|| GapRecord {
                person_id: key.person_id,
                drug_id: key.drug_id,
                drug_name: drug_name.to_string(),
                sequence: idx + 1,
                drug_exposure_id: before.drug_exposure_id,
                before_start: before.start_date,
                before_end: before.end_date,
                gap_start: before.end_date + Duration::days(1),
                gap_end: after.start_date - Duration::days(1),
                gap_days,
                severity: GapSeverity::from_gap_days(gap_days),
                next_start: after.start_date,
                days_supply_before_gap: before.raw_days_supply,
            })
        })
        .collect()
}

/// Gap rows of a group on the requested basis
#[must_use]
pub fn detect_gaps(
    basis: GapBasis,
    group: &CoverageGroup,
    sorted_intervals: &[CoverageInterval],
    drug_name: &str,
    min_gap_days: i64,
) -> Vec<GapRecord> {
    match basis {
        GapBasis::MergedPeriods => period_gaps(group, drug_name, min_gap_days),
        GapBasis::ConsecutiveFills => fill_gaps(group.key, sorted_intervals, drug_name, min_gap_days),
    }
}
