//! Coverage aggregation for one (person, drug) group
//!
//! Intervals are sorted by `(start, end)` and merged in a single linear scan
//! that carries the bounds of the current period. An interval starting on
//! or before the day after the current end extends the period; anything
//! later closes it. Covered days are counted as the days an interval adds
//! past the running end, so overlapping fills are never counted twice.

use chrono::NaiveDate;
use smallvec::SmallVec;

use super::status::compute_pdc;
use crate::models::{CoverageInterval, GroupKey, MergedPeriod};

/// Merged periods of a group, most groups have only a few
pub type Periods = SmallVec<[MergedPeriod; 4]>;

/// Running state of the merge scan
#[derive(Debug, Clone, Copy)]
struct RunningPeriod {
    start: NaiveDate,
    end: NaiveDate,
    fills: usize,
    days: i64,
}

impl RunningPeriod {
    fn open(interval: &CoverageInterval) -> Self {
        Self {
            start: interval.start_date,
            end: interval.end_date,
            fills: 1,
            days: interval.length_days(),
        }
    }

    /// Whether the interval overlaps or touches the period
    fn absorbs(&self, interval: &CoverageInterval) -> bool {
        (interval.start_date - self.end).num_days() <= 1
    }

    fn extend(&mut self, interval: &CoverageInterval) {
        let added = (interval.end_date - self.end).num_days().max(0);
        self.days += added;
        self.end = self.end.max(interval.end_date);
        self.fills += 1;
    }

    const fn close(self) -> MergedPeriod {
        MergedPeriod {
            period_start: self.start,
            period_end: self.end,
            num_fills_merged: self.fills,
            days_covered: self.days,
        }
    }
}

/// Merged coverage of one (person, drug) group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGroup {
    /// The (person, drug) pair
    pub key: GroupKey,
    /// Merged periods in ascending order
    pub periods: Periods,
    /// Number of intervals in the group
    pub total_fills: usize,
}

impl CoverageGroup {
    /// Distinct days covered by any interval
    #[must_use]
    pub fn total_days_covered(&self) -> i64 {
        self.periods.iter().map(|p| p.days_covered).sum()
    }

    /// First covered day
    #[must_use]
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.periods.first().map(|p| p.period_start)
    }

    /// Last covered day
    #[must_use]
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.periods.last().map(|p| p.period_end)
    }

    /// Inclusive days from the first period start to the last period end
    #[must_use]
    pub fn treatment_duration(&self) -> i64 {
        match (self.first_date(), self.last_date()) {
            (Some(first), Some(last)) => (last - first).num_days() + 1,
            _ => 0,
        }
    }

    /// Gap lengths between consecutive periods, each at least one day
    pub fn gap_lengths(&self) -> impl Iterator<Item = i64> + '_ {
        self.periods.windows(2).map(|pair| pair[0].days_until(&pair[1]))
    }

    /// Number of gaps
    #[must_use]
    pub fn num_gaps(&self) -> usize {
        self.periods.len().saturating_sub(1)
    }

    /// Sum of gap days
    #[must_use]
    pub fn total_gap_days(&self) -> i64 {
        self.gap_lengths().sum()
    }

    /// Longest gap, 0 without gaps
    #[must_use]
    pub fn max_gap_days(&self) -> i64 {
        self.gap_lengths().max().unwrap_or(0)
    }

    /// Proportion of days covered
    #[must_use]
    pub fn pdc(&self) -> f64 {
        compute_pdc(self.total_days_covered(), self.treatment_duration())
    }
}

/// Sort intervals by start date, then end date, then source row
pub fn sort_intervals(intervals: &mut [CoverageInterval]) {
    intervals.sort_unstable_by_key(CoverageInterval::order_key);
}

/// Merge intervals that are already sorted with [`sort_intervals`]
#[must_use]
pub fn merge_sorted(intervals: &[CoverageInterval]) -> Periods {
    let mut periods = Periods::new();
    let Some((first, rest)) = intervals.split_first() else {
        return periods;
    };

    let mut current = RunningPeriod::open(first);
    for interval in rest {
        if current.absorbs(interval) {
            current.extend(interval);
        } else {
            periods.push(current.close());
            current = RunningPeriod::open(interval);
        }
    }
    periods.push(current.close());

    periods
}

/// Merge the intervals of one group in any order
///
/// Returns `None` for an empty input.
#[must_use]
pub fn merge_intervals(key: GroupKey, intervals: &[CoverageInterval]) -> Option<CoverageGroup> {
    if intervals.is_empty() {
        return None;
    }
    let mut sorted = intervals.to_vec();
    sort_intervals(&mut sorted);

    Some(CoverageGroup {
        key,
        periods: merge_sorted(&sorted),
        total_fills: sorted.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SupplySource;

    const KEY: GroupKey = GroupKey {
        person_id: 1,
        drug_id: 100,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn interval(start: NaiveDate, end: NaiveDate) -> CoverageInterval {
        CoverageInterval {
            person_id: KEY.person_id,
            drug_id: KEY.drug_id,
            drug_exposure_id: None,
            start_date: start,
            end_date: end,
            source: SupplySource::ExplicitEnd,
            raw_days_supply: None,
        }
    }

    #[test]
    fn test_adjacent_intervals_merge() {
        let intervals = [
            interval(date(2020, 1, 1), date(2020, 1, 10)),
            interval(date(2020, 1, 11), date(2020, 1, 20)),
        ];
        let group = merge_intervals(KEY, &intervals).unwrap();
        assert_eq!(group.periods.len(), 1);
        assert_eq!(group.total_days_covered(), 20);
        assert_eq!(group.treatment_duration(), 20);
        assert_eq!(group.num_gaps(), 0);
        assert_eq!(group.max_gap_days(), 0);
    }

    #[test]
    fn test_overlap_is_not_double_counted() {
        let intervals = [
            interval(date(2020, 1, 20), date(2020, 2, 10)),
            interval(date(2020, 1, 1), date(2020, 1, 30)),
        ];
        let group = merge_intervals(KEY, &intervals).unwrap();
        assert_eq!(group.periods.len(), 1);
        let period = group.periods[0];
        assert_eq!(period.period_start, date(2020, 1, 1));
        assert_eq!(period.period_end, date(2020, 2, 10));
        assert_eq!(period.num_fills_merged, 2);
        assert_eq!(period.days_covered, 41);
        assert_eq!(group.total_days_covered(), 41);
    }

    #[test]
    fn test_nested_interval_adds_nothing() {
        let intervals = [
            interval(date(2020, 1, 1), date(2020, 3, 31)),
            interval(date(2020, 1, 15), date(2020, 1, 20)),
            interval(date(2020, 2, 1), date(2020, 4, 10)),
        ];
        let group = merge_intervals(KEY, &intervals).unwrap();
        assert_eq!(group.periods.len(), 1);
        assert_eq!(group.total_days_covered(), group.treatment_duration());
        assert_eq!(group.total_days_covered(), 101);
        assert!((group.pdc() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gap_between_periods() {
        let intervals = [
            interval(date(2020, 1, 1), date(2020, 1, 10)),
            interval(date(2020, 1, 15), date(2020, 1, 20)),
        ];
        let group = merge_intervals(KEY, &intervals).unwrap();
        assert_eq!(group.periods.len(), 2);
        assert_eq!(group.num_gaps(), 1);
        assert_eq!(group.total_gap_days(), 4);
        assert_eq!(group.total_days_covered(), 16);
        assert_eq!(
            group.total_days_covered() + group.total_gap_days(),
            group.treatment_duration()
        );
        assert!((group.pdc() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_single_day_intervals() {
        let day = date(2020, 5, 5);
        let intervals = [interval(day, day), interval(day, day)];
        let group = merge_intervals(KEY, &intervals).unwrap();
        assert_eq!(group.total_fills, 2);
        assert_eq!(group.total_days_covered(), 1);
        assert_eq!(group.treatment_duration(), 1);
    }

    #[test]
    fn test_empty_group() {
        assert!(merge_intervals(KEY, &[]).is_none());
        assert!(merge_sorted(&[]).is_empty());
    }
}
