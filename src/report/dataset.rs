//! Overview of a fill record dataset

use std::fmt;

use chrono::NaiveDate;
use itertools::{Itertools, MinMaxResult};
use rustc_hash::FxHashSet;

use crate::models::FillRecord;

/// Size, span and completeness of a set of fill records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetInfo {
    /// Number of fill records
    pub total_exposures: usize,
    /// Earliest start date
    pub earliest_start: Option<NaiveDate>,
    /// Latest start date
    pub latest_start: Option<NaiveDate>,
    pub unique_persons: usize,
    pub unique_drugs: usize,
    /// Records without a days supply value
    pub null_days_supply: usize,
}

impl DatasetInfo {
    /// Describe a set of fill records
    #[must_use]
    pub fn from_records(records: &[FillRecord]) -> Self {
        let (earliest_start, latest_start) = match records.iter().filter_map(|r| r.start_date).minmax() {
            MinMaxResult::NoElements => (None, None),
            MinMaxResult::OneElement(date) => (Some(date), Some(date)),
            MinMaxResult::MinMax(min, max) => (Some(min), Some(max)),
        };

        Self {
            total_exposures: records.len(),
            earliest_start,
            latest_start,
            unique_persons: records.iter().map(|r| r.person_id).collect::<FxHashSet<_>>().len(),
            unique_drugs: records.iter().map(|r| r.drug_id).collect::<FxHashSet<_>>().len(),
            null_days_supply: records.iter().filter(|r| r.days_supply.is_none()).count(),
        }
    }

    /// Share of records without a days supply, in percent
    #[must_use]
    pub fn null_days_supply_percentage(&self) -> f64 {
        if self.total_exposures == 0 {
            return 0.0;
        }
        self.null_days_supply as f64 / self.total_exposures as f64 * 100.0
    }

    /// Start date range, when any record has a start date
    #[must_use]
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.earliest_start.zip(self.latest_start)
    }
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Drug Exposures: {}", self.total_exposures)?;
        match self.date_range() {
            Some((start, end)) => writeln!(f, "Date Range: {start} to {end}")?,
            None => writeln!(f, "Date Range: none")?,
        }
        writeln!(f, "Unique Persons: {}", self.unique_persons)?;
        writeln!(f, "Unique Drugs: {}", self.unique_drugs)?;
        write!(
            f,
            "Null Days Supply: {} ({:.1}%)",
            self.null_days_supply,
            self.null_days_supply_percentage()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_info() {
        let date = |m, d| NaiveDate::from_ymd_opt(2020, m, d).unwrap();
        let mut undated = FillRecord::new(3, 200, date(1, 1));
        undated.start_date = None;
        let records = vec![
            FillRecord::new(1, 100, date(3, 1)).with_days_supply(30),
            FillRecord::new(1, 200, date(1, 15)),
            FillRecord::new(2, 100, date(6, 30)).with_days_supply(90),
            undated,
        ];

        let info = DatasetInfo::from_records(&records);
        assert_eq!(info.total_exposures, 4);
        assert_eq!(info.date_range(), Some((date(1, 15), date(6, 30))));
        assert_eq!(info.unique_persons, 3);
        assert_eq!(info.unique_drugs, 2);
        assert_eq!(info.null_days_supply, 2);
        assert!((info.null_days_supply_percentage() - 50.0).abs() < 1e-9);
        assert!(info.to_string().contains("Unique Drugs: 2"));
    }

    #[test]
    fn test_empty_dataset() {
        let info = DatasetInfo::from_records(&[]);
        assert_eq!(info.date_range(), None);
        assert!(info.null_days_supply_percentage().abs() < f64::EPSILON);
    }
}
