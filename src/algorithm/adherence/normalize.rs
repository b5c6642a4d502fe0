//! Interval normalization
//!
//! Each fill record with a start date becomes exactly one coverage interval.
//! The end date comes from the first rule of this chain that applies:
//!
//! 1. the recorded end date
//! 2. a positive days supply
//! 3. a positive refill count, 30 days per refill
//! 4. the drug's median days supply
//! 5. a 30-day default
//!
//! Zero or negative supply and refill values count as missing.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use log::warn;

use super::median::DrugMedianTable;
use crate::models::interval::{DAYS_PER_REFILL, DEFAULT_SUPPLY_DAYS};
use crate::models::{CoverageInterval, FillRecord, SourceMethod, SupplySource};

/// Counts collected while normalizing a batch of fill records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Records seen
    pub total_records: usize,
    /// Records turned into intervals
    pub normalized: usize,
    /// Records excluded because they had no start date
    pub rejected_missing_start: usize,
    /// Recorded end dates before the start date, clamped to the start
    pub clamped_end_dates: usize,
    /// Intervals per end-date rule
    pub method_counts: BTreeMap<SourceMethod, usize>,
}

impl NormalizationReport {
    /// Number of intervals produced by a rule
    #[must_use]
    pub fn count(&self, method: SourceMethod) -> usize {
        self.method_counts.get(&method).copied().unwrap_or(0)
    }

    /// Share of intervals produced by a rule, in percent
    #[must_use]
    pub fn percentage(&self, method: SourceMethod) -> f64 {
        if self.normalized == 0 {
            return 0.0;
        }
        self.count(method) as f64 / self.normalized as f64 * 100.0
    }

    /// Number of intervals whose end date was imputed
    #[must_use]
    pub fn imputed(&self) -> usize {
        SourceMethod::ALL
            .iter()
            .filter(|m| m.is_imputed())
            .map(|m| self.count(*m))
            .sum()
    }
}

/// Pick the end-date rule for a record
#[must_use]
pub fn resolve_supply(record: &FillRecord, medians: &DrugMedianTable) -> SupplySource {
    if record.explicit_end_date.is_some() {
        SupplySource::ExplicitEnd
    } else if let Some(days) = record.positive_days_supply() {
        SupplySource::DaysSupply(i64::from(days))
    } else if let Some(refills) = record.positive_refills() {
        SupplySource::Refills(i64::from(refills))
    } else if let Some(days) = medians.supply_days(record.drug_id) {
        SupplySource::DrugMedian(days)
    } else {
        SupplySource::Default
    }
}

/// Derive the coverage interval of a fill record
///
/// Returns `None` when the record has no start date.
#[must_use]
pub fn normalize_fill(record: &FillRecord, medians: &DrugMedianTable) -> Option<CoverageInterval> {
    let start_date = record.start_date?;
    let source = resolve_supply(record, medians);

    let end_date = match source {
        SupplySource::ExplicitEnd => record.explicit_end_date.unwrap_or(start_date).max(start_date),
        SupplySource::DaysSupply(days) | SupplySource::DrugMedian(days) => {
            add_days(start_date, days - 1)
        }
        SupplySource::Refills(refills) => add_days(start_date, refills * DAYS_PER_REFILL - 1),
        SupplySource::Default => add_days(start_date, DEFAULT_SUPPLY_DAYS - 1),
    };

    Some(CoverageInterval {
        person_id: record.person_id,
        drug_id: record.drug_id,
        drug_exposure_id: record.drug_exposure_id,
        start_date,
        end_date,
        source,
        raw_days_supply: record.days_supply,
    })
}

/// Normalize a batch of fill records
///
/// Records without a start date are excluded and counted in the report.
#[must_use]
pub fn normalize_fills(
    records: &[FillRecord],
    medians: &DrugMedianTable,
) -> (Vec<CoverageInterval>, NormalizationReport) {
    let mut report = NormalizationReport {
        total_records: records.len(),
        ..Default::default()
    };
    let mut intervals = Vec::with_capacity(records.len());

    for record in records {
        let Some(interval) = normalize_fill(record, medians) else {
            report.rejected_missing_start += 1;
            continue;
        };

        if let (Some(start), Some(end)) = (record.start_date, record.explicit_end_date) {
            if end < start {
                report.clamped_end_dates += 1;
            }
        }

        *report.method_counts.entry(interval.source_method()).or_insert(0) += 1;
        intervals.push(interval);
    }

    report.normalized = intervals.len();

    if report.rejected_missing_start > 0 {
        warn!(
            "Excluded {} of {} fill records without a start date",
            report.rejected_missing_start, report.total_records
        );
    }
    if report.clamped_end_dates > 0 {
        warn!(
            "Clamped {} recorded end dates that preceded their start date",
            report.clamped_end_dates
        );
    }

    (intervals, report)
}

/// Shift a date by a number of days, saturating at the calendar bounds
fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days))
        .unwrap_or(if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}
