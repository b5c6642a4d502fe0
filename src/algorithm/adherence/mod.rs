//! Medication adherence analysis
//!
//! This module turns raw fill records into per-(person, drug) coverage
//! summaries and gap rows:
//!
//! - [`normalize`] resolves one coverage interval per fill
//! - [`coverage`] merges the intervals of a group and measures coverage
//! - [`gaps`] reports the uncovered stretches between coverage
//! - [`status`] computes PDC and the adherence classification
//!
//! Groups are independent and are processed on the rayon thread pool unless
//! the configuration disables it. Output order is always ascending by
//! `(person_id, drug_id)`.

pub mod conditions;
pub mod coverage;
pub mod gaps;
pub mod median;
pub mod normalize;
pub mod status;

use std::time::Instant;

use chrono::NaiveDate;
use log::{debug, info};
use rayon::prelude::*;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::models::{
    AdherenceSummary, CoverageInterval, Demographics, DrugConcepts, FillRecord, GapRecord, GroupKey,
};
use crate::source::FillSource;
use crate::utils::logging::{create_group_progress_bar, finish_progress_bar};

pub use conditions::apply_condition_history;
pub use coverage::{CoverageGroup, merge_intervals, merge_sorted, sort_intervals};
pub use gaps::{detect_gaps, fill_gaps, period_gaps};
pub use median::DrugMedianTable;
pub use normalize::{NormalizationReport, normalize_fill, normalize_fills, resolve_supply};
pub use status::{classify_adherence, compute_pdc};

/// Decoration lookups for output rows
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    /// Drug concept names
    pub drug_names: DrugConcepts,
    /// Person demographics and condition history
    pub demographics: Demographics,
}

impl Lookups {
    /// Create lookups from drug names and demographics
    #[must_use]
    pub const fn new(drug_names: DrugConcepts, demographics: Demographics) -> Self {
        Self {
            drug_names,
            demographics,
        }
    }
}

/// Result of an analysis run
#[derive(Debug, Clone, Default)]
pub struct AdherenceReport {
    /// One row per qualifying (person, drug) group
    pub summaries: Vec<AdherenceSummary>,
    /// Gap rows of all groups
    pub gaps: Vec<GapRecord>,
    /// Counts from interval normalization
    pub normalization: NormalizationReport,
}

impl AdherenceReport {
    /// Whether the run produced no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty() && self.gaps.is_empty()
    }
}

/// Output of one group
struct GroupOutcome {
    summary: Option<AdherenceSummary>,
    gaps: Vec<GapRecord>,
}

/// Run the analysis against a data source
///
/// The drug median table is taken from the unfiltered dataset, fills from the
/// configured query. Errors from the source are returned unchanged and no
/// partial report is produced.
pub fn run_analysis<S: FillSource + ?Sized>(source: &S, config: &AnalysisConfig) -> Result<AdherenceReport> {
    config.validate()?;

    let medians = source.drug_medians()?;
    debug!("Drug median table covers {} drugs", medians.len());

    let records = source.fetch_fills(&config.query)?;
    info!("Fetched {} fill records", records.len());

    let as_of = analysis_end_date(config, &records);
    let lookups = Lookups::new(source.drug_names()?, source.demographics(as_of)?);

    analyze_records(&records, &medians, &lookups, config)
}

/// Analyze fill records that have already been fetched
pub fn analyze_records(
    records: &[FillRecord],
    medians: &DrugMedianTable,
    lookups: &Lookups,
    config: &AnalysisConfig,
) -> Result<AdherenceReport> {
    config.validate()?;
    let start = Instant::now();

    let (mut intervals, normalization) = normalize_fills(records, medians);
    if config.parallel {
        intervals.par_sort_unstable_by_key(CoverageInterval::order_key);
    } else {
        intervals.sort_unstable_by_key(CoverageInterval::order_key);
    }

    // intervals are contiguous per group and sorted by (start, end, row) within it
    let groups: Vec<&[CoverageInterval]> = intervals
        .chunk_by(|a, b| a.group_key() == b.group_key())
        .collect();
    info!(
        "Processing {} person-drug groups from {} intervals",
        groups.len(),
        intervals.len()
    );

    let pb = config
        .show_progress
        .then(|| create_group_progress_bar(groups.len() as u64, Some("Computing coverage")));

    let process = |group: &&[CoverageInterval]| {
        let outcome = process_group(group, lookups, config);
        if let Some(pb) = &pb {
            pb.inc(1);
        }
        outcome
    };

    let outcomes: Vec<GroupOutcome> = if config.parallel {
        groups.par_iter().map(process).collect()
    } else {
        groups.iter().map(process).collect()
    };

    if let Some(pb) = &pb {
        finish_progress_bar(pb, Some("Coverage computed"));
    }

    let mut report = AdherenceReport {
        normalization,
        ..Default::default()
    };
    for outcome in outcomes {
        report.summaries.extend(outcome.summary);
        report.gaps.extend(outcome.gaps);
    }

    info!(
        "Produced {} summaries and {} gap rows in {:?}",
        report.summaries.len(),
        report.gaps.len(),
        start.elapsed()
    );

    Ok(report)
}

/// Merge, measure and decorate one group of sorted intervals
fn process_group(sorted: &[CoverageInterval], lookups: &Lookups, config: &AnalysisConfig) -> GroupOutcome {
    let Some(first) = sorted.first() else {
        return GroupOutcome {
            summary: None,
            gaps: Vec::new(),
        };
    };
    let key = first.group_key();

    if config.require_drug_name && lookups.drug_names.get(key.drug_id).is_none() {
        return GroupOutcome {
            summary: None,
            gaps: Vec::new(),
        };
    }

    let group = CoverageGroup {
        key,
        periods: merge_sorted(sorted),
        total_fills: sorted.len(),
    };
    let drug_name = lookups.drug_names.display_name(key.drug_id);

    let gaps = detect_gaps(config.gap_basis, &group, sorted, &drug_name, config.min_gap_days);
    let (Some(first_day), Some(last_day)) = (group.first_date(), group.last_date()) else {
        return GroupOutcome { summary: None, gaps };
    };
    let treatment_duration = (last_day - first_day).num_days() + 1;
    let summary = (treatment_duration >= config.min_treatment_days)
        .then(|| summarize_group(&group, (first_day, last_day), drug_name, lookups, config));

    GroupOutcome { summary, gaps }
}

/// Build the summary row of a merged group spanning `first..=last`
fn summarize_group(
    group: &CoverageGroup,
    (first, last): (NaiveDate, NaiveDate),
    drug_name: String,
    lookups: &Lookups,
    config: &AnalysisConfig,
) -> AdherenceSummary {
    let GroupKey { person_id, drug_id } = group.key;
    let person = lookups.demographics.get(person_id);
    let pdc = group.pdc();

    AdherenceSummary {
        person_id,
        drug_id,
        drug_name,
        age: config
            .age_reference_year
            .and_then(|year| person.and_then(|p| p.age_in(year))),
        primary_condition: lookups.demographics.primary_condition(person_id),
        comorbidity_count: person.map_or(0, |p| p.comorbidity_count),
        pdc,
        adherence_status: classify_adherence(pdc, config.pdc_threshold),
        total_days_covered: group.total_days_covered(),
        treatment_duration: (last - first).num_days() + 1,
        total_fills: group.total_fills,
        num_gaps: group.num_gaps(),
        total_gap_days: group.total_gap_days(),
        max_gap_days: group.max_gap_days(),
        first_exposure_date: first,
        last_exposure_date: last,
    }
}

/// Date up to which condition history is taken into account
///
/// The query end date when set, otherwise the latest fill start.
fn analysis_end_date(config: &AnalysisConfig, records: &[FillRecord]) -> NaiveDate {
    config
        .query
        .end_date
        .or_else(|| records.iter().filter_map(|r| r.start_date).max())
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GapBasis;
    use crate::models::{AdherenceStatus, GapSeverity, PersonDemographics};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn analyze(records: &[FillRecord], config: &AnalysisConfig) -> AdherenceReport {
        analyze_records(records, &DrugMedianTable::new(), &Lookups::default(), config).unwrap()
    }

    #[test]
    fn test_single_interval_is_fully_adherent() {
        let records = vec![FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(45)];
        let report = analyze(&records, &AnalysisConfig::default());

        assert_eq!(report.summaries.len(), 1);
        let summary = &report.summaries[0];
        assert_eq!(summary.treatment_duration, 45);
        assert_eq!(summary.total_days_covered, 45);
        assert!((summary.pdc - 1.0).abs() < f64::EPSILON);
        assert_eq!(summary.adherence_status, AdherenceStatus::Adherent);
        assert_eq!(summary.drug_name, "Unknown Drug");
        assert_eq!(summary.primary_condition, "No Condition Recorded");
        assert!(report.gaps.is_empty());
    }

    #[test]
    fn test_summary_span_comes_from_merged_periods() {
        let records = vec![
            FillRecord::new(1, 100, date(2020, 3, 1)).with_days_supply(30),
            FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(40),
            FillRecord::new(1, 100, date(2020, 1, 20)).with_days_supply(10),
        ];
        let report = analyze(&records, &AnalysisConfig::default());

        let summary = &report.summaries[0];
        assert_eq!(summary.first_exposure_date, date(2020, 1, 1));
        assert_eq!(summary.last_exposure_date, date(2020, 3, 30));
        assert_eq!(summary.treatment_duration, 90);
        assert_eq!(summary.total_days_covered, 70);
        assert_eq!(summary.total_fills, 3);
        assert_eq!(summary.num_gaps, 1);
    }

    #[test]
    fn test_short_groups_are_excluded_but_keep_gap_rows() {
        let records = vec![
            FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(5),
            FillRecord::new(1, 100, date(2020, 1, 15)).with_days_supply(5),
        ];
        let report = analyze(&records, &AnalysisConfig::default());
        assert!(report.summaries.is_empty());
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].gap_days, 9);
        assert_eq!(report.gaps[0].severity, GapSeverity::Minor);
    }

    #[test]
    fn test_output_is_sorted_by_group() {
        let records = vec![
            FillRecord::new(2, 100, date(2020, 1, 1)).with_days_supply(30),
            FillRecord::new(1, 200, date(2020, 1, 1)).with_days_supply(30),
            FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(30),
        ];
        for parallel in [true, false] {
            let config = AnalysisConfig::default().with_parallel(parallel);
            let keys: Vec<_> = analyze(&records, &config)
                .summaries
                .iter()
                .map(|s| (s.person_id, s.drug_id))
                .collect();
            assert_eq!(keys, vec![(1, 100), (1, 200), (2, 100)]);
        }
    }

    #[test]
    fn test_decoration_and_required_drug_name() {
        let records = vec![
            FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(60),
            FillRecord::new(1, 200, date(2020, 1, 1)).with_days_supply(60),
        ];
        let drug_names: DrugConcepts = vec![(100, "Metformin".to_string())].into_iter().collect();
        let mut demographics = Demographics::new();
        demographics.insert(
            1,
            PersonDemographics {
                year_of_birth: Some(1950),
                primary_condition: Some("Type 2 diabetes mellitus".to_string()),
                comorbidity_count: 3,
            },
        );
        let lookups = Lookups::new(drug_names, demographics);
        let medians = DrugMedianTable::new();

        let config = AnalysisConfig::default().with_age_reference_year(2020);
        let report = analyze_records(&records, &medians, &lookups, &config).unwrap();
        assert_eq!(report.summaries.len(), 2);
        let first = &report.summaries[0];
        assert_eq!(first.drug_name, "Metformin");
        assert_eq!(first.age, Some(70));
        assert_eq!(first.primary_condition, "Type 2 diabetes mellitus");
        assert_eq!(first.comorbidity_count, 3);
        assert_eq!(report.summaries[1].drug_name, "Unknown Drug");

        let config = config.with_require_drug_name(true);
        let report = analyze_records(&records, &medians, &lookups, &config).unwrap();
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.summaries[0].drug_id, 100);
    }

    #[test]
    fn test_gap_basis_changes_gap_rows_only() {
        let records = vec![
            FillRecord::new(1, 100, date(2020, 1, 1)).with_days_supply(180),
            FillRecord::new(1, 100, date(2020, 2, 1)).with_days_supply(10),
            FillRecord::new(1, 100, date(2020, 3, 1)).with_days_supply(30),
        ];
        let by_period = analyze(&records, &AnalysisConfig::default());
        let by_fill = analyze(
            &records,
            &AnalysisConfig::default().with_gap_basis(GapBasis::ConsecutiveFills),
        );
        assert!(by_period.gaps.is_empty());
        assert_eq!(by_fill.gaps.len(), 1);
        assert_eq!(by_period.summaries, by_fill.summaries);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = AnalysisConfig::default().with_pdc_threshold(1.5);
        let result = analyze_records(&[], &DrugMedianTable::new(), &Lookups::default(), &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_input_gives_empty_report() {
        let report = analyze(&[], &AnalysisConfig::default());
        assert!(report.is_empty());
        assert_eq!(report.normalization.total_records, 0);
    }
}
