//! Properties of the coverage computation over generated fill histories

mod utils;

use chrono::Duration;
use omop_adherence::algorithm::adherence::normalize_fill;
use omop_adherence::{
    AdherenceReport, AdherenceStatus, AnalysisConfig, DrugMedianTable, FillRecord, GapBasis, GapSeverity, Lookups,
    SourceMethod, analyze_records,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use utils::{date, fill, supply};

/// Random fill histories for a handful of persons and drugs
fn generate_records(seed: u64, count: usize) -> Vec<FillRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let origin = date(2020, 1, 1);

    (0..count)
        .map(|i| {
            let person_id = rng.random_range(1..=8);
            let drug_id = rng.random_range(1..=3) * 1000;
            let start = origin + Duration::days(rng.random_range(0..365));
            let record = FillRecord::new(person_id, drug_id, start).with_exposure_id(i as i64);
            match rng.random_range(0..4) {
                0 => record.with_end_date(start + Duration::days(rng.random_range(0..60))),
                1 => record.with_days_supply(rng.random_range(-5..90)),
                2 => record.with_refills(rng.random_range(0..3)),
                _ => record,
            }
        })
        .collect()
}

fn analyze(records: &[FillRecord], config: &AnalysisConfig) -> AdherenceReport {
    let medians = DrugMedianTable::from_records(records);
    analyze_records(records, &medians, &Lookups::default(), config).unwrap()
}

fn all_groups() -> AnalysisConfig {
    AnalysisConfig::default().with_min_treatment_days(0).with_min_gap_days(0)
}

#[test]
fn test_coverage_partitions_treatment_duration() {
    for seed in 0..5 {
        let report = analyze(&generate_records(seed, 400), &all_groups());
        assert!(!report.summaries.is_empty());

        for summary in &report.summaries {
            assert!(summary.total_days_covered <= summary.treatment_duration);
            assert_eq!(
                summary.total_gap_days + summary.total_days_covered,
                summary.treatment_duration,
                "person {} drug {}",
                summary.person_id,
                summary.drug_id
            );
            assert!((0.0..=1.0).contains(&summary.pdc));
            assert!(summary.max_gap_days <= summary.total_gap_days);
        }
    }
}

#[test]
fn test_gap_rows_match_summaries() {
    let report = analyze(&generate_records(11, 300), &all_groups());

    for summary in &report.summaries {
        let gaps: Vec<_> = report
            .gaps
            .iter()
            .filter(|g| g.person_id == summary.person_id && g.drug_id == summary.drug_id)
            .collect();
        assert_eq!(gaps.len(), summary.num_gaps);
        assert_eq!(gaps.iter().map(|g| g.gap_days).sum::<i64>(), summary.total_gap_days);
        for gap in gaps {
            assert!(gap.gap_days >= 1);
            assert_eq!((gap.gap_end - gap.gap_start).num_days() + 1, gap.gap_days);
            assert_eq!(gap.severity, GapSeverity::from_gap_days(gap.gap_days));
        }
    }
}

#[test]
fn test_order_independence() {
    let records = generate_records(42, 300);

    for basis in [GapBasis::MergedPeriods, GapBasis::ConsecutiveFills] {
        let config = AnalysisConfig::default().with_gap_basis(basis);
        let expected = analyze(&records, &config);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..5 {
            let mut shuffled = records.clone();
            shuffled.shuffle(&mut rng);
            for parallel in [true, false] {
                let report = analyze(&shuffled, &config.clone().with_parallel(parallel));
                assert_eq!(report.summaries, expected.summaries);
                assert_eq!(report.gaps, expected.gaps);
            }
        }
    }
}

#[test]
fn test_fills_with_identical_spans_give_stable_gap_rows() {
    let by_supply = supply(1, 100, date(2020, 1, 1), 30).with_exposure_id(10);
    let by_end = fill(1, 100, date(2020, 1, 1), date(2020, 1, 30)).with_exposure_id(20);
    let next = supply(1, 100, date(2020, 3, 1), 30).with_exposure_id(30);
    let config = AnalysisConfig::default().with_gap_basis(GapBasis::ConsecutiveFills);

    let forward = analyze(&[by_supply.clone(), by_end.clone(), next.clone()], &config);
    let reversed = analyze(&[by_end, by_supply, next], &config);

    assert_eq!(forward.gaps, reversed.gaps);
    assert_eq!(forward.gaps.len(), 1);
    let gap = &forward.gaps[0];
    assert_eq!(gap.gap_days, 30);
    assert_eq!(gap.drug_exposure_id, Some(20));
    assert_eq!(gap.days_supply_before_gap, None);
}

#[test]
fn test_idempotence_and_parallel_equivalence() {
    let records = generate_records(3, 500);
    let first = analyze(&records, &AnalysisConfig::default());
    let second = analyze(&records, &AnalysisConfig::default());
    let sequential = analyze(&records, &AnalysisConfig::default().with_parallel(false));
    let with_progress = analyze(&records, &AnalysisConfig::default().with_progress(true));

    assert_eq!(first.summaries, second.summaries);
    assert_eq!(first.gaps, second.gaps);
    assert_eq!(first.summaries, sequential.summaries);
    assert_eq!(first.gaps, sequential.gaps);
    assert_eq!(first.normalization, sequential.normalization);
    assert_eq!(first.summaries, with_progress.summaries);
}

#[test]
fn test_explicit_end_always_wins() {
    let medians: DrugMedianTable = vec![(1000, 90.0)].into_iter().collect();
    for record in generate_records(5, 200) {
        let Some(end) = record.explicit_end_date else {
            continue;
        };
        let record = record.with_days_supply(365).with_refills(12);
        let interval = normalize_fill(&record, &medians).unwrap();
        assert_eq!(interval.source_method(), SourceMethod::ExplicitEnd);
        assert_eq!(interval.end_date, end);
    }
}

#[test]
fn test_worked_examples() {
    let config = all_groups();

    let adjacent = analyze(
        &[
            fill(1, 1, date(2020, 1, 1), date(2020, 1, 10)),
            fill(1, 1, date(2020, 1, 11), date(2020, 1, 20)),
        ],
        &config,
    );
    assert_eq!(adjacent.summaries[0].total_days_covered, 20);
    assert_eq!(adjacent.summaries[0].num_gaps, 0);

    let gapped = analyze(
        &[
            fill(1, 1, date(2020, 1, 1), date(2020, 1, 10)),
            fill(1, 1, date(2020, 1, 15), date(2020, 1, 20)),
        ],
        &config,
    );
    assert_eq!(gapped.gaps.len(), 1);
    assert_eq!(gapped.gaps[0].gap_start, date(2020, 1, 11));
    assert_eq!(gapped.gaps[0].gap_end, date(2020, 1, 14));
    assert_eq!(gapped.gaps[0].severity, GapSeverity::Minimal);

    let overlapping = analyze(
        &[
            fill(1, 1, date(2020, 1, 1), date(2020, 1, 30)),
            fill(1, 1, date(2020, 1, 20), date(2020, 2, 10)),
        ],
        &config,
    );
    let summary = &overlapping.summaries[0];
    assert_eq!(summary.first_exposure_date, date(2020, 1, 1));
    assert_eq!(summary.last_exposure_date, date(2020, 2, 10));
    assert_eq!(summary.total_days_covered, 41);
    assert_eq!(summary.total_fills, 2);

    let single = analyze(&[supply(1, 1, date(2020, 1, 1), 45)], &AnalysisConfig::default());
    assert_eq!(single.summaries.len(), 1);
    assert!((single.summaries[0].pdc - 1.0).abs() < f64::EPSILON);
    assert_eq!(single.summaries[0].adherence_status, AdherenceStatus::Adherent);
}

#[test]
fn test_min_treatment_days_boundary() {
    let config = AnalysisConfig::default().with_min_treatment_days(30);
    assert_eq!(analyze(&[supply(1, 1, date(2020, 1, 1), 30)], &config).summaries.len(), 1);
    assert!(analyze(&[supply(1, 1, date(2020, 1, 1), 29)], &config).summaries.is_empty());
}
