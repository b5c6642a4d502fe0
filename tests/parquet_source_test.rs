//! Reading OMOP exports from Parquet files

mod utils;

use std::path::PathBuf;

use omop_adherence::report::{
    drug_summary_rows_from_record_batch, gap_rows_from_record_batch, summary_rows_from_record_batch, write_report,
};
use omop_adherence::utils::io::{read_parquet, write_parquet};
use omop_adherence::{
    AnalysisConfig, FillQuery, FillRecord, FillSource, ParquetSource, Result, load_fills_async, run_analysis,
};

use utils::{concept_batch, condition_batch, date, drug_exposure_batch, fill, person_batch, supply, temp_dir};

fn records() -> Vec<FillRecord> {
    let mut undated = FillRecord::new(2, 1000, date(2020, 1, 1)).with_exposure_id(6);
    undated.start_date = None;
    vec![
        supply(1, 1000, date(2020, 1, 1), 30).with_exposure_id(1).with_drug_type(38_000_175),
        supply(1, 1000, date(2020, 1, 31), 30).with_exposure_id(2).with_drug_type(38_000_175),
        supply(1, 1000, date(2020, 4, 15), 30).with_exposure_id(3).with_drug_type(32_810),
        fill(2, 2000, date(2020, 2, 1), date(2020, 4, 30)).with_exposure_id(4).with_drug_type(581_373),
        supply(2, 2000, date(2019, 6, 1), 90).with_exposure_id(5).with_drug_type(581_373),
        undated,
    ]
}

/// Write a full export and return its directory
fn write_export(name: &str) -> Result<PathBuf> {
    let dir = temp_dir(name);
    write_parquet(&dir.join("drug_exposure.parquet"), &drug_exposure_batch(&records()))?;
    write_parquet(
        &dir.join("concept.parquet"),
        &concept_batch(&[
            (1000, "metformin 500 MG", "Drug"),
            (2000, "lisinopril 10 MG", "Drug"),
            (201_826, "Type 2 diabetes mellitus", "Condition"),
        ]),
    )?;
    write_parquet(&dir.join("person.parquet"), &person_batch(&[(1, 1960), (2, 1948)]))?;
    write_parquet(
        &dir.join("condition_occurrence.parquet"),
        &condition_batch(&[(1, 201_826, date(2019, 3, 1))]),
    )?;
    Ok(dir)
}

#[test]
fn test_fetch_fills_applies_query() -> Result<()> {
    let source = ParquetSource::from_directory(&write_export("fetch")?);

    let all = source.fetch_fills(&FillQuery::new())?;
    assert_eq!(all.len(), 6);
    assert_eq!(all[3].explicit_end_date, Some(date(2020, 4, 30)));

    let query = FillQuery::new().with_date_range(date(2020, 1, 1), date(2020, 12, 31));
    let in_range = source.fetch_fills(&query)?;
    // the 2019 fill is dropped, the undated one is kept for rejection
    assert_eq!(in_range.len(), 5);
    assert!(in_range.iter().any(|r| r.start_date.is_none()));

    let dispensed = source.fetch_fills(&query.clone().with_drug_type_filter(true))?;
    assert_eq!(dispensed.len(), 3);

    assert_eq!(source.fetch_fills(&query.with_limit(2))?.len(), 2);
    Ok(())
}

#[test]
fn test_lookups_and_date_range() -> Result<()> {
    let source = ParquetSource::from_directory(&write_export("lookups")?);

    assert_eq!(source.actual_date_range()?, Some((date(2019, 6, 1), date(2020, 4, 15))));

    let names = source.drug_names()?;
    assert_eq!(names.len(), 2);
    assert_eq!(names.get(1000), Some("metformin 500 MG"));

    let demographics = source.demographics(date(2020, 12, 31))?;
    assert_eq!(demographics.get(2).and_then(|p| p.year_of_birth), Some(1948));
    assert_eq!(demographics.primary_condition(1), "Type 2 diabetes mellitus");

    // medians come from the unfiltered table
    let medians = source.drug_medians()?;
    assert_eq!(medians.supply_days(1000), Some(30));
    assert_eq!(medians.supply_days(2000), Some(90));
    Ok(())
}

#[test]
fn test_run_and_write_report() -> Result<()> {
    let dir = write_export("report")?;
    let source = ParquetSource::from_directory(&dir);
    let config = AnalysisConfig::default()
        .with_query(FillQuery::new().with_date_range(date(2020, 1, 1), date(2020, 12, 31)))
        .with_age_reference_year(2020);

    let report = run_analysis(&source, &config)?;
    assert_eq!(report.summaries.len(), 2);
    assert_eq!(report.summaries[1].age, Some(72));

    let output = dir.join("output");
    write_report(&report, &output)?;

    let summary_batches = read_parquet(&output.join("adherence_summary.parquet"), None)?;
    let rows = summary_rows_from_record_batch(&summary_batches[0])?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].drug_name, "metformin 500 MG");
    assert_eq!(rows[0].primary_condition, "Type 2 diabetes mellitus");
    assert_eq!(rows[0].adherence_status, "Non-Adherent");

    let drug_batches = read_parquet(&output.join("adherence_drug_summary.parquet"), None)?;
    let drugs = drug_summary_rows_from_record_batch(&drug_batches[0])?;
    assert_eq!(drugs.len(), 2);
    assert_eq!(drugs[0].drug_concept_id, 1000);
    assert_eq!(drugs[0].unique_patients, 1);
    assert!((drugs[0].mean_pdc - 0.6667).abs() < 1e-9);
    assert!(drugs[0].pct_adherent.abs() < f64::EPSILON);
    assert_eq!(drugs[0].max_gap, 45);
    assert_eq!(drugs[1].drug_name, "lisinopril 10 MG");

    let gap_batches = read_parquet(&output.join("adherence_gaps.parquet"), None)?;
    let gaps = gap_rows_from_record_batch(&gap_batches[0])?;
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].gap_start, "2020-03-01");
    assert_eq!(gaps[0].gap_days, 45);
    Ok(())
}

#[test]
fn test_drug_exposure_is_read_once() -> Result<()> {
    let dir = write_export("read_once")?;
    let source = ParquetSource::from_directory(&dir);
    let fills = source.fetch_fills(&FillQuery::new())?;

    std::fs::remove_file(dir.join("drug_exposure.parquet"))?;

    assert_eq!(source.all_fills()?, fills);
    assert_eq!(source.actual_date_range()?, Some((date(2019, 6, 1), date(2020, 4, 15))));
    assert_eq!(source.drug_medians()?.supply_days(1000), Some(30));

    // a fresh source has nothing to read
    assert!(ParquetSource::from_directory(&dir).fetch_fills(&FillQuery::new()).is_err());
    Ok(())
}

#[test]
fn test_directory_of_files() -> Result<()> {
    let dir = temp_dir("partitioned");
    let table = dir.join("drug_exposure");
    let all = records();
    write_parquet(&table.join("part-0.parquet"), &drug_exposure_batch(&all[..3]))?;
    write_parquet(&table.join("part-1.parquet"), &drug_exposure_batch(&all[3..]))?;

    let source = ParquetSource::from_directory(&dir);
    let fills = source.fetch_fills(&FillQuery::new())?;
    assert_eq!(fills.len(), 6);
    assert_eq!(fills[0].drug_exposure_id, Some(1));
    assert_eq!(fills[5].drug_exposure_id, Some(6));
    assert!(source.drug_names()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_load_fills_async() -> Result<()> {
    let dir = temp_dir("async");
    let all = records();
    let site_a = dir.join("site_a.parquet");
    let site_b = dir.join("site_b.parquet");
    write_parquet(&site_a, &drug_exposure_batch(&all[..2]))?;
    write_parquet(&site_b, &drug_exposure_batch(&all[2..]))?;

    let query = FillQuery::new().with_drug_type_filter(true);
    let fills = load_fills_async(&[site_a, site_b], &query).await?;
    assert_eq!(fills.len(), 4);
    assert!(fills.iter().all(|r| r.drug_type_concept_id != Some(32_810)));
    Ok(())
}
