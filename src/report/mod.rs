//! Output tables and reporting
//!
//! Summary, per-drug and gap rows are flattened into Arrow record batches with
//! `serde_arrow` so they can be written as Parquet. Dates are written as ISO
//! `YYYY-MM-DD` strings and enums by their display labels.

pub mod dataset;
pub mod statistics;

use std::path::Path;

use arrow::record_batch::RecordBatch;
use arrow_schema::FieldRef;
use serde::{Deserialize, Serialize};
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::algorithm::adherence::AdherenceReport;
use crate::error::Result;
use crate::models::{AdherenceSummary, GapRecord};
use crate::utils::io::write_parquet;

pub use dataset::DatasetInfo;
pub use statistics::{AdherenceStatistics, DrugStatistics};

/// Date format of output tables
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Flat summary row of the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub person_id: i64,
    pub drug_concept_id: i64,
    pub drug_name: String,
    pub age: Option<i32>,
    pub primary_condition: String,
    pub comorbidity_count: u32,
    pub pdc: f64,
    pub adherence_status: String,
    pub total_days_covered: i64,
    pub treatment_duration: i64,
    pub total_fills: u64,
    pub num_gaps: u64,
    pub total_gap_days: i64,
    pub max_gap_days: i64,
    pub first_exposure_date: String,
    pub last_exposure_date: String,
}

impl From<&AdherenceSummary> for SummaryRow {
    fn from(summary: &AdherenceSummary) -> Self {
        Self {
            person_id: summary.person_id,
            drug_concept_id: summary.drug_id,
            drug_name: summary.drug_name.clone(),
            age: summary.age,
            primary_condition: summary.primary_condition.clone(),
            comorbidity_count: summary.comorbidity_count,
            pdc: summary.pdc,
            adherence_status: summary.adherence_status.to_string(),
            total_days_covered: summary.total_days_covered,
            treatment_duration: summary.treatment_duration,
            total_fills: summary.total_fills as u64,
            num_gaps: summary.num_gaps as u64,
            total_gap_days: summary.total_gap_days,
            max_gap_days: summary.max_gap_days,
            first_exposure_date: summary.first_exposure_date.format(DATE_FORMAT).to_string(),
            last_exposure_date: summary.last_exposure_date.format(DATE_FORMAT).to_string(),
        }
    }
}

/// Flat gap row of the output table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRow {
    pub person_id: i64,
    pub drug_concept_id: i64,
    pub drug_name: String,
    pub gap_sequence: u64,
    pub drug_exposure_id: Option<i64>,
    pub before_start: String,
    pub before_end: String,
    pub gap_start: String,
    pub gap_end: String,
    pub next_start: String,
    pub gap_days: i64,
    pub gap_severity: String,
    pub days_supply_before_gap: Option<i32>,
}

impl From<&GapRecord> for GapRow {
    fn from(gap: &GapRecord) -> Self {
        Self {
            person_id: gap.person_id,
            drug_concept_id: gap.drug_id,
            drug_name: gap.drug_name.clone(),
            gap_sequence: gap.sequence as u64,
            drug_exposure_id: gap.drug_exposure_id,
            before_start: gap.before_start.format(DATE_FORMAT).to_string(),
            before_end: gap.before_end.format(DATE_FORMAT).to_string(),
            gap_start: gap.gap_start.format(DATE_FORMAT).to_string(),
            gap_end: gap.gap_end.format(DATE_FORMAT).to_string(),
            next_start: gap.next_start.format(DATE_FORMAT).to_string(),
            gap_days: gap.gap_days,
            gap_severity: gap.severity.to_string(),
            days_supply_before_gap: gap.days_supply_before_gap,
        }
    }
}

/// Flat per-drug row of the drug summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugSummaryRow {
    pub drug_concept_id: i64,
    pub drug_name: String,
    pub unique_patients: u64,
    pub mean_pdc: f64,
    pub median_pdc: f64,
    pub std_pdc: f64,
    pub pct_adherent: f64,
    pub avg_gaps: f64,
    pub avg_gap_days: f64,
    pub max_gap: i64,
}

impl From<&DrugStatistics> for DrugSummaryRow {
    fn from(drug: &DrugStatistics) -> Self {
        Self {
            drug_concept_id: drug.drug_id,
            drug_name: drug.drug_name.clone(),
            unique_patients: drug.unique_patients as u64,
            mean_pdc: drug.pdc.mean,
            median_pdc: drug.pdc.median,
            std_pdc: drug.pdc.std_dev,
            pct_adherent: drug.adherent_percentage,
            avg_gaps: drug.mean_gaps,
            avg_gap_days: drug.mean_gap_days,
            max_gap: drug.max_gap_days,
        }
    }
}

/// Serialize rows with a schema traced from the row type
///
/// Tracing from the type rather than from samples keeps the schema stable
/// for empty tables.
fn rows_to_record_batch<'de, T>(rows: &[T]) -> Result<RecordBatch>
where
    T: Serialize + Deserialize<'de>,
{
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .map_err(|e| anyhow::anyhow!("Schema generation error: {}", e))?;

    serde_arrow::to_record_batch(&fields, &rows).map_err(|e| anyhow::anyhow!("Serialization error: {}", e))
}

/// Summary rows as a record batch
pub fn summaries_to_record_batch(summaries: &[AdherenceSummary]) -> Result<RecordBatch> {
    let rows: Vec<SummaryRow> = summaries.iter().map(SummaryRow::from).collect();
    rows_to_record_batch(&rows)
}

/// Gap rows as a record batch
pub fn gaps_to_record_batch(gaps: &[GapRecord]) -> Result<RecordBatch> {
    let rows: Vec<GapRow> = gaps.iter().map(GapRow::from).collect();
    rows_to_record_batch(&rows)
}

/// Read summary rows back from a record batch
pub fn summary_rows_from_record_batch(batch: &RecordBatch) -> Result<Vec<SummaryRow>> {
    serde_arrow::from_record_batch(batch).map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))
}

/// Read gap rows back from a record batch
pub fn gap_rows_from_record_batch(batch: &RecordBatch) -> Result<Vec<GapRow>> {
    serde_arrow::from_record_batch(batch).map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))
}

/// Drug summary rows, most patients first
#[must_use]
pub fn drug_summary_rows(drugs: &[DrugStatistics]) -> Vec<DrugSummaryRow> {
    let mut rows: Vec<DrugSummaryRow> = drugs.iter().map(DrugSummaryRow::from).collect();
    rows.sort_by(|a, b| {
        b.unique_patients
            .cmp(&a.unique_patients)
            .then(a.drug_concept_id.cmp(&b.drug_concept_id))
    });
    rows
}

/// Convert per-drug statistics to a drug summary record batch
pub fn drug_summaries_to_record_batch(drugs: &[DrugStatistics]) -> Result<RecordBatch> {
    rows_to_record_batch(&drug_summary_rows(drugs))
}

/// Read drug summary rows back from a record batch
pub fn drug_summary_rows_from_record_batch(batch: &RecordBatch) -> Result<Vec<DrugSummaryRow>> {
    serde_arrow::from_record_batch(batch).map_err(|e| anyhow::anyhow!("Deserialization error: {}", e))
}

/// Write the tables of a report into a directory
///
/// Files are named `adherence_summary.parquet`,
/// `adherence_drug_summary.parquet` and `adherence_gaps.parquet`.
pub fn write_report(report: &AdherenceReport, output_dir: &Path) -> Result<()> {
    write_parquet(
        &output_dir.join("adherence_summary.parquet"),
        &summaries_to_record_batch(&report.summaries)?,
    )?;
    let statistics = AdherenceStatistics::from_report(report);
    write_parquet(
        &output_dir.join("adherence_drug_summary.parquet"),
        &drug_summaries_to_record_batch(&statistics.by_drug)?,
    )?;
    write_parquet(
        &output_dir.join("adherence_gaps.parquet"),
        &gaps_to_record_batch(&report.gaps)?,
    )?;
    Ok(())
}
