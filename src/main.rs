use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use log::{info, warn};
use omop_adherence::report::write_report;
use omop_adherence::utils::logging::{create_spinner, finish_progress_bar};
use omop_adherence::{
    AdherenceStatistics, AnalysisConfig, DatasetInfo, FillQuery, ParquetSource, Result, run_analysis,
};

#[global_allocator]
static ALLOC: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

const USAGE: &str = "Usage: adherence-run <drug_exposure path | export directory> [output dir]";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let output_dir = args.next().map_or_else(|| PathBuf::from("output"), PathBuf::from);

    let mut config = match std::env::var_os("ADHERENCE_CONFIG") {
        Some(path) => AnalysisConfig::from_json_file(Path::new(&path))?,
        None => AnalysisConfig::default(),
    };

    let source = open_source(&input);
    apply_date_overrides(&mut config, &source)?;
    if config.age_reference_year.is_none() {
        config.age_reference_year = Some(chrono::Local::now().year());
    }

    info!(
        "Analyzing {} from {} to {}",
        source.drug_exposure_path().display(),
        format_date(config.query.start_date),
        format_date(config.query.end_date)
    );

    let start = Instant::now();
    let spinner = create_spinner(Some("Loading drug exposures"));
    let dataset = DatasetInfo::from_records(&source.all_fills()?);
    finish_progress_bar(&spinner, Some("Drug exposures loaded"));
    info!("Dataset overview:\n{dataset}");

    let report = run_analysis(&source, &config)?;
    if report.is_empty() {
        warn!("No adherence rows produced for the selected date range");
    }

    let statistics = AdherenceStatistics::from_report(&report);
    info!("\n{}", statistics.generate_summary());

    write_report(&report, &output_dir)
        .with_context(|| format!("Failed to write results to {}", output_dir.display()))?;

    info!(
        "Wrote {} summaries and {} gaps to {} in {:?}",
        report.summaries.len(),
        report.gaps.len(),
        output_dir.display(),
        start.elapsed()
    );

    Ok(())
}

/// A directory holding a `drug_exposure` table is treated as a full export
fn open_source(input: &Path) -> ParquetSource {
    let has_tables = input.is_dir()
        && (input.join("drug_exposure").is_dir() || input.join("drug_exposure.parquet").is_file());
    if has_tables {
        ParquetSource::from_directory(input)
    } else {
        ParquetSource::new(input)
    }
}

/// Apply `ADHERENCE_START_DATE` / `ADHERENCE_END_DATE`, falling back to the
/// date range of the data
fn apply_date_overrides(config: &mut AnalysisConfig, source: &ParquetSource) -> Result<()> {
    let start = env_date("ADHERENCE_START_DATE")?.or(config.query.start_date);
    let end = env_date("ADHERENCE_END_DATE")?.or(config.query.end_date);

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => match source.actual_date_range()? {
            Some((data_start, data_end)) => {
                info!("Using date range of the data: {data_start} to {data_end}");
                (start.unwrap_or(data_start), end.unwrap_or(data_end))
            }
            None => return Ok(()),
        },
    };

    config.query = FillQuery {
        start_date: Some(start),
        end_date: Some(end),
        ..config.query.clone()
    };
    config.validate()
}

fn env_date(name: &str) -> Result<Option<NaiveDate>> {
    match std::env::var(name) {
        Ok(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(Some)
            .with_context(|| format!("{name} must be a YYYY-MM-DD date, got {value}")),
        Err(_) => Ok(None),
    }
}

fn format_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "unbounded".to_string(), |d| d.to_string())
}
