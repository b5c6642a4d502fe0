//! OMOP table exports stored as Parquet
//!
//! Each table is a single `.parquet` file or a directory of them. Only
//! `DRUG_EXPOSURE` is required; the concept, person and condition tables
//! feed the optional decoration lookups. The `DRUG_EXPOSURE` batches are read
//! on first use and kept for the lifetime of the source.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use arrow::compute::{max, min};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use log::info;
use rayon::prelude::*;
use rustc_hash::FxHashMap;

use super::FillSource;
use super::omop::{
    concept, concept_names_from_batch, condition_occurrence, condition_occurrences_from_batch, drug_exposure,
    fill_records_from_batch, person, years_of_birth_from_batch,
};
use crate::algorithm::adherence::{DrugMedianTable, apply_condition_history};
use crate::config::{DISPENSING_DRUG_TYPE_CONCEPTS, FillQuery};
use crate::error::Result;
use crate::filter::{AndFilter, BatchFilter, ConceptFilter, DateRangeFilter, apply_filter};
use crate::models::{Demographics, DrugConcepts, FillRecord};
use crate::utils::arrow::{date_column, date32_to_naive};
use crate::utils::io::load_parquet_path;

/// Build the batch filter for a fill query
///
/// The date range keeps rows without a start date.
#[must_use]
pub fn query_filter(query: &FillQuery) -> AndFilter {
    let mut filter = AndFilter::default();
    if query.start_date.is_some() || query.end_date.is_some() {
        filter.push(Arc::new(
            DateRangeFilter::new(drug_exposure::START_DATE, query.start_date, query.end_date).keeping_nulls(),
        ));
    }
    if query.filter_drug_type {
        filter.push(Arc::new(ConceptFilter::new(
            drug_exposure::DRUG_TYPE_CONCEPT_ID,
            DISPENSING_DRUG_TYPE_CONCEPTS,
        )));
    }
    filter
}

/// Convert `DRUG_EXPOSURE` batches to fill records, in batch order
pub fn fill_records_from_batches(batches: &[RecordBatch]) -> Result<Vec<FillRecord>> {
    let per_batch: Vec<Vec<FillRecord>> = batches
        .par_iter()
        .map(fill_records_from_batch)
        .collect::<Result<_>>()?;
    Ok(per_batch.into_iter().flatten().collect())
}

/// Apply a fill query to `DRUG_EXPOSURE` batches and convert the result
pub fn select_fill_batches(batches: &[RecordBatch], query: &FillQuery) -> Result<Vec<FillRecord>> {
    let filter = query_filter(query);
    let mut records = if filter.is_empty() {
        fill_records_from_batches(batches)?
    } else {
        fill_records_from_batches(&apply_filter(batches, &filter)?)?
    };
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }
    Ok(records)
}

/// A data source over OMOP Parquet exports
#[derive(Debug, Clone)]
pub struct ParquetSource {
    drug_exposure: PathBuf,
    concept: Option<PathBuf>,
    person: Option<PathBuf>,
    condition_occurrence: Option<PathBuf>,
    drug_exposure_cache: OnceLock<Vec<RecordBatch>>,
}

impl ParquetSource {
    /// Create a source over a `DRUG_EXPOSURE` export
    #[must_use]
    pub fn new(drug_exposure: impl Into<PathBuf>) -> Self {
        Self {
            drug_exposure: drug_exposure.into(),
            concept: None,
            person: None,
            condition_occurrence: None,
            drug_exposure_cache: OnceLock::new(),
        }
    }

    /// Locate the tables of an export directory by their conventional names
    ///
    /// `drug_exposure` is required; `concept`, `person` and
    /// `condition_occurrence` are used when present, either as a directory or
    /// as a `.parquet` file.
    #[must_use]
    pub fn from_directory(dir: &Path) -> Self {
        let table = |name: &str| {
            let as_dir = dir.join(name);
            let as_file = dir.join(format!("{name}.parquet"));
            if as_dir.is_dir() {
                Some(as_dir)
            } else if as_file.is_file() {
                Some(as_file)
            } else {
                None
            }
        };

        Self {
            drug_exposure: table("drug_exposure").unwrap_or_else(|| dir.join("drug_exposure.parquet")),
            concept: table("concept"),
            person: table("person"),
            condition_occurrence: table("condition_occurrence"),
            drug_exposure_cache: OnceLock::new(),
        }
    }

    /// Set the `CONCEPT` export used for drug and condition names
    #[must_use]
    pub fn with_concept(mut self, path: impl Into<PathBuf>) -> Self {
        self.concept = Some(path.into());
        self
    }

    /// Set the `PERSON` export used for age
    #[must_use]
    pub fn with_person(mut self, path: impl Into<PathBuf>) -> Self {
        self.person = Some(path.into());
        self
    }

    /// Set the `CONDITION_OCCURRENCE` export used for condition history
    #[must_use]
    pub fn with_condition_occurrence(mut self, path: impl Into<PathBuf>) -> Self {
        self.condition_occurrence = Some(path.into());
        self
    }

    /// Path of the `DRUG_EXPOSURE` export
    #[must_use]
    pub fn drug_exposure_path(&self) -> &Path {
        &self.drug_exposure
    }

    /// The `DRUG_EXPOSURE` batches, loaded once
    fn drug_exposure_batches(&self) -> Result<&[RecordBatch]> {
        if let Some(batches) = self.drug_exposure_cache.get() {
            return Ok(batches);
        }
        let batches = load_parquet_path(&self.drug_exposure, Some(drug_exposure::COLUMNS.as_slice()))?;
        Ok(self.drug_exposure_cache.get_or_init(|| batches))
    }

    /// All fill records of the export, unfiltered
    pub fn all_fills(&self) -> Result<Vec<FillRecord>> {
        fill_records_from_batches(self.drug_exposure_batches()?)
    }

    /// Earliest and latest fill start date of the export
    ///
    /// Returns `None` when no row has a start date.
    pub fn actual_date_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let mut range: Option<(i32, i32)> = None;

        for batch in self.drug_exposure_batches()? {
            let Some(dates) = date_column(batch, drug_exposure::START_DATE, true)? else {
                continue;
            };
            if let (Some(lo), Some(hi)) = (min(&dates), max(&dates)) {
                range = Some(match range {
                    Some((cur_lo, cur_hi)) => (cur_lo.min(lo), cur_hi.max(hi)),
                    None => (lo, hi),
                });
            }
        }

        Ok(range.and_then(|(lo, hi)| Some((date32_to_naive(lo)?, date32_to_naive(hi)?))))
    }

    /// Concept names of a domain, empty without a `CONCEPT` export
    fn concept_names(&self, domain: &str) -> Result<Vec<(i64, String)>> {
        let Some(path) = &self.concept else {
            return Ok(Vec::new());
        };
        let batches = load_parquet_path(path, Some(concept::COLUMNS.as_slice()))?;
        let mut names = Vec::new();
        for batch in &batches {
            names.extend(concept_names_from_batch(batch, Some(domain))?);
        }
        Ok(names)
    }
}

impl FillSource for ParquetSource {
    fn fetch_fills(&self, query: &FillQuery) -> Result<Vec<FillRecord>> {
        let records = select_fill_batches(self.drug_exposure_batches()?, query)?;
        info!(
            "Selected {} fill records from {}",
            records.len(),
            self.drug_exposure.display()
        );
        Ok(records)
    }

    fn drug_medians(&self) -> Result<DrugMedianTable> {
        Ok(DrugMedianTable::from_records(&self.all_fills()?))
    }

    fn drug_names(&self) -> Result<DrugConcepts> {
        let names: DrugConcepts = self.concept_names(concept::DRUG_DOMAIN)?.into_iter().collect();
        if self.concept.is_some() {
            info!("Loaded {} drug names", names.len());
        }
        Ok(names)
    }

    fn demographics(&self, as_of: NaiveDate) -> Result<Demographics> {
        let mut demographics = Demographics::new();

        if let Some(path) = &self.person {
            for batch in load_parquet_path(path, Some(person::COLUMNS.as_slice()))? {
                for (person_id, year) in years_of_birth_from_batch(&batch)? {
                    demographics.set_year_of_birth(person_id, year);
                }
            }
        }

        if let Some(path) = &self.condition_occurrence {
            let names: FxHashMap<i64, String> = self.concept_names(concept::CONDITION_DOMAIN)?.into_iter().collect();
            let batches = load_parquet_path(path, Some(condition_occurrence::COLUMNS.as_slice()))?;
            let mut occurrences = Vec::new();
            for batch in &batches {
                occurrences.extend(condition_occurrences_from_batch(batch, |id| names.get(&id).cloned())?);
            }
            apply_condition_history(&mut demographics, &occurrences, Some(as_of));
        }

        info!("Loaded demographics for {} persons", demographics.len());
        Ok(demographics)
    }
}
