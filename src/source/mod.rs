//! Data access for fill records and decoration lookups
//!
//! The analysis reads through the [`FillSource`] trait so the same pipeline
//! runs against Parquet exports of an OMOP database or against records held
//! in memory.

pub mod omop;
pub mod parquet;

use chrono::NaiveDate;

use crate::algorithm::adherence::{DrugMedianTable, apply_condition_history};
use crate::config::FillQuery;
use crate::error::Result;
use crate::models::{ConditionOccurrence, Demographics, DrugConcepts, FillRecord};

pub use self::parquet::ParquetSource;

/// A source of fill records and decoration lookups
pub trait FillSource {
    /// Fill records selected by the query, in source order
    fn fetch_fills(&self, query: &FillQuery) -> Result<Vec<FillRecord>>;

    /// Median days supply per drug over the whole, unfiltered dataset
    fn drug_medians(&self) -> Result<DrugMedianTable>;

    /// Drug display names
    fn drug_names(&self) -> Result<DrugConcepts> {
        Ok(DrugConcepts::new())
    }

    /// Demographics with condition history recorded up to `as_of`
    fn demographics(&self, _as_of: NaiveDate) -> Result<Demographics> {
        Ok(Demographics::new())
    }
}

/// Apply a query to records held in memory
///
/// Records without a start date pass the date range so they can be counted
/// as rejected during normalization.
#[must_use]
pub fn select_fills(records: &[FillRecord], query: &FillQuery) -> Vec<FillRecord> {
    let selected = records
        .iter()
        .filter(|r| r.start_date.is_none_or(|date| query.is_date_in_range(&date)))
        .filter(|r| query.accepts_drug_type(r.drug_type_concept_id))
        .cloned();

    match query.limit {
        Some(limit) => selected.take(limit).collect(),
        None => selected.collect(),
    }
}

/// A source backed by vectors of records
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<FillRecord>,
    drug_names: DrugConcepts,
    years_of_birth: Vec<(i64, i32)>,
    conditions: Vec<ConditionOccurrence>,
}

impl InMemorySource {
    /// Create a source over fill records
    #[must_use]
    pub fn new(records: Vec<FillRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Set the drug names
    #[must_use]
    pub fn with_drug_names(mut self, drug_names: DrugConcepts) -> Self {
        self.drug_names = drug_names;
        self
    }

    /// Set years of birth per person
    #[must_use]
    pub fn with_years_of_birth(mut self, years_of_birth: Vec<(i64, i32)>) -> Self {
        self.years_of_birth = years_of_birth;
        self
    }

    /// Set condition occurrences
    #[must_use]
    pub fn with_conditions(mut self, conditions: Vec<ConditionOccurrence>) -> Self {
        self.conditions = conditions;
        self
    }

    /// All records of the source
    #[must_use]
    pub fn records(&self) -> &[FillRecord] {
        &self.records
    }
}

impl FillSource for InMemorySource {
    fn fetch_fills(&self, query: &FillQuery) -> Result<Vec<FillRecord>> {
        Ok(select_fills(&self.records, query))
    }

    fn drug_medians(&self) -> Result<DrugMedianTable> {
        Ok(DrugMedianTable::from_records(&self.records))
    }

    fn drug_names(&self) -> Result<DrugConcepts> {
        Ok(self.drug_names.clone())
    }

    fn demographics(&self, as_of: NaiveDate) -> Result<Demographics> {
        let mut demographics = Demographics::new();
        for &(person_id, year) in &self.years_of_birth {
            demographics.set_year_of_birth(person_id, year);
        }
        apply_condition_history(&mut demographics, &self.conditions, Some(as_of));
        Ok(demographics)
    }
}
