//! Drug fill record model
//!
//! A fill record is one dispensing event from the OMOP `DRUG_EXPOSURE`
//! table. Records are read-only inputs to the analysis.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw drug dispensing event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP drug concept identifier
    pub drug_id: i64,
    /// Source row identifier
    pub drug_exposure_id: Option<i64>,
    /// Date the fill started; records without one cannot be normalized
    pub start_date: Option<NaiveDate>,
    /// Recorded end of the exposure
    pub explicit_end_date: Option<NaiveDate>,
    /// Days of supply dispensed
    pub days_supply: Option<i32>,
    /// Number of refills
    pub refills: Option<i32>,
    /// Quantity dispensed
    pub quantity: Option<f64>,
    /// OMOP drug type concept (how the record was captured)
    pub drug_type_concept_id: Option<i64>,
}

impl FillRecord {
    /// Create a fill record with only identifiers and a start date
    #[must_use]
    pub const fn new(person_id: i64, drug_id: i64, start_date: NaiveDate) -> Self {
        Self {
            person_id,
            drug_id,
            drug_exposure_id: None,
            start_date: Some(start_date),
            explicit_end_date: None,
            days_supply: None,
            refills: None,
            quantity: None,
            drug_type_concept_id: None,
        }
    }

    /// Set the recorded end date
    #[must_use]
    pub const fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.explicit_end_date = Some(end_date);
        self
    }

    /// Set the days of supply
    #[must_use]
    pub const fn with_days_supply(mut self, days_supply: i32) -> Self {
        self.days_supply = Some(days_supply);
        self
    }

    /// Set the number of refills
    #[must_use]
    pub const fn with_refills(mut self, refills: i32) -> Self {
        self.refills = Some(refills);
        self
    }

    /// Set the source row identifier
    #[must_use]
    pub const fn with_exposure_id(mut self, drug_exposure_id: i64) -> Self {
        self.drug_exposure_id = Some(drug_exposure_id);
        self
    }

    /// Set the drug type concept
    #[must_use]
    pub const fn with_drug_type(mut self, drug_type_concept_id: i64) -> Self {
        self.drug_type_concept_id = Some(drug_type_concept_id);
        self
    }

    /// Days of supply if present and positive
    #[must_use]
    pub fn positive_days_supply(&self) -> Option<i32> {
        self.days_supply.filter(|&days| days > 0)
    }

    /// Refills if present and positive
    #[must_use]
    pub fn positive_refills(&self) -> Option<i32> {
        self.refills.filter(|&refills| refills > 0)
    }

    /// Grouping key of the record
    #[must_use]
    pub const fn group_key(&self) -> GroupKey {
        GroupKey {
            person_id: self.person_id,
            drug_id: self.drug_id,
        }
    }
}

/// A (person, drug) pair; the unit of aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP drug concept identifier
    pub drug_id: i64,
}
