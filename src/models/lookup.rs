//! Decoration lookups
//!
//! Drug names and person demographics decorate output rows. They are
//! optional and never change coverage results.

use chrono::{Datelike, NaiveDate};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::summary::{NO_CONDITION_RECORDED, UNKNOWN_DRUG_NAME};

/// Drug concept id to display name
#[derive(Debug, Clone, Default)]
pub struct DrugConcepts {
    names: FxHashMap<i64, String>,
}

impl DrugConcepts {
    /// Create an empty lookup
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a drug name
    pub fn insert(&mut self, drug_id: i64, name: impl Into<String>) {
        self.names.insert(drug_id, name.into());
    }

    /// Name of a drug, if known
    #[must_use]
    pub fn get(&self, drug_id: i64) -> Option<&str> {
        self.names.get(&drug_id).map(String::as_str)
    }

    /// Name of a drug, or the unknown-drug label
    #[must_use]
    pub fn display_name(&self, drug_id: i64) -> String {
        self.get(drug_id).unwrap_or(UNKNOWN_DRUG_NAME).to_string()
    }

    /// Number of named drugs
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no drug has a name
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(i64, String)> for DrugConcepts {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// One recorded condition of a person
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionOccurrence {
    /// OMOP person identifier
    pub person_id: i64,
    /// OMOP condition concept identifier
    pub condition_id: i64,
    /// Condition display name
    pub condition_name: Option<String>,
    /// Date the condition was recorded
    pub start_date: Option<NaiveDate>,
}

/// Demographic decoration for one person
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonDemographics {
    /// Year of birth
    pub year_of_birth: Option<i32>,
    /// Most frequently recorded condition
    pub primary_condition: Option<String>,
    /// Number of distinct recorded conditions
    pub comorbidity_count: u32,
}

impl PersonDemographics {
    /// Age in whole years at the reference year
    #[must_use]
    pub fn age_in(&self, reference_year: i32) -> Option<i32> {
        self.year_of_birth.map(|year| reference_year - year)
    }

    /// Age at a reference date, by calendar year
    #[must_use]
    pub fn age_at(&self, date: &NaiveDate) -> Option<i32> {
        self.age_in(date.year())
    }
}

/// Person id to demographics
#[derive(Debug, Clone, Default)]
pub struct Demographics {
    persons: FxHashMap<i64, PersonDemographics>,
}

impl Demographics {
    /// Create an empty lookup
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a person's demographics
    pub fn insert(&mut self, person_id: i64, demographics: PersonDemographics) {
        self.persons.insert(person_id, demographics);
    }

    /// Record a year of birth, keeping other fields
    pub fn set_year_of_birth(&mut self, person_id: i64, year_of_birth: i32) {
        self.persons.entry(person_id).or_default().year_of_birth = Some(year_of_birth);
    }

    /// Demographics of a person, if known
    #[must_use]
    pub fn get(&self, person_id: i64) -> Option<&PersonDemographics> {
        self.persons.get(&person_id)
    }

    /// Mutable demographics of a person, inserting defaults if absent
    pub fn entry(&mut self, person_id: i64) -> &mut PersonDemographics {
        self.persons.entry(person_id).or_default()
    }

    /// Primary condition label of a person
    #[must_use]
    pub fn primary_condition(&self, person_id: i64) -> String {
        self.get(person_id)
            .and_then(|p| p.primary_condition.clone())
            .unwrap_or_else(|| NO_CONDITION_RECORDED.to_string())
    }

    /// Number of persons in the lookup
    #[must_use]
    pub fn len(&self) -> usize {
        self.persons.len()
    }

    /// Whether the lookup is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }
}
