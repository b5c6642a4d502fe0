//! OMOP CDM table layouts
//!
//! Column names of the tables the analysis reads and the conversion of their
//! record batches into domain records.

use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use log::warn;

use crate::error::Result;
use crate::filter::{BatchFilter, StringEqualsFilter};
use crate::models::{ConditionOccurrence, FillRecord};
use crate::utils::arrow::{date32_to_naive, date_column, float64_column, int32_column, int64_column, string_column};

/// `DRUG_EXPOSURE` columns
pub mod drug_exposure {
    /// Source row identifier
    pub const DRUG_EXPOSURE_ID: &str = "drug_exposure_id";
    /// Person identifier
    pub const PERSON_ID: &str = "person_id";
    /// Drug concept identifier
    pub const DRUG_CONCEPT_ID: &str = "drug_concept_id";
    /// Exposure start date
    pub const START_DATE: &str = "drug_exposure_start_date";
    /// Exposure end date
    pub const END_DATE: &str = "drug_exposure_end_date";
    /// Days of supply
    pub const DAYS_SUPPLY: &str = "days_supply";
    /// Number of refills
    pub const REFILLS: &str = "refills";
    /// Quantity dispensed
    pub const QUANTITY: &str = "quantity";
    /// Drug type concept
    pub const DRUG_TYPE_CONCEPT_ID: &str = "drug_type_concept_id";

    /// Columns read from the table
    pub const COLUMNS: [&str; 9] = [
        DRUG_EXPOSURE_ID,
        PERSON_ID,
        DRUG_CONCEPT_ID,
        START_DATE,
        END_DATE,
        DAYS_SUPPLY,
        REFILLS,
        QUANTITY,
        DRUG_TYPE_CONCEPT_ID,
    ];
}

/// `CONCEPT` columns
pub mod concept {
    /// Concept identifier
    pub const CONCEPT_ID: &str = "concept_id";
    /// Concept display name
    pub const CONCEPT_NAME: &str = "concept_name";
    /// Vocabulary domain
    pub const DOMAIN_ID: &str = "domain_id";

    /// Domain of drug concepts
    pub const DRUG_DOMAIN: &str = "Drug";
    /// Domain of condition concepts
    pub const CONDITION_DOMAIN: &str = "Condition";

    /// Columns read from the table
    pub const COLUMNS: [&str; 3] = [CONCEPT_ID, CONCEPT_NAME, DOMAIN_ID];
}

/// `PERSON` columns
pub mod person {
    /// Person identifier
    pub const PERSON_ID: &str = "person_id";
    /// Year of birth
    pub const YEAR_OF_BIRTH: &str = "year_of_birth";

    /// Columns read from the table
    pub const COLUMNS: [&str; 2] = [PERSON_ID, YEAR_OF_BIRTH];
}

/// `CONDITION_OCCURRENCE` columns
pub mod condition_occurrence {
    /// Person identifier
    pub const PERSON_ID: &str = "person_id";
    /// Condition concept identifier
    pub const CONDITION_CONCEPT_ID: &str = "condition_concept_id";
    /// Date the condition was recorded
    pub const START_DATE: &str = "condition_start_date";

    /// Columns read from the table
    pub const COLUMNS: [&str; 3] = [PERSON_ID, CONDITION_CONCEPT_ID, START_DATE];
}

/// Convert a `DRUG_EXPOSURE` batch to fill records
///
/// Rows without a person or drug concept cannot be grouped; they are rejected
/// and their count logged as a warning.
/// Missing optional columns read as null.
pub fn fill_records_from_batch(batch: &RecordBatch) -> Result<Vec<FillRecord>> {
    use drug_exposure as col;

    let person_ids = int64_column(batch, col::PERSON_ID, true)?;
    let drug_ids = int64_column(batch, col::DRUG_CONCEPT_ID, true)?;
    let start_dates = date_column(batch, col::START_DATE, true)?;
    let exposure_ids = int64_column(batch, col::DRUG_EXPOSURE_ID, false)?;
    let end_dates = date_column(batch, col::END_DATE, false)?;
    let days_supply = int32_column(batch, col::DAYS_SUPPLY, false)?;
    let refills = int32_column(batch, col::REFILLS, false)?;
    let quantity = float64_column(batch, col::QUANTITY, false)?;
    let drug_types = int64_column(batch, col::DRUG_TYPE_CONCEPT_ID, false)?;

    let (Some(person_ids), Some(drug_ids), Some(start_dates)) = (person_ids, drug_ids, start_dates) else {
        return Ok(Vec::new());
    };

    let mut records = Vec::with_capacity(batch.num_rows());
    let mut skipped = 0usize;

    for row in 0..batch.num_rows() {
        if person_ids.is_null(row) || drug_ids.is_null(row) {
            skipped += 1;
            continue;
        }

        records.push(FillRecord {
            person_id: person_ids.value(row),
            drug_id: drug_ids.value(row),
            drug_exposure_id: exposure_ids.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row))),
            start_date: start_dates
                .is_valid(row)
                .then(|| date32_to_naive(start_dates.value(row)))
                .flatten(),
            explicit_end_date: end_dates
                .as_ref()
                .and_then(|a| a.is_valid(row).then(|| date32_to_naive(a.value(row))).flatten()),
            days_supply: days_supply.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row))),
            refills: refills.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row))),
            quantity: quantity.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row))),
            drug_type_concept_id: drug_types.as_ref().and_then(|a| a.is_valid(row).then(|| a.value(row))),
        });
    }

    if skipped > 0 {
        warn!("Rejected {skipped} drug exposure rows without person or drug concept");
    }

    Ok(records)
}

/// Named concepts of a `CONCEPT` batch, optionally restricted to a domain
///
/// Concepts with an empty or null name are left out. Without a `domain_id`
/// column the domain restriction is skipped.
pub fn concept_names_from_batch(batch: &RecordBatch, domain: Option<&str>) -> Result<Vec<(i64, String)>> {
    let in_domain;
    let batch = match domain {
        Some(domain) if batch.schema().index_of(concept::DOMAIN_ID).is_ok() => {
            in_domain = StringEqualsFilter::new(concept::DOMAIN_ID, domain).filter(batch)?;
            &in_domain
        }
        _ => batch,
    };

    let ids = int64_column(batch, concept::CONCEPT_ID, true)?;
    let names = string_column(batch, concept::CONCEPT_NAME, true)?;
    let (Some(ids), Some(names)) = (ids, names) else {
        return Ok(Vec::new());
    };

    Ok((0..batch.num_rows())
        .filter(|&row| ids.is_valid(row) && names.is_valid(row) && !names.value(row).is_empty())
        .map(|row| (ids.value(row), names.value(row).to_string()))
        .collect())
}

/// Years of birth from a `PERSON` batch
pub fn years_of_birth_from_batch(batch: &RecordBatch) -> Result<Vec<(i64, i32)>> {
    let ids = int64_column(batch, person::PERSON_ID, true)?;
    let years = int32_column(batch, person::YEAR_OF_BIRTH, true)?;

    let (Some(ids), Some(years)) = (ids, years) else {
        return Ok(Vec::new());
    };

    Ok((0..batch.num_rows())
        .filter(|&row| ids.is_valid(row) && years.is_valid(row))
        .map(|row| (ids.value(row), years.value(row)))
        .collect())
}

/// Condition occurrences from a `CONDITION_OCCURRENCE` batch
///
/// `name_of` resolves condition concept ids to display names.
pub fn condition_occurrences_from_batch<F>(batch: &RecordBatch, name_of: F) -> Result<Vec<ConditionOccurrence>>
where
    F: Fn(i64) -> Option<String>,
{
    use condition_occurrence as col;

    let person_ids = int64_column(batch, col::PERSON_ID, true)?;
    let condition_ids = int64_column(batch, col::CONDITION_CONCEPT_ID, true)?;
    let start_dates = date_column(batch, col::START_DATE, false)?;

    let (Some(person_ids), Some(condition_ids)) = (person_ids, condition_ids) else {
        return Ok(Vec::new());
    };

    Ok((0..batch.num_rows())
        .filter(|&row| person_ids.is_valid(row) && condition_ids.is_valid(row))
        .map(|row| {
            let condition_id = condition_ids.value(row);
            ConditionOccurrence {
                person_id: person_ids.value(row),
                condition_id,
                condition_name: name_of(condition_id),
                start_date: start_dates
                    .as_ref()
                    .and_then(|a| a.is_valid(row).then(|| date32_to_naive(a.value(row))).flatten()),
            }
        })
        .collect())
}
