//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{Date32Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use omop_adherence::FillRecord;
use omop_adherence::utils::arrow::naive_to_date32;

/// Build a date, panicking on invalid input
#[must_use]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A fill with an explicit end date
#[must_use]
pub fn fill(person_id: i64, drug_id: i64, start: NaiveDate, end: NaiveDate) -> FillRecord {
    FillRecord::new(person_id, drug_id, start).with_end_date(end)
}

/// A fill with a days supply
#[must_use]
pub fn supply(person_id: i64, drug_id: i64, start: NaiveDate, days: i32) -> FillRecord {
    FillRecord::new(person_id, drug_id, start).with_days_supply(days)
}

/// A fresh, empty directory under the system temp dir
#[must_use]
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("omop_adherence_{name}_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A `DRUG_EXPOSURE` batch in OMOP layout
#[must_use]
pub fn drug_exposure_batch(records: &[FillRecord]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("drug_exposure_id", DataType::Int64, true),
        Field::new("person_id", DataType::Int64, false),
        Field::new("drug_concept_id", DataType::Int64, false),
        Field::new("drug_exposure_start_date", DataType::Date32, true),
        Field::new("drug_exposure_end_date", DataType::Date32, true),
        Field::new("days_supply", DataType::Int32, true),
        Field::new("refills", DataType::Int32, true),
        Field::new("drug_type_concept_id", DataType::Int64, true),
    ]);

    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(records.iter().map(|r| r.drug_exposure_id).collect::<Int64Array>()),
            Arc::new(records.iter().map(|r| Some(r.person_id)).collect::<Int64Array>()),
            Arc::new(records.iter().map(|r| Some(r.drug_id)).collect::<Int64Array>()),
            Arc::new(
                records
                    .iter()
                    .map(|r| r.start_date.map(naive_to_date32))
                    .collect::<Date32Array>(),
            ),
            Arc::new(
                records
                    .iter()
                    .map(|r| r.explicit_end_date.map(naive_to_date32))
                    .collect::<Date32Array>(),
            ),
            Arc::new(records.iter().map(|r| r.days_supply).collect::<Int32Array>()),
            Arc::new(records.iter().map(|r| r.refills).collect::<Int32Array>()),
            Arc::new(records.iter().map(|r| r.drug_type_concept_id).collect::<Int64Array>()),
        ],
    )
    .unwrap()
}

/// A `CONCEPT` batch
#[must_use]
pub fn concept_batch(concepts: &[(i64, &str, &str)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("concept_id", DataType::Int64, false),
        Field::new("concept_name", DataType::Utf8, true),
        Field::new("domain_id", DataType::Utf8, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(concepts.iter().map(|c| Some(c.0)).collect::<Int64Array>()),
            Arc::new(concepts.iter().map(|c| Some(c.1)).collect::<StringArray>()),
            Arc::new(concepts.iter().map(|c| Some(c.2)).collect::<StringArray>()),
        ],
    )
    .unwrap()
}

/// A `PERSON` batch
#[must_use]
pub fn person_batch(persons: &[(i64, i32)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, false),
        Field::new("year_of_birth", DataType::Int32, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(persons.iter().map(|p| Some(p.0)).collect::<Int64Array>()),
            Arc::new(persons.iter().map(|p| Some(p.1)).collect::<Int32Array>()),
        ],
    )
    .unwrap()
}

/// A `CONDITION_OCCURRENCE` batch
#[must_use]
pub fn condition_batch(occurrences: &[(i64, i64, NaiveDate)]) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("person_id", DataType::Int64, false),
        Field::new("condition_concept_id", DataType::Int64, false),
        Field::new("condition_start_date", DataType::Date32, true),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(occurrences.iter().map(|o| Some(o.0)).collect::<Int64Array>()),
            Arc::new(occurrences.iter().map(|o| Some(o.1)).collect::<Int64Array>()),
            Arc::new(
                occurrences
                    .iter()
                    .map(|o| Some(naive_to_date32(o.2)))
                    .collect::<Date32Array>(),
            ),
        ],
    )
    .unwrap()
}
