//! Drug-specific median days supply
//!
//! The median table is built once per run over the full unfiltered set of
//! fill records and shared read-only by every group during normalization.

use rustc_hash::FxHashMap;

use crate::models::FillRecord;

/// Drug concept id to median positive days supply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrugMedianTable {
    medians: FxHashMap<i64, f64>,
}

impl DrugMedianTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from fill records, using only positive days supply values
    #[must_use]
    pub fn from_records(records: &[FillRecord]) -> Self {
        let mut supplies: FxHashMap<i64, Vec<i32>> = FxHashMap::default();
        for record in records {
            if let Some(days) = record.positive_days_supply() {
                supplies.entry(record.drug_id).or_default().push(days);
            }
        }

        let medians = supplies
            .into_iter()
            .filter_map(|(drug_id, mut values)| median(&mut values).map(|m| (drug_id, m)))
            .collect();

        Self { medians }
    }

    /// Add or replace the median of a drug
    pub fn insert(&mut self, drug_id: i64, median_days_supply: f64) {
        self.medians.insert(drug_id, median_days_supply);
    }

    /// Raw median of a drug
    #[must_use]
    pub fn median(&self, drug_id: i64) -> Option<f64> {
        self.medians.get(&drug_id).copied()
    }

    /// Imputed supply in whole days: the median truncated, at least one day
    #[must_use]
    pub fn supply_days(&self, drug_id: i64) -> Option<i64> {
        self.median(drug_id)
            .filter(|m| m.is_finite() && *m > 0.0)
            .map(|m| (m.trunc() as i64).max(1))
    }

    /// Number of drugs with a median
    #[must_use]
    pub fn len(&self) -> usize {
        self.medians.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.medians.is_empty()
    }
}

impl FromIterator<(i64, f64)> for DrugMedianTable {
    fn from_iter<I: IntoIterator<Item = (i64, f64)>>(iter: I) -> Self {
        Self {
            medians: iter.into_iter().collect(),
        }
    }
}

/// Median of the values; even counts average the two middle values
fn median(values: &mut [i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0)
    } else {
        Some(f64::from(values[mid]))
    }
}
