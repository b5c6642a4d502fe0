//! Condition history summary used to decorate summary rows

use chrono::NaiveDate;
use rustc_hash::FxHashMap;

use crate::models::{ConditionOccurrence, Demographics};

/// Fold condition occurrences into per-person primary condition and
/// comorbidity count
///
/// Only named conditions recorded on or before `as_of` are considered; with a
/// cutoff, undated occurrences are left out as well. The
/// primary condition is the one recorded most often; ties go to the lowest
/// condition concept id.
pub fn apply_condition_history(
    demographics: &mut Demographics,
    occurrences: &[ConditionOccurrence],
    as_of: Option<NaiveDate>,
) {
    // person -> condition -> (name, count)
    let mut counts: FxHashMap<i64, FxHashMap<i64, (&str, usize)>> = FxHashMap::default();

    for occurrence in occurrences {
        let Some(name) = occurrence.condition_name.as_deref() else {
            continue;
        };
        if let Some(limit) = as_of {
            if occurrence.start_date.is_none_or(|date| date > limit) {
                continue;
            }
        }
        counts
            .entry(occurrence.person_id)
            .or_default()
            .entry(occurrence.condition_id)
            .or_insert((name, 0))
            .1 += 1;
    }

    for (person_id, conditions) in counts {
        let primary = conditions
            .iter()
            .max_by(|(id_a, (_, count_a)), (id_b, (_, count_b))| {
                count_a.cmp(count_b).then_with(|| id_b.cmp(id_a))
            })
            .map(|(_, (name, _))| (*name).to_string());

        let person = demographics.entry(person_id);
        person.primary_condition = primary;
        person.comorbidity_count = u32::try_from(conditions.len()).unwrap_or(u32::MAX);
    }
}
