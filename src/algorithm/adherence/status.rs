//! PDC arithmetic and adherence classification

use crate::models::AdherenceStatus;

/// Width of the moderately adherent band below the threshold
pub const MODERATE_BAND: f64 = 0.1;

/// Round to 4 decimal places
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Proportion of days covered, rounded to 4 decimals and clamped to [0, 1]
///
/// A zero or negative duration yields 0.
#[must_use]
pub fn compute_pdc(total_days_covered: i64, treatment_duration: i64) -> f64 {
    if treatment_duration <= 0 {
        return 0.0;
    }
    round4(total_days_covered as f64 / treatment_duration as f64).clamp(0.0, 1.0)
}

/// Classify a PDC value against the adherence threshold
#[must_use]
pub fn classify_adherence(pdc: f64, threshold: f64) -> AdherenceStatus {
    if pdc >= threshold {
        AdherenceStatus::Adherent
    } else if pdc >= round4(threshold - MODERATE_BAND) {
        AdherenceStatus::ModeratelyAdherent
    } else {
        AdherenceStatus::NonAdherent
    }
}
