//! Aggregate statistics over an adherence report
//!
//! Standard deviations are sample standard deviations and are 0 for fewer
//! than two values.

use std::fmt::Write;

use itertools::Itertools;
use rustc_hash::FxHashSet;

use crate::algorithm::adherence::{AdherenceReport, NormalizationReport};
use crate::models::{AdherenceStatus, AdherenceSummary, GapRecord, GapSeverity, SourceMethod};

/// Mean, median, spread and range of a set of values
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Distribution {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl Distribution {
    /// Describe a set of values; all zero when empty
    #[must_use]
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values = values.into_iter().filter(|v| v.is_finite()).collect_vec();
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 0 {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        } else {
            values[count / 2]
        };
        let std_dev = if count < 2 {
            0.0
        } else {
            let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (squares / (count - 1) as f64).sqrt()
        };

        Self {
            count,
            mean,
            median,
            std_dev,
            min: values[0],
            max: values[count - 1],
        }
    }
}

/// Share of the whole in percent, 0 for an empty whole
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Figures over all summary rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverallStatistics {
    /// Number of (person, drug) combinations
    pub combinations: usize,
    pub unique_patients: usize,
    /// Combinations per patient
    pub drugs_per_patient: f64,
    pub adherent_count: usize,
    pub adherent_percentage: f64,
    pub pdc: Distribution,
    pub mean_gaps: f64,
    pub mean_gap_days: f64,
    pub max_gap_days: i64,
}

impl OverallStatistics {
    fn from_summaries(summaries: &[AdherenceSummary]) -> Self {
        let combinations = summaries.len();
        let unique_patients = summaries.iter().map(|s| s.person_id).collect::<FxHashSet<_>>().len();
        let adherent_count = summaries
            .iter()
            .filter(|s| s.adherence_status == AdherenceStatus::Adherent)
            .count();

        Self {
            combinations,
            unique_patients,
            drugs_per_patient: if unique_patients == 0 {
                0.0
            } else {
                combinations as f64 / unique_patients as f64
            },
            adherent_count,
            adherent_percentage: percentage(adherent_count, combinations),
            pdc: Distribution::from_values(summaries.iter().map(|s| s.pdc)),
            mean_gaps: Distribution::from_values(summaries.iter().map(|s| s.num_gaps as f64)).mean,
            mean_gap_days: Distribution::from_values(summaries.iter().map(|s| s.total_gap_days as f64)).mean,
            max_gap_days: summaries.iter().map(|s| s.max_gap_days).max().unwrap_or(0),
        }
    }
}

/// Count and share of one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryCount<T> {
    pub category: T,
    pub count: usize,
    pub percentage: f64,
}

/// Adherence figures of one drug
#[derive(Debug, Clone, PartialEq)]
pub struct DrugStatistics {
    pub drug_id: i64,
    pub drug_name: String,
    pub unique_patients: usize,
    pub pdc: Distribution,
    pub adherent_percentage: f64,
    pub mean_gaps: f64,
    pub mean_gap_days: f64,
    pub max_gap_days: i64,
}

/// Gap figures of one drug
#[derive(Debug, Clone, PartialEq)]
pub struct DrugGapStatistics {
    pub drug_id: i64,
    pub drug_name: String,
    pub unique_patients: usize,
    pub gap_count: usize,
    pub gap_days: Distribution,
    pub critical_gaps: usize,
}

/// Statistics derived from an adherence report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdherenceStatistics {
    pub overall: OverallStatistics,
    /// Every status, best first, including empty ones
    pub status_distribution: Vec<CategoryCount<AdherenceStatus>>,
    /// Per drug, by descending mean PDC
    pub by_drug: Vec<DrugStatistics>,
    /// Every severity, most severe first, including empty ones
    pub gap_severity_distribution: Vec<CategoryCount<GapSeverity>>,
    /// Per drug, by descending gap count
    pub gaps_by_drug: Vec<DrugGapStatistics>,
    pub normalization: NormalizationReport,
}

impl AdherenceStatistics {
    /// Compute statistics for a report
    #[must_use]
    pub fn from_report(report: &AdherenceReport) -> Self {
        Self {
            overall: OverallStatistics::from_summaries(&report.summaries),
            status_distribution: status_distribution(&report.summaries),
            by_drug: drug_statistics(&report.summaries),
            gap_severity_distribution: severity_distribution(&report.gaps),
            gaps_by_drug: gap_statistics(&report.gaps),
            normalization: report.normalization.clone(),
        }
    }

    /// Render a plain-text summary
    #[must_use]
    pub fn generate_summary(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) -> std::fmt::Result {
        let overall = &self.overall;
        writeln!(out, "Adherence Summary:")?;
        writeln!(out, "  Patient-Drug Combinations: {}", overall.combinations)?;
        writeln!(out, "  Unique Patients: {}", overall.unique_patients)?;
        writeln!(out, "  Drugs per Patient: {:.2}", overall.drugs_per_patient)?;
        writeln!(
            out,
            "  Adherent: {} ({:.1}%)",
            overall.adherent_count, overall.adherent_percentage
        )?;
        writeln!(
            out,
            "  PDC: mean {:.4}, median {:.4}, std {:.4}, min {:.4}, max {:.4}",
            overall.pdc.mean, overall.pdc.median, overall.pdc.std_dev, overall.pdc.min, overall.pdc.max
        )?;
        writeln!(
            out,
            "  Gaps: mean {:.2} per combination, mean {:.1} gap days, longest {} days",
            overall.mean_gaps, overall.mean_gap_days, overall.max_gap_days
        )?;

        writeln!(out, "\nAdherence Status:")?;
        for entry in &self.status_distribution {
            writeln!(out, "  {}: {} ({:.1}%)", entry.category, entry.count, entry.percentage)?;
        }

        if !self.by_drug.is_empty() {
            writeln!(out, "\nBy Drug:")?;
            for drug in &self.by_drug {
                writeln!(
                    out,
                    "  {} ({}): {} patients, mean PDC {:.4}, median {:.4}, {:.1}% adherent, max gap {} days",
                    drug.drug_name,
                    drug.drug_id,
                    drug.unique_patients,
                    drug.pdc.mean,
                    drug.pdc.median,
                    drug.adherent_percentage,
                    drug.max_gap_days
                )?;
            }
        }

        writeln!(out, "\nGap Severity:")?;
        for entry in &self.gap_severity_distribution {
            writeln!(out, "  {}: {} ({:.1}%)", entry.category, entry.count, entry.percentage)?;
        }

        if !self.gaps_by_drug.is_empty() {
            writeln!(out, "\nGaps by Drug:")?;
            for drug in &self.gaps_by_drug {
                writeln!(
                    out,
                    "  {} ({}): {} gaps in {} patients, mean {:.1} days, median {:.1}, max {:.0}, {} critical",
                    drug.drug_name,
                    drug.drug_id,
                    drug.gap_count,
                    drug.unique_patients,
                    drug.gap_days.mean,
                    drug.gap_days.median,
                    drug.gap_days.max,
                    drug.critical_gaps
                )?;
            }
        }

        let normalization = &self.normalization;
        writeln!(out, "\nEnd Date Sources:")?;
        writeln!(
            out,
            "  Records: {}, normalized: {}, rejected without start date: {}",
            normalization.total_records, normalization.normalized, normalization.rejected_missing_start
        )?;
        for method in SourceMethod::ALL {
            writeln!(
                out,
                "  {}: {} ({:.1}%)",
                method,
                normalization.count(method),
                normalization.percentage(method)
            )?;
        }

        Ok(())
    }
}

fn status_distribution(summaries: &[AdherenceSummary]) -> Vec<CategoryCount<AdherenceStatus>> {
    let counts = summaries.iter().counts_by(|s| s.adherence_status);
    AdherenceStatus::ALL
        .iter()
        .map(|&status| {
            let count = counts.get(&status).copied().unwrap_or(0);
            CategoryCount {
                category: status,
                count,
                percentage: percentage(count, summaries.len()),
            }
        })
        .collect()
}

fn severity_distribution(gaps: &[GapRecord]) -> Vec<CategoryCount<GapSeverity>> {
    let counts = gaps.iter().counts_by(|g| g.severity);
    GapSeverity::ALL
        .iter()
        .map(|&severity| {
            let count = counts.get(&severity).copied().unwrap_or(0);
            CategoryCount {
                category: severity,
                count,
                percentage: percentage(count, gaps.len()),
            }
        })
        .collect()
}

fn drug_statistics(summaries: &[AdherenceSummary]) -> Vec<DrugStatistics> {
    summaries
        .iter()
        .into_group_map_by(|s| s.drug_id)
        .into_iter()
        .map(|(drug_id, rows)| {
            let adherent = rows
                .iter()
                .filter(|s| s.adherence_status == AdherenceStatus::Adherent)
                .count();
            DrugStatistics {
                drug_id,
                drug_name: rows[0].drug_name.clone(),
                unique_patients: rows.iter().map(|s| s.person_id).collect::<FxHashSet<_>>().len(),
                pdc: Distribution::from_values(rows.iter().map(|s| s.pdc)),
                adherent_percentage: percentage(adherent, rows.len()),
                mean_gaps: Distribution::from_values(rows.iter().map(|s| s.num_gaps as f64)).mean,
                mean_gap_days: Distribution::from_values(rows.iter().map(|s| s.total_gap_days as f64)).mean,
                max_gap_days: rows.iter().map(|s| s.max_gap_days).max().unwrap_or(0),
            }
        })
        .sorted_by(|a, b| b.pdc.mean.total_cmp(&a.pdc.mean).then(a.drug_id.cmp(&b.drug_id)))
        .collect()
}

fn gap_statistics(gaps: &[GapRecord]) -> Vec<DrugGapStatistics> {
    gaps.iter()
        .into_group_map_by(|g| g.drug_id)
        .into_iter()
        .map(|(drug_id, rows)| DrugGapStatistics {
            drug_id,
            drug_name: rows[0].drug_name.clone(),
            unique_patients: rows.iter().map(|g| g.person_id).collect::<FxHashSet<_>>().len(),
            gap_count: rows.len(),
            gap_days: Distribution::from_values(rows.iter().map(|g| g.gap_days as f64)),
            critical_gaps: rows
                .iter()
                .filter(|g| g.severity == GapSeverity::Critical)
                .count(),
        })
        .sorted_by(|a, b| b.gap_count.cmp(&a.gap_count).then(a.drug_id.cmp(&b.drug_id)))
        .collect()
}
