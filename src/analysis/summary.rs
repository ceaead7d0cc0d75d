//! Descriptive statistics for summary tables and box plots.
//!
//! These are computed independently of the ANOVA engine: the summary table
//! uses population variance for its standard error, and the box-plot
//! quartiles use nearest-rank indexing.

use crate::analysis::anova::StatsOutcome;
use crate::models::{AssessmentDate, Trial};
use serde::{Deserialize, Serialize};

/// Mean and standard error for one treatment on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeanSe {
    pub mean: f64,
    /// `sqrt(population_variance / n)`.
    pub std_error: f64,
    pub n: usize,
}

impl MeanSe {
    /// Returns `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_error: (variance / n).sqrt(),
            n: values.len(),
        })
    }

    /// The summary table shows the standard error only with two or more values.
    pub fn shows_error(&self) -> bool {
        self.n > 1
    }
}

/// Box-plot statistics for one treatment on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub mean: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxStats {
    /// Nearest-rank quartiles: `sorted[floor(n * 0.25)]` and
    /// `sorted[floor(n * 0.75)]`.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let at = |fraction: f64| sorted[((n as f64 * fraction).floor() as usize).min(n - 1)];
        Some(Self {
            min: sorted[0],
            q1: at(0.25),
            mean: sorted.iter().sum::<f64>() / n as f64,
            q3: at(0.75),
            max: sorted[n - 1],
        })
    }
}

/// Entered, numeric values for one treatment on one date, in layout order.
pub fn treatment_values(
    trial: &Trial,
    date: &AssessmentDate,
    assessment: &str,
    treatment: usize,
) -> Vec<f64> {
    let Some(observations) = date.observations(assessment) else {
        return Vec::new();
    };
    trial
        .plots()
        .filter(|p| p.treatment() == Some(treatment))
        .filter_map(|p| observations.get(p.id()))
        .filter_map(|o| o.numeric_value())
        .collect()
}

/// Mean ± SE grid: one row per treatment, one cell per assessment date.
pub fn summary_table(trial: &Trial, assessment: &str) -> Vec<Vec<Option<MeanSe>>> {
    (0..trial.config.num_treatments)
        .map(|treatment| {
            trial
                .assessment_dates
                .iter()
                .map(|date| {
                    MeanSe::from_values(&treatment_values(trial, date, assessment, treatment))
                })
                .collect()
        })
        .collect()
}

/// Minimum and maximum over every analysed value across all dates.
///
/// Box plots for different dates share this scale.
pub fn global_range(outcomes: &[StatsOutcome]) -> Option<(f64, f64)> {
    outcomes
        .iter()
        .filter_map(StatsOutcome::result)
        .flat_map(|r| r.means.iter().flat_map(|m| m.values.iter().copied()))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
