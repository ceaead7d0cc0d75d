//! Per-date analysis across an assessment series.
//!
//! Runs the ANOVA engine once for every assessment date of one assessment
//! type and collects the outcomes in date order.

use crate::analysis::anova::{compute_stats, AnovaDesign, StatsOutcome};
use crate::error::{AnalysisError, TrialError};
use crate::models::{Trial, TrialConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// How the LSD replicate denominator is derived from the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum LsdDenominator {
    /// Number of blocks.
    #[default]
    Blocks,
    /// Number of blocks times replicates per block.
    BlocksTimesReps,
}

impl LsdDenominator {
    pub fn replicates(&self, config: &TrialConfig) -> usize {
        let blocks = config.num_blocks as usize;
        match self {
            LsdDenominator::Blocks => blocks,
            LsdDenominator::BlocksTimesReps => blocks * config.num_reps.max(1) as usize,
        }
    }
}

/// Engine outcome for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateAnalysis {
    pub date: NaiveDate,
    pub outcome: StatsOutcome,
}

/// Outcomes for every date of one assessment type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAnalysis {
    pub assessment: String,
    pub lsd_denominator: LsdDenominator,
    pub lsd_replicates: usize,
    pub dates: Vec<DateAnalysis>,
}

impl SeriesAnalysis {
    /// Outcomes in date order.
    pub fn outcomes(&self) -> Vec<StatsOutcome> {
        self.dates.iter().map(|d| d.outcome.clone()).collect()
    }

    /// Dates whose F test did not reach significance or could not be run.
    pub fn nonsignificant_dates(&self) -> Vec<NaiveDate> {
        self.dates
            .iter()
            .filter(|d| !d.outcome.is_significant())
            .map(|d| d.date)
            .collect()
    }
}

/// Failure while analysing a series.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Trial(#[from] TrialError),

    #[error("{date}: {source}")]
    Analysis {
        date: NaiveDate,
        #[source]
        source: AnalysisError,
    },
}

/// Analyse every assessment date of `assessment`.
///
/// Dates on which the assessment type was never initialised are reported
/// as insufficient data.
pub fn analyze_series(
    trial: &Trial,
    assessment: &str,
    denominator: LsdDenominator,
) -> Result<SeriesAnalysis, SeriesError> {
    if trial.config.assessment_type(assessment).is_none() {
        return Err(TrialError::UnknownAssessment(assessment.to_string()).into());
    }

    let index = trial.layout_index();
    let lsd_replicates = denominator.replicates(&trial.config);
    let design = AnovaDesign {
        treatment_names: &trial.config.treatments,
        num_treatments: trial.config.num_treatments,
        lsd_replicates,
    };

    let mut dates = Vec::with_capacity(trial.assessment_dates.len());
    for date in &trial.assessment_dates {
        let outcome = match date.observations(assessment) {
            Some(observations) => compute_stats(observations, &index, &design).map_err(
                |source| SeriesError::Analysis {
                    date: date.date,
                    source,
                },
            )?,
            None => StatsOutcome::InsufficientData,
        };

        match &outcome {
            StatsOutcome::Computed(r) => debug!(
                "{} {}: F={:.2} LSD={:.2} significant={}",
                date.date, assessment, r.f_value, r.lsd, r.significant
            ),
            StatsOutcome::InsufficientData => debug!("{} {}: no data", date.date, assessment),
            StatsOutcome::DegenerateDegreesOfFreedom(r) => warn!(
                "{} {}: degenerate degrees of freedom (treatment {}, error {})",
                date.date, assessment, r.df_treatment, r.df_error
            ),
        }

        dates.push(DateAnalysis {
            date: date.date,
            outcome,
        });
    }

    Ok(SeriesAnalysis {
        assessment: assessment.to_string(),
        lsd_denominator: denominator,
        lsd_replicates,
        dates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssessmentDate, Observation, Plot};
    use std::collections::BTreeMap;

    fn trial_with(values: &[(&str, usize, &str)], reps: u32) -> Trial {
        let mut config = TrialConfig::default();
        config.num_reps = reps;
        let layout = vec![values
            .iter()
            .map(|(id, t, _)| Plot::real(*id, 1, *t))
            .collect()];
        let mut trial = Trial::new(config, layout);

        let obs: BTreeMap<String, Observation> = values
            .iter()
            .map(|(id, _, v)| (id.to_string(), Observation::recorded(*v)))
            .collect();
        let mut assessments = BTreeMap::new();
        assessments.insert("Turf Quality".to_string(), obs);
        trial.assessment_dates.push(AssessmentDate {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            assessments,
        });
        trial.assessment_dates.push(AssessmentDate {
            date: NaiveDate::from_ymd_opt(2024, 5, 15).unwrap(),
            assessments: BTreeMap::new(),
        });
        trial
    }

    #[test]
    fn test_replicates() {
        let mut config = TrialConfig::default();
        config.num_reps = 2;
        assert_eq!(LsdDenominator::Blocks.replicates(&config), 4);
        assert_eq!(LsdDenominator::BlocksTimesReps.replicates(&config), 8);
    }

    #[test]
    fn test_analyze_series_per_date() {
        let trial = trial_with(
            &[
                ("a1", 0, "8"),
                ("a2", 0, "8.2"),
                ("b1", 1, "6"),
                ("b2", 1, "6.1"),
                ("c1", 2, "9"),
                ("c2", 2, "9.3"),
            ],
            1,
        );
        let series = analyze_series(&trial, "Turf Quality", LsdDenominator::Blocks).unwrap();
        assert_eq!(series.dates.len(), 2);
        assert_eq!(series.lsd_replicates, 4);
        assert!(matches!(series.dates[0].outcome, StatsOutcome::Computed(_)));
        assert_eq!(series.dates[1].outcome, StatsOutcome::InsufficientData);
        assert_eq!(series.nonsignificant_dates(), vec![series.dates[1].date]);
    }

    #[test]
    fn test_analyze_series_unknown_assessment() {
        let trial = trial_with(&[("a1", 0, "1")], 1);
        let err = analyze_series(&trial, "Height", LsdDenominator::Blocks).unwrap_err();
        assert!(matches!(
            err,
            SeriesError::Trial(TrialError::UnknownAssessment(_))
        ));
    }

    #[test]
    fn test_analyze_series_reports_unknown_plot_with_date() {
        let mut trial = trial_with(&[("a1", 0, "1"), ("b1", 1, "2")], 1);
        trial.assessment_dates[0]
            .assessments
            .get_mut("Turf Quality")
            .unwrap()
            .insert("zz".to_string(), Observation::recorded("4"));

        let err = analyze_series(&trial, "Turf Quality", LsdDenominator::Blocks).unwrap_err();
        assert!(err.to_string().starts_with("2024-05-01"));
        assert!(err.to_string().contains("zz"));
    }
}
