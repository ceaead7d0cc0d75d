//! Report generation.
//!
//! An [`AnalysisReport`] bundles the per-date engine outcomes with the
//! descriptive tables derived from the same trial, and is rendered as
//! Markdown, JSON or CSV.

pub mod csv;
pub mod generator;

pub use self::csv::{generate_data_csv, generate_summary_csv};
pub use generator::{generate_json_report, generate_markdown_report};

use crate::analysis::{summary_table, BoxStats, LsdDenominator, MeanSe, SeriesAnalysis};
use crate::models::{AssessmentType, Trial};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about an analysis report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub trial_id: String,
    pub trial_name: String,
    pub assessment: AssessmentType,
    pub generated_at: DateTime<Utc>,
    pub num_treatments: usize,
    pub num_blocks: u32,
    pub num_reps: u32,
    pub lsd_denominator: LsdDenominator,
    pub lsd_replicates: usize,
}

/// Mean ± SE cells for one treatment across all dates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRow {
    pub treatment: usize,
    pub treatment_name: String,
    pub cells: Vec<Option<MeanSe>>,
}

/// Box-plot statistics for one treatment on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxPlotEntry {
    pub date: NaiveDate,
    pub treatment: usize,
    pub treatment_name: String,
    pub stats: BoxStats,
}

/// A note attached to a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DateNote {
    pub date: NaiveDate,
    pub text: String,
}

/// Everything the renderers need for one assessment type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub metadata: ReportMetadata,
    /// Assessment dates in trial order.
    pub dates: Vec<NaiveDate>,
    /// Treatment names in design order.
    pub treatments: Vec<String>,
    pub analysis: SeriesAnalysis,
    pub summary: Vec<SummaryRow>,
    pub box_plots: Vec<BoxPlotEntry>,
    /// Shared scale for box plots across every date.
    pub value_range: Option<(f64, f64)>,
    pub notes: Vec<DateNote>,
}

impl AnalysisReport {
    /// Assemble a report from a trial and its series analysis.
    pub fn build(trial: &Trial, assessment: &AssessmentType, analysis: SeriesAnalysis) -> Self {
        let metadata = ReportMetadata {
            trial_id: trial.id.clone(),
            trial_name: trial.name.clone(),
            assessment: assessment.clone(),
            generated_at: Utc::now(),
            num_treatments: trial.config.num_treatments,
            num_blocks: trial.config.num_blocks,
            num_reps: trial.config.num_reps,
            lsd_denominator: analysis.lsd_denominator,
            lsd_replicates: analysis.lsd_replicates,
        };

        let treatments: Vec<String> = (0..trial.config.num_treatments)
            .map(|t| trial.config.treatment_name(t))
            .collect();

        let summary = summary_table(trial, &assessment.name)
            .into_iter()
            .enumerate()
            .map(|(treatment, cells)| SummaryRow {
                treatment,
                treatment_name: treatments[treatment].clone(),
                cells,
            })
            .collect();

        let box_plots = analysis
            .dates
            .iter()
            .filter_map(|d| d.outcome.result().map(|r| (d.date, r)))
            .flat_map(|(date, result)| {
                let mut entries: Vec<BoxPlotEntry> = result
                    .means
                    .iter()
                    .filter_map(|m| {
                        BoxStats::from_values(&m.values).map(|stats| BoxPlotEntry {
                            date,
                            treatment: m.treatment,
                            treatment_name: m.treatment_name.clone(),
                            stats,
                        })
                    })
                    .collect();
                entries.sort_by_key(|e| e.treatment);
                entries
            })
            .collect();

        let value_range = crate::analysis::global_range(&analysis.outcomes());

        let notes = trial
            .assessment_dates
            .iter()
            .filter_map(|d| {
                trial.note(d.date, &assessment.name).map(|text| DateNote {
                    date: d.date,
                    text: text.to_string(),
                })
            })
            .collect();

        Self {
            metadata,
            dates: trial.assessment_dates.iter().map(|d| d.date).collect(),
            treatments,
            analysis,
            summary,
            box_plots,
            value_range,
            notes,
        }
    }
}

/// Format a statistic, rendering non-finite values as `n/a`.
pub fn format_stat(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{:.*}", decimals, value)
    } else {
        "n/a".to_string()
    }
}
