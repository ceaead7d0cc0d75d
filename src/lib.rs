//! TrialStat - field-trial data collection and analysis.
//!
//! The library exposes the trial data model, the one-way ANOVA / LSD
//! engine and the report renderers used by the `trialstat` binary.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod trial;

pub use analysis::{compute_stats, AnalysisResult, AnovaDesign, StatsOutcome, TreatmentMeanGroup};
pub use error::{AnalysisError, TrialError};
pub use models::{AssessmentType, Observation, Plot, Trial, TrialConfig};
