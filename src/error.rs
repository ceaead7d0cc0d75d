//! Typed errors for the trial library.
//!
//! The CLI wraps these in `anyhow` at the application boundary; the
//! library surfaces them as concrete types so callers can match on them.

use thiserror::Error;

/// Errors raised by the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// An observation references a plot the layout does not contain.
    #[error("observation references unknown plot '{plot_id}'")]
    UnknownPlot { plot_id: String },
}

/// Errors raised while editing or validating a trial document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrialError {
    #[error("no assessment date '{0}' in this trial")]
    UnknownDate(String),

    #[error("assessment date '{0}' already exists")]
    DuplicateDate(String),

    #[error("no assessment type named '{0}'")]
    UnknownAssessment(String),

    #[error("no plot '{0}' in the layout")]
    UnknownPlot(String),

    #[error("no block {0} in the layout")]
    UnknownBlock(u32),

    #[error("plot '{0}' is blank and cannot hold a value")]
    BlankPlot(String),

    #[error("value '{value}' is not a number")]
    NotANumber { value: String },

    #[error("value {value} for '{assessment}' is outside the range {min}..={max}")]
    OutOfRange {
        assessment: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid trial design: {0}")]
    InvalidConfig(String),

    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}
