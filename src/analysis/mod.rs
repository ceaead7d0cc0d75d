//! Statistical analysis of assessment data.
//!
//! `anova` holds the one-way ANOVA and LSD grouping engine, `summary` the
//! descriptive statistics used by the summary table and box plots, and
//! `series` runs the engine across every date of an assessment type.

pub mod anova;
pub mod series;
pub mod summary;

pub use anova::*;
pub use series::*;
pub use summary::*;
