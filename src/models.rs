//! Data models for field trials.
//!
//! This module contains the core data structures shared by the analysis
//! engine, the trial store and the report generators: plots, observations,
//! assessment types and the trial document that ties them together.

use crate::error::TrialError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

/// A plot with a treatment assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealPlot {
    /// Plot identifier, unique within a trial (e.g. `B1-T2-R1`).
    pub id: String,
    /// Block index, starting at 1.
    pub block: u32,
    /// Treatment index in `[0, num_treatments)`.
    pub treatment: usize,
}

/// A spacer plot inside a block. Carries no treatment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankPlot {
    /// Plot identifier, unique within a trial.
    pub id: String,
    /// Block the blank sits in.
    pub block: u32,
}

/// One cell of the physical layout.
///
/// Blank plots are a separate variant so that treatment-keyed aggregations
/// can only ever see [`RealPlot`]s.
///
/// Plots are written as `{"kind": "real", "id": ..}`. Reading also accepts
/// the browser backup shape: real plots as `{block, treatment, plot}` and
/// blanks as `{id, block, isBlank: true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", try_from = "RawPlot")]
pub enum Plot {
    Real(RealPlot),
    Blank(BlankPlot),
}

/// Any plot shape found in a trial file.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlot {
    kind: Option<String>,
    id: Option<String>,
    plot: Option<String>,
    block: Option<u32>,
    treatment: Option<usize>,
    #[serde(default)]
    is_blank: bool,
}

impl TryFrom<RawPlot> for Plot {
    type Error = String;

    fn try_from(raw: RawPlot) -> Result<Self, Self::Error> {
        let blank = match raw.kind.as_deref() {
            Some("blank") => true,
            Some("real") => false,
            Some(other) => return Err(format!("unknown plot kind '{}'", other)),
            None => raw.is_blank,
        };
        // backups key observations by `plot`, so it wins over `id`
        let id = raw
            .plot
            .or(raw.id)
            .ok_or_else(|| "plot has no id".to_string())?;
        let block = raw
            .block
            .ok_or_else(|| format!("plot '{}' has no block", id))?;

        if blank {
            return Ok(Plot::blank(id, block));
        }
        let treatment = raw
            .treatment
            .ok_or_else(|| format!("plot '{}' has no treatment", id))?;
        Ok(Plot::real(id, block, treatment))
    }
}

impl Plot {
    /// Create a plot carrying a treatment.
    pub fn real(id: impl Into<String>, block: u32, treatment: usize) -> Self {
        Plot::Real(RealPlot {
            id: id.into(),
            block,
            treatment,
        })
    }

    /// Create a blank plot.
    pub fn blank(id: impl Into<String>, block: u32) -> Self {
        Plot::Blank(BlankPlot {
            id: id.into(),
            block,
        })
    }

    pub fn id(&self) -> &str {
        match self {
            Plot::Real(p) => &p.id,
            Plot::Blank(p) => &p.id,
        }
    }

    pub fn block(&self) -> u32 {
        match self {
            Plot::Real(p) => p.block,
            Plot::Blank(p) => p.block,
        }
    }

    /// Treatment index, or `None` for blanks.
    pub fn treatment(&self) -> Option<usize> {
        match self {
            Plot::Real(p) => Some(p.treatment),
            Plot::Blank(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Plot::Blank(_))
    }
}

/// A recorded value for one (date, assessment type, plot) triple.
///
/// `entered` distinguishes a cell left blank from one explicitly set to
/// zero. The raw text is kept so a cleared cell round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub entered: bool,
}

impl Observation {
    /// An unentered cell.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A cell holding `value`; entered unless the text is empty.
    pub fn recorded(value: impl Into<String>) -> Self {
        let value = value.into();
        let entered = !value.is_empty();
        Self { value, entered }
    }

    /// The numeric value, if the cell is entered and holds a finite number.
    pub fn numeric_value(&self) -> Option<f64> {
        if !self.entered {
            return None;
        }
        parse_finite(&self.value)
    }
}

/// Parse a cell's text as a finite number.
pub fn parse_finite(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// A named numeric measurement scale, e.g. turf quality 1-10.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentType {
    pub name: String,
    pub min: f64,
    pub max: f64,
}

impl AssessmentType {
    pub fn new(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            min,
            max,
        }
    }

    /// Whether `value` falls inside the scale (inclusive).
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }

    /// Width of the scale.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

impl fmt::Display for AssessmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}-{})", self.name, self.min, self.max)
    }
}

/// Design parameters of a trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialConfig {
    pub trial_name: String,
    pub num_blocks: u32,
    pub num_treatments: usize,
    #[serde(default = "default_reps")]
    pub num_reps: u32,
    pub treatments: Vec<String>,
    pub assessment_types: Vec<AssessmentType>,
}

fn default_reps() -> u32 {
    1
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial_name: "New Trial".to_string(),
            num_blocks: 4,
            num_treatments: 3,
            num_reps: 1,
            treatments: default_treatment_names(3),
            assessment_types: default_assessment_types(),
        }
    }
}

/// `Treatment A`, `Treatment B`, ... for `count` treatments.
pub fn default_treatment_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("Treatment {}", spreadsheet_letters(i).to_uppercase()))
        .collect()
}

/// The stock assessment scales offered for a new trial.
pub fn default_assessment_types() -> Vec<AssessmentType> {
    vec![
        AssessmentType::new("Turf Quality", 1.0, 10.0),
        AssessmentType::new("Turf Color", 1.0, 10.0),
        AssessmentType::new("NDVI", 0.0, 1.0),
    ]
}

/// Lowercase letter label for a zero-based position: `a`..`z`, `aa`, `ab`, ...
pub fn spreadsheet_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'a' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

impl TrialConfig {
    /// Display name for a treatment index, falling back to `T{n}`.
    pub fn treatment_name(&self, treatment: usize) -> String {
        self.treatments
            .get(treatment)
            .cloned()
            .unwrap_or_else(|| format!("T{}", treatment + 1))
    }

    pub fn assessment_type(&self, name: &str) -> Option<&AssessmentType> {
        self.assessment_types.iter().find(|a| a.name == name)
    }

    /// Reject designs the analysis cannot use: zero blocks, treatments or
    /// reps, and inverted assessment scales.
    pub fn validate(&self) -> Result<(), TrialError> {
        if self.num_blocks == 0 {
            return Err(TrialError::InvalidConfig(
                "number of blocks must be at least 1".to_string(),
            ));
        }
        if self.num_treatments == 0 {
            return Err(TrialError::InvalidConfig(
                "number of treatments must be at least 1".to_string(),
            ));
        }
        if self.num_reps == 0 {
            return Err(TrialError::InvalidConfig(
                "number of reps must be at least 1".to_string(),
            ));
        }
        if let Some(scale) = self.assessment_types.iter().find(|a| a.min > a.max) {
            return Err(TrialError::InvalidConfig(format!(
                "assessment type '{}' has min {} above max {}",
                scale.name, scale.min, scale.max
            )));
        }
        Ok(())
    }
}

/// Observations for every assessment type on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentDate {
    pub date: NaiveDate,
    /// Assessment type name -> plot id -> observation.
    #[serde(default)]
    pub assessments: BTreeMap<String, BTreeMap<String, Observation>>,
}

impl AssessmentDate {
    /// Observations for one assessment type, if it was initialized.
    pub fn observations(&self, assessment: &str) -> Option<&BTreeMap<String, Observation>> {
        self.assessments.get(assessment)
    }
}

/// A complete trial document: design, layout, collected data and notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub id: String,
    pub name: String,
    pub config: TrialConfig,
    /// One row per block, plots in field order.
    pub layout: Vec<Vec<Plot>>,
    #[serde(default)]
    pub assessment_dates: Vec<AssessmentDate>,
    /// Free text keyed by `{date}_{assessment}`.
    #[serde(default)]
    pub notes: BTreeMap<String, String>,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Trial {
    /// Create an empty trial for `config` with the given layout.
    pub fn new(config: TrialConfig, layout: Vec<Vec<Plot>>) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            name: config.trial_name.clone(),
            config,
            layout,
            assessment_dates: Vec::new(),
            notes: BTreeMap::new(),
            created: now,
            last_modified: now,
        }
    }

    /// Every plot in field order, blanks included.
    pub fn plots(&self) -> impl Iterator<Item = &Plot> {
        self.layout.iter().flatten()
    }

    pub fn find_plot(&self, plot_id: &str) -> Option<&Plot> {
        self.plots().find(|p| p.id() == plot_id)
    }

    pub fn date(&self, date: NaiveDate) -> Option<&AssessmentDate> {
        self.assessment_dates.iter().find(|d| d.date == date)
    }

    pub fn date_mut(&mut self, date: NaiveDate) -> Option<&mut AssessmentDate> {
        self.assessment_dates.iter_mut().find(|d| d.date == date)
    }

    /// Note key for a date and assessment type.
    pub fn note_key(date: NaiveDate, assessment: &str) -> String {
        format!("{}_{}", date.format("%Y-%m-%d"), assessment)
    }

    pub fn note(&self, date: NaiveDate, assessment: &str) -> Option<&str> {
        self.notes
            .get(&Self::note_key(date, assessment))
            .map(String::as_str)
    }

    /// Check the design and the layout against it: blocks start at 1,
    /// treatments are in range and plot ids are unique.
    pub fn validate_layout(&self) -> Result<(), TrialError> {
        self.config.validate()?;
        let mut seen = HashSet::new();
        for plot in self.plots() {
            if !seen.insert(plot.id()) {
                return Err(TrialError::InvalidLayout(format!(
                    "duplicate plot id '{}'",
                    plot.id()
                )));
            }
            if plot.block() == 0 {
                return Err(TrialError::InvalidLayout(format!(
                    "plot '{}' has block 0",
                    plot.id()
                )));
            }
            if let Some(t) = plot.treatment() {
                if t >= self.config.num_treatments {
                    return Err(TrialError::InvalidLayout(format!(
                        "plot '{}' has treatment {} but the trial has {} treatments",
                        plot.id(),
                        t,
                        self.config.num_treatments
                    )));
                }
            }
        }
        Ok(())
    }

    /// Index of plots by id for analysis lookups.
    pub fn layout_index(&self) -> LayoutIndex<'_> {
        LayoutIndex::new(self.plots())
    }
}

/// Borrowed plot-id index over a layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutIndex<'a> {
    plots: HashMap<&'a str, &'a Plot>,
}

impl<'a> LayoutIndex<'a> {
    pub fn new(plots: impl IntoIterator<Item = &'a Plot>) -> Self {
        Self {
            plots: plots.into_iter().map(|p| (p.id(), p)).collect(),
        }
    }

    pub fn get(&self, plot_id: &str) -> Option<&'a Plot> {
        self.plots.get(plot_id).copied()
    }
}
