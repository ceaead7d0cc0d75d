//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.trialstat.toml` files.

use crate::analysis::LsdDenominator;
use crate::cli::{Args, Command};
use crate::models::{default_assessment_types, AssessmentType};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".trialstat.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Defaults for new trials.
    #[serde(default)]
    pub trial: TrialDefaults,

    /// Analysis settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default report output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Directory holding the trial library.
    #[serde(default = "default_library")]
    pub library: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            library: default_library(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "trialstat_report.md".to_string()
}

fn default_library() -> String {
    "trials".to_string()
}

/// Design used by `trialstat new` when the command line does not say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialDefaults {
    #[serde(default = "default_blocks")]
    pub num_blocks: u32,

    #[serde(default = "default_treatments")]
    pub num_treatments: usize,

    #[serde(default = "default_reps")]
    pub num_reps: u32,

    /// Assessment scales attached to every new trial.
    #[serde(default = "default_assessment_types")]
    pub assessment_types: Vec<AssessmentType>,
}

impl Default for TrialDefaults {
    fn default() -> Self {
        Self {
            num_blocks: default_blocks(),
            num_treatments: default_treatments(),
            num_reps: default_reps(),
            assessment_types: default_assessment_types(),
        }
    }
}

fn default_blocks() -> u32 {
    4
}

fn default_treatments() -> usize {
    3
}

fn default_reps() -> u32 {
    1
}

/// Analysis settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Replicate count used in the LSD: `blocks` or `blocks-times-reps`.
    #[serde(default)]
    pub lsd_denominator: LsdDenominator,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Decimal places for means, SE and ANOVA statistics.
    #[serde(default = "default_decimals")]
    pub decimals: usize,

    /// Include box-plot statistics in Markdown reports.
    #[serde(default = "default_true")]
    pub include_box_plots: bool,

    /// Include date notes in Markdown reports.
    #[serde(default = "default_true")]
    pub include_notes: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            decimals: default_decimals(),
            include_box_plots: true,
            include_notes: true,
        }
    }
}

fn default_decimals() -> usize {
    2
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// where they were given explicitly.
    pub fn merge_with_args(&mut self, args: &Args) {
        if args.verbose {
            self.general.verbose = true;
        }

        match &args.command {
            Command::New {
                blocks,
                treatments,
                treatment_names,
                reps,
                ..
            } => {
                if let Some(blocks) = blocks {
                    self.trial.num_blocks = *blocks;
                }
                if let Some(reps) = reps {
                    self.trial.num_reps = *reps;
                }
                if let Some(count) = treatments {
                    self.trial.num_treatments = *count;
                } else if let Some(names) = treatment_names {
                    self.trial.num_treatments = names.len();
                }
            }
            Command::Analyze {
                output,
                lsd_denominator,
                decimals,
                no_box_plots,
                ..
            } => {
                if let Some(output) = output {
                    self.general.output = output.to_string_lossy().to_string();
                }
                if let Some(denominator) = lsd_denominator {
                    self.analysis.lsd_denominator = *denominator;
                }
                if let Some(decimals) = decimals {
                    self.report.decimals = *decimals;
                }
                if *no_box_plots {
                    self.report.include_box_plots = false;
                }
            }
            Command::Export { decimals, .. } => {
                if let Some(decimals) = decimals {
                    self.report.decimals = *decimals;
                }
            }
            Command::Import {
                library: Some(library),
                ..
            }
            | Command::List {
                library: Some(library),
            } => {
                self.general.library = library.to_string_lossy().to_string();
            }
            _ => {}
        }
    }

    /// Log level after merging: `--quiet` wins, then `--verbose` or
    /// `[general] verbose`.
    pub fn log_level(&self, args: &Args) -> tracing::Level {
        if args.quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            args.log_level()
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
