//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::analysis::LsdDenominator;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TrialStat - field-trial data collection and ANOVA summaries
///
/// Lay out a randomized complete block trial, record assessment data per
/// plot and date, and report treatment means, LSD groupings and F tests.
///
/// Examples:
///   trialstat new -o fairway.json --name "Fairway 2024" --treatments 5 --blocks 4
///   trialstat add-date fairway.json 2024-05-01
///   trialstat record fairway.json --date 2024-05-01 --assessment "Turf Quality" --plot B1-T2-R1 7.5
///   trialstat analyze fairway.json --assessment "Turf Quality" -o quality.md
///   trialstat export fairway.json --assessment NDVI --kind summary -o ndvi.csv
///   trialstat init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .trialstat.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true, env = "TRIALSTAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create a trial file with a freshly randomized layout
    New {
        /// Where to write the trial file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Trial name
        #[arg(long, default_value = "New Trial")]
        name: String,

        /// Number of blocks (default from config)
        #[arg(long, value_name = "COUNT")]
        blocks: Option<u32>,

        /// Number of treatments (default from config, or the number of names)
        #[arg(long, value_name = "COUNT")]
        treatments: Option<usize>,

        /// Treatment names (comma-separated)
        ///
        /// Example: --treatment-names "Control,Low N,High N"
        #[arg(long, value_name = "NAMES", value_delimiter = ',')]
        treatment_names: Option<Vec<String>>,

        /// Replicates of each treatment per block (default from config)
        #[arg(long, value_name = "COUNT")]
        reps: Option<u32>,

        /// Seed for the layout shuffle
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Add an assessment date with every plot unentered
    AddDate {
        /// Trial file
        trial: PathBuf,

        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },

    /// Record a value for one plot; an empty value clears the cell
    Record {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        assessment: String,

        #[arg(long)]
        plot: String,

        /// Value to record ("" clears it)
        #[arg(allow_negative_numbers = true)]
        value: String,
    },

    /// Attach a note to a date and assessment type; an empty note removes it
    Note {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        assessment: String,

        text: String,
    },

    /// Fill one date and assessment type with synthetic test data
    Simulate {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        date: NaiveDate,

        #[arg(long)]
        assessment: String,

        /// Seed for the generated values
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Insert a blank plot into a block, or remove one
    Blank {
        /// Trial file
        trial: PathBuf,

        /// Block to insert into
        #[arg(long, required_unless_present = "remove")]
        block: Option<u32>,

        /// Position within the block (0 = first; past the end appends)
        #[arg(long, default_value = "0")]
        position: usize,

        /// Remove the blank plot with this id instead
        #[arg(long, value_name = "PLOT", conflicts_with = "block")]
        remove: Option<String>,
    },

    /// Reshuffle the treatments of one block (before any data is entered)
    Randomize {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        block: u32,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the ANOVA for every date of one assessment type and write a report
    Analyze {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        assessment: String,

        /// Output file path for the report (default from config)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format (markdown, json)
        #[arg(long, default_value = "markdown", value_name = "FORMAT")]
        format: OutputFormat,

        /// LSD replicate denominator (default from config)
        #[arg(long, value_name = "MODE")]
        lsd_denominator: Option<LsdDenominator>,

        /// Decimal places in the report (default from config)
        #[arg(long, value_name = "N")]
        decimals: Option<usize>,

        /// Leave the box-plot statistics out of the report
        #[arg(long)]
        no_box_plots: bool,

        /// Exit with code 2 if any date is not significant
        ///
        /// Dates without data or with degenerate degrees of freedom count as
        /// not significant.
        #[arg(long)]
        fail_on_nonsignificant: bool,
    },

    /// Export raw plot data or the treatment summary as CSV
    Export {
        /// Trial file
        trial: PathBuf,

        #[arg(long)]
        assessment: String,

        /// What to export (data, summary)
        #[arg(long, default_value = "data", value_name = "KIND")]
        kind: ExportKind,

        /// Output CSV path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Decimal places for the summary (default from config)
        #[arg(long, value_name = "N")]
        decimals: Option<usize>,
    },

    /// Copy a trial file into a library directory under a new id
    Import {
        /// Trial file to import
        source: PathBuf,

        /// Library directory (default from config)
        #[arg(long, value_name = "DIR")]
        library: Option<PathBuf>,
    },

    /// List the trials in a library directory, newest first
    List {
        /// Library directory (default from config)
        #[arg(long, value_name = "DIR")]
        library: Option<PathBuf>,
    },

    /// Generate a default .trialstat.toml configuration file
    InitConfig,
}

/// Output format for the analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// CSV export kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportKind {
    /// One row per plot, one column per date
    #[default]
    Data,
    /// Mean and standard error per treatment and date
    Summary,
}

/// Upper bound on report precision.
const MAX_DECIMALS: usize = 10;

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        match &self.command {
            Command::New {
                blocks,
                treatments,
                treatment_names,
                reps,
                name,
                ..
            } => {
                if name.trim().is_empty() {
                    return Err("Trial name must not be empty".to_string());
                }
                if *blocks == Some(0) {
                    return Err("Blocks must be at least 1".to_string());
                }
                if *treatments == Some(0) {
                    return Err("Treatments must be at least 1".to_string());
                }
                if *reps == Some(0) {
                    return Err("Reps must be at least 1".to_string());
                }
                if let (Some(count), Some(names)) = (treatments, treatment_names) {
                    if *count != names.len() {
                        return Err(format!(
                            "--treatments is {} but {} treatment names were given",
                            count,
                            names.len()
                        ));
                    }
                }
                if let Some(names) = treatment_names {
                    if names.iter().any(|n| n.trim().is_empty()) {
                        return Err("Treatment names must not be empty".to_string());
                    }
                }
            }
            Command::Analyze { decimals, .. } | Command::Export { decimals, .. } => {
                if let Some(d) = decimals {
                    if *d > MAX_DECIMALS {
                        return Err(format!("Decimals must be at most {}", MAX_DECIMALS));
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
