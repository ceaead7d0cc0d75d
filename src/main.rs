//! TrialStat - field-trial data collection and ANOVA summaries
//!
//! A CLI tool for laying out randomized complete block trials, recording
//! assessment data per plot and date, and reporting treatment means with
//! LSD groupings.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid trial file, unknown plot, I/O failure, etc.)
//!   2 - A date was not significant and --fail-on-nonsignificant was set

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;
use trialstat::analysis::{analyze_series, StatsOutcome};
use trialstat::cli::{Args, Command, ExportKind, OutputFormat};
use trialstat::config::{Config, CONFIG_FILE_NAME};
use trialstat::models::{default_treatment_names, Trial, TrialConfig};
use trialstat::report::generator::MarkdownOptions;
use trialstat::report::{self, AnalysisReport};
use trialstat::trial;

fn main() {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if matches!(args.command, Command::InitConfig) {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Config is read before logging so [general] verbose can set the level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(config.log_level(&args));

    info!("TrialStat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, &config) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .trialstat.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize trial defaults, the LSD denominator and report options.");
    Ok(())
}

/// Initialize logging at the resolved verbosity.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Dispatch a command. Returns the process exit code.
fn run(args: Args, config: &Config) -> Result<i32> {
    match args.command {
        Command::New {
            output,
            name,
            treatment_names,
            seed,
            ..
        } => handle_new(config, &output, name, treatment_names, seed),
        Command::AddDate { trial: path, date } => {
            let mut t = trial::load_trial(&path)?;
            trial::add_assessment_date(&mut t, date)?;
            trial::save_trial(&mut t, &path)?;
            println!(
                "📅 Added {} ({} plots x {} assessment types)",
                date,
                t.plots().count(),
                t.config.assessment_types.len()
            );
            Ok(0)
        }
        Command::Record {
            trial: path,
            date,
            assessment,
            plot,
            value,
        } => {
            let mut t = trial::load_trial(&path)?;
            trial::record_value(&mut t, date, &assessment, &plot, &value)?;
            trial::save_trial(&mut t, &path)?;
            if value.is_empty() {
                println!("🧹 Cleared {} / {} / {}", date, assessment, plot);
            } else {
                println!("✏️  {} / {} / {} = {}", date, assessment, plot, value);
            }
            Ok(0)
        }
        Command::Note {
            trial: path,
            date,
            assessment,
            text,
        } => {
            let mut t = trial::load_trial(&path)?;
            trial::set_note(&mut t, date, &assessment, &text)?;
            trial::save_trial(&mut t, &path)?;
            println!("📝 Note saved for {} / {}", date, assessment);
            Ok(0)
        }
        Command::Simulate {
            trial: path,
            date,
            assessment,
            seed,
        } => {
            let mut t = trial::load_trial(&path)?;
            let mut rng = make_rng(seed);
            let best = trial::simulate_date(&mut t, date, &assessment, &mut rng)?;
            trial::save_trial(&mut t, &path)?;
            println!(
                "🎲 Filled {} / {} with test data (favoured: {})",
                date,
                assessment,
                t.config.treatment_name(best)
            );
            Ok(0)
        }
        Command::Blank {
            trial: path,
            block,
            position,
            remove,
        } => {
            let mut t = trial::load_trial(&path)?;
            match (remove, block) {
                (Some(id), _) => {
                    trial::remove_blank(&mut t.layout, &id)?;
                    trial::drop_plot_cells(&mut t, &id);
                    println!("➖ Removed blank plot {}", id);
                }
                (None, Some(block)) => {
                    let id = trial::insert_blank(&mut t.layout, block, position)?;
                    trial::add_plot_cells(&mut t, &id);
                    println!("➕ Inserted blank plot {} into block {}", id, block);
                }
                (None, None) => anyhow::bail!("Either --block or --remove is required"),
            }
            trial::save_trial(&mut t, &path)?;
            Ok(0)
        }
        Command::Randomize {
            trial: path,
            block,
            seed,
        } => {
            let mut t = trial::load_trial(&path)?;
            if has_entered_data(&t) {
                anyhow::bail!("Layout is locked: data has already been entered for this trial");
            }
            trial::randomize_block(&mut t.layout, block, &mut make_rng(seed))?;
            trial::save_trial(&mut t, &path)?;
            println!("🔀 Reshuffled block {}", block);
            Ok(0)
        }
        Command::Analyze {
            trial: path,
            assessment,
            format,
            fail_on_nonsignificant,
            ..
        } => handle_analyze(config, &path, &assessment, format, fail_on_nonsignificant),
        Command::Export {
            trial: path,
            assessment,
            kind,
            output,
            ..
        } => {
            let t = trial::load_trial(&path)?;
            if t.config.assessment_type(&assessment).is_none() {
                anyhow::bail!("No assessment type named '{}'", assessment);
            }
            let csv = match kind {
                ExportKind::Data => report::generate_data_csv(&t, &assessment),
                ExportKind::Summary => {
                    report::generate_summary_csv(&t, &assessment, config.report.decimals)
                }
            };
            std::fs::write(&output, csv)
                .with_context(|| format!("Failed to write CSV to {}", output.display()))?;
            println!("✅ Exported {:?} CSV to {}", kind, output.display());
            Ok(0)
        }
        Command::Import { source, .. } => {
            let library = PathBuf::from(&config.general.library);
            let target = trial::import_trial(&source, &library)?;
            println!("📥 Imported trial to {}", target.display());
            Ok(0)
        }
        Command::List { .. } => {
            let library = PathBuf::from(&config.general.library);
            let entries = trial::list_trials(&library)?;
            if entries.is_empty() {
                println!("   No trials found in {}", library.display());
            }
            for entry in &entries {
                println!(
                    "📄 {} [{}] - {} plots, {} dates, modified {} ({})",
                    entry.name,
                    entry.id,
                    entry.plots,
                    entry.dates,
                    entry.last_modified.format("%Y-%m-%d %H:%M"),
                    entry.path.display()
                );
            }
            Ok(0)
        }
        Command::InitConfig => unreachable!("init-config is handled before dispatch"),
    }
}

/// Create a trial with a generated layout.
fn handle_new(
    config: &Config,
    output: &Path,
    name: String,
    treatment_names: Option<Vec<String>>,
    seed: Option<u64>,
) -> Result<i32> {
    if output.exists() {
        anyhow::bail!("{} already exists", output.display());
    }

    let num_treatments = config.trial.num_treatments;
    let treatments = treatment_names.unwrap_or_else(|| default_treatment_names(num_treatments));

    let trial_config = TrialConfig {
        trial_name: name,
        num_blocks: config.trial.num_blocks,
        num_treatments,
        num_reps: config.trial.num_reps,
        treatments,
        assessment_types: config.trial.assessment_types.clone(),
    };
    trial_config
        .validate()
        .context("Invalid trial settings (check [trial] in the config file)")?;

    let layout = trial::generate_layout(&trial_config, &mut make_rng(seed));
    let mut t = Trial::new(trial_config, layout);
    trial::save_trial(&mut t, output)?;

    println!("🌱 Created trial '{}'", t.name);
    println!(
        "   {} treatments x {} blocks x {} reps = {} plots",
        t.config.num_treatments,
        t.config.num_blocks,
        t.config.num_reps,
        t.plots().count()
    );
    println!("   Saved to {}", output.display());
    Ok(0)
}

/// Analyse one assessment type and write the report.
fn handle_analyze(
    config: &Config,
    path: &Path,
    assessment: &str,
    format: OutputFormat,
    fail_on_nonsignificant: bool,
) -> Result<i32> {
    let t = trial::load_trial(path)?;
    let scale = t
        .config
        .assessment_type(assessment)
        .cloned()
        .with_context(|| format!("No assessment type named '{}'", assessment))?;

    println!("🔬 Analysing {} for '{}'...", assessment, t.name);
    let series = analyze_series(&t, assessment, config.analysis.lsd_denominator)?;
    let nonsignificant = series.nonsignificant_dates();

    let analysis_report = AnalysisReport::build(&t, &scale, series);
    let output = match format {
        OutputFormat::Json => report::generate_json_report(&analysis_report)?,
        OutputFormat::Markdown => {
            let options = MarkdownOptions {
                decimals: config.report.decimals,
                include_box_plots: config.report.include_box_plots,
                include_notes: config.report.include_notes,
            };
            report::generate_markdown_report(&analysis_report, &options)
        }
    };

    let output_path = PathBuf::from(&config.general.output);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    println!("\n📊 Analysis Summary:");
    for entry in &analysis_report.analysis.dates {
        let line = match &entry.outcome {
            StatsOutcome::Computed(r) if r.significant => {
                format!("✓ significant (F = {:.2})", r.f_value)
            }
            StatsOutcome::Computed(r) => format!("○ not significant (F = {:.2})", r.f_value),
            StatsOutcome::DegenerateDegreesOfFreedom(_) => {
                "⚠️  insufficient degrees of freedom".to_string()
            }
            StatsOutcome::InsufficientData => "- no data".to_string(),
        };
        println!("   {}: {}", entry.date, line);
    }
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    if fail_on_nonsignificant && !nonsignificant.is_empty() {
        let dates: Vec<String> = nonsignificant.iter().map(NaiveDate::to_string).collect();
        eprintln!(
            "\n⛔ Not significant on {}. Failing (exit code 2).",
            dates.join(", ")
        );
        return Ok(2);
    }

    Ok(0)
}

fn has_entered_data(t: &Trial) -> bool {
    t.assessment_dates
        .iter()
        .flat_map(|d| d.assessments.values())
        .flat_map(|obs| obs.values())
        .any(|o| o.entered)
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Failed to load {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
