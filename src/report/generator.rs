//! Markdown and JSON report generation.
//!
//! This module renders an [`AnalysisReport`] as a Markdown document with
//! ANOVA results, grouped treatment means, the mean ± SE summary, box-plot
//! statistics and notes.

use super::{format_stat, AnalysisReport, ReportMetadata};
use crate::analysis::StatsOutcome;
use anyhow::Result;

/// Rendering switches for the Markdown report.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownOptions {
    pub decimals: usize,
    pub include_box_plots: bool,
    pub include_notes: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            decimals: 2,
            include_box_plots: true,
            include_notes: true,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &AnalysisReport, options: &MarkdownOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# TrialStat Report: {} - {}\n\n",
        report.metadata.trial_name, report.metadata.assessment.name
    ));

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report, options));
    output.push_str(&generate_anova_section(report, options.decimals));
    output.push_str(&generate_means_section(report, options.decimals));
    output.push_str(&generate_summary_section(report, options.decimals));

    if options.include_box_plots {
        output.push_str(&generate_box_plot_section(report, options.decimals));
    }
    if options.include_notes {
        output.push_str(&generate_notes_section(report));
    }

    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Trial:** {}\n", metadata.trial_name));
    section.push_str(&format!("- **Trial ID:** `{}`\n", metadata.trial_id));
    section.push_str(&format!("- **Assessment:** {}\n", metadata.assessment));
    section.push_str(&format!(
        "- **Design:** {} treatments x {} blocks x {} reps\n",
        metadata.num_treatments, metadata.num_blocks, metadata.num_reps
    ));
    let denominator = match metadata.lsd_denominator {
        crate::analysis::LsdDenominator::Blocks => "blocks",
        crate::analysis::LsdDenominator::BlocksTimesReps => "blocks x reps",
    };
    section.push_str(&format!(
        "- **LSD Replicates:** {} ({})\n",
        metadata.lsd_replicates, denominator
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push('\n');

    section
}

fn generate_table_of_contents(report: &AnalysisReport, options: &MarkdownOptions) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [ANOVA Results](#anova-results)\n");
    toc.push_str("- [Treatment Means](#treatment-means)\n");
    toc.push_str("- [Mean and Standard Error](#mean-and-standard-error)\n");
    if options.include_box_plots && !report.box_plots.is_empty() {
        toc.push_str("- [Box Plots](#box-plots)\n");
    }
    if options.include_notes && !report.notes.is_empty() {
        toc.push_str("- [Notes](#notes)\n");
    }
    toc.push('\n');

    toc
}

/// One row per date: F, LSD, MSE and the significance verdict.
fn generate_anova_section(report: &AnalysisReport, decimals: usize) -> String {
    let mut section = String::new();

    section.push_str("## ANOVA Results\n\n");

    if report.analysis.dates.is_empty() {
        section.push_str("No assessment dates recorded yet.\n\n");
        return section;
    }

    section.push_str("| Date | F-value | LSD (95%) | MSE | Result |\n");
    section.push_str("|:---|:---:|:---:|:---:|:---|\n");

    for entry in &report.analysis.dates {
        let row = match &entry.outcome {
            StatsOutcome::Computed(r) => format!(
                "| {} | {} | {} | {} | {} |\n",
                entry.date,
                format_stat(r.f_value, decimals),
                format_stat(r.lsd, decimals),
                format_stat(r.ms_error, decimals),
                if r.significant {
                    "✓ Significant (p < 0.05)"
                } else {
                    "○ Not Significant"
                }
            ),
            StatsOutcome::DegenerateDegreesOfFreedom(r) => format!(
                "| {} | n/a | n/a | n/a | Insufficient degrees of freedom (df {}, {}) |\n",
                entry.date, r.df_treatment, r.df_error
            ),
            StatsOutcome::InsufficientData => {
                format!("| {} | - | - | - | No data |\n", entry.date)
            }
        };
        section.push_str(&row);
    }
    section.push('\n');

    section
}

/// Treatment x date grid of `mean (group)`.
fn generate_means_section(report: &AnalysisReport, decimals: usize) -> String {
    let mut section = String::new();

    section.push_str("## Treatment Means\n\n");
    section.push_str("Values shown as: Mean (Group). Means sharing a letter are not separated by the LSD.\n\n");
    section.push_str(&table_header(report));

    for (treatment, name) in report.treatments.iter().enumerate() {
        section.push_str(&format!("| {} |", name));
        for entry in &report.analysis.dates {
            let cell = entry
                .outcome
                .result()
                .and_then(|r| r.treatment(treatment))
                .map(|m| format!(" {:.*} ({}) |", decimals, m.mean, m.group))
                .unwrap_or_else(|| " - |".to_string());
            section.push_str(&cell);
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_summary_section(report: &AnalysisReport, decimals: usize) -> String {
    let mut section = String::new();

    section.push_str("## Mean and Standard Error\n\n");
    section.push_str("Values shown as: Mean ± Standard Error\n\n");
    section.push_str(&table_header(report));

    for row in &report.summary {
        section.push_str(&format!("| {} |", row.treatment_name));
        for cell in &row.cells {
            let text = match cell {
                Some(stats) if stats.shows_error() => format!(
                    " {:.*} ± {:.*} |",
                    decimals, stats.mean, decimals, stats.std_error
                ),
                Some(stats) => format!(" {:.*} |", decimals, stats.mean),
                None => " - |".to_string(),
            };
            section.push_str(&text);
        }
        section.push('\n');
    }
    section.push('\n');

    section
}

fn generate_box_plot_section(report: &AnalysisReport, decimals: usize) -> String {
    if report.box_plots.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Box Plots\n\n");

    if let Some((lo, hi)) = report.value_range {
        section.push_str(&format!(
            "Shared scale across all dates: {:.*} to {:.*}\n\n",
            decimals, lo, decimals, hi
        ));
    }

    let mut current = None;
    for entry in &report.box_plots {
        if current != Some(entry.date) {
            if current.is_some() {
                section.push('\n');
            }
            current = Some(entry.date);
            section.push_str(&format!("### {}\n\n", entry.date));
            section.push_str("| Treatment | Min | Q1 | Mean | Q3 | Max |\n");
            section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
        }
        let s = &entry.stats;
        section.push_str(&format!(
            "| {} | {:.*} | {:.*} | {:.*} | {:.*} | {:.*} |\n",
            entry.treatment_name,
            decimals,
            s.min,
            decimals,
            s.q1,
            decimals,
            s.mean,
            decimals,
            s.q3,
            decimals,
            s.max
        ));
    }
    section.push('\n');

    section
}

fn generate_notes_section(report: &AnalysisReport) -> String {
    if report.notes.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Notes\n\n");
    for note in &report.notes {
        section.push_str(&format!("- **{}:** {}\n", note.date, note.text));
    }
    section.push('\n');

    section
}

fn table_header(report: &AnalysisReport) -> String {
    let mut header = String::from("| Treatment |");
    let mut rule = String::from("|:---|");
    for date in &report.dates {
        header.push_str(&format!(" {} |", date));
        rule.push_str(":---:|");
    }
    format!("{}\n{}\n", header, rule)
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by TrialStat v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &AnalysisReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
