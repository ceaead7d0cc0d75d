//! One-way ANOVA with LSD mean separation.
//!
//! `compute_stats` is a pure function of its inputs: it borrows the
//! observations for one (date, assessment type) pair plus a layout lookup,
//! and returns a freshly built [`StatsOutcome`] on every call.

use crate::error::AnalysisError;
use crate::models::{spreadsheet_letters, LayoutIndex, Observation, Plot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Fixed critical F value used for the significance flag.
pub const F_CRITICAL: f64 = 3.0;

/// z value for a two-sided 95% LSD.
pub const LSD_Z: f64 = 1.96;

/// Resolves a plot identifier to its layout entry.
pub trait PlotLookup {
    fn lookup(&self, plot_id: &str) -> Option<&Plot>;
}

impl PlotLookup for LayoutIndex<'_> {
    fn lookup(&self, plot_id: &str) -> Option<&Plot> {
        self.get(plot_id)
    }
}

impl PlotLookup for HashMap<String, Plot> {
    fn lookup(&self, plot_id: &str) -> Option<&Plot> {
        self.get(plot_id)
    }
}

/// Design inputs for one engine call.
#[derive(Debug, Clone, Copy)]
pub struct AnovaDesign<'a> {
    /// Display names, indexed by treatment.
    pub treatment_names: &'a [String],
    /// Number of treatments in the design (not just those observed).
    pub num_treatments: usize,
    /// Effective replicate count in the LSD denominator.
    pub lsd_replicates: usize,
}

/// Mean and grouping for one treatment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentMeanGroup {
    pub treatment: usize,
    pub treatment_name: String,
    pub mean: f64,
    pub n: usize,
    pub values: Vec<f64>,
    pub group: String,
}

/// ANOVA statistics for one date. Fields may be non-finite when the
/// degrees of freedom are degenerate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Treatments sorted by mean, highest first.
    pub means: Vec<TreatmentMeanGroup>,
    pub grand_mean: f64,
    pub ss_treatment: f64,
    pub ss_error: f64,
    pub df_treatment: i64,
    pub df_error: i64,
    pub f_value: f64,
    pub significant: bool,
    pub lsd: f64,
    pub ms_error: f64,
    pub insufficient_degrees_of_freedom: bool,
}

impl AnalysisResult {
    /// Whether F, LSD and MSE are all displayable numbers.
    pub fn has_finite_statistics(&self) -> bool {
        self.f_value.is_finite() && self.lsd.is_finite() && self.ms_error.is_finite()
    }

    pub fn treatment(&self, treatment: usize) -> Option<&TreatmentMeanGroup> {
        self.means.iter().find(|m| m.treatment == treatment)
    }

    /// Total number of observations that went into the analysis.
    pub fn total_n(&self) -> usize {
        self.means.iter().map(|m| m.n).sum()
    }
}

/// What the engine produced for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "camelCase")]
pub enum StatsOutcome {
    Computed(AnalysisResult),
    /// No entered, numeric observations.
    InsufficientData,
    /// Means are valid but `df_treatment` or `df_error` is not positive,
    /// so F, LSD and MSE are not meaningful.
    DegenerateDegreesOfFreedom(AnalysisResult),
}

impl StatsOutcome {
    /// The result, if any means were computed.
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            StatsOutcome::Computed(r) | StatsOutcome::DegenerateDegreesOfFreedom(r) => Some(r),
            StatsOutcome::InsufficientData => None,
        }
    }

    pub fn is_significant(&self) -> bool {
        matches!(self, StatsOutcome::Computed(r) if r.significant)
    }
}

/// Run the one-way ANOVA and LSD grouping for one date.
///
/// Observations that are unentered or non-numeric are ignored, as are
/// observations on blank plots. An observation whose plot id the layout
/// cannot resolve is an error.
pub fn compute_stats<'a, K, L>(
    observations: impl IntoIterator<Item = (&'a K, &'a Observation)>,
    layout: &L,
    design: &AnovaDesign<'_>,
) -> Result<StatsOutcome, AnalysisError>
where
    K: AsRef<str> + ?Sized + 'a,
    L: PlotLookup + ?Sized,
{
    let mut values: Vec<(usize, f64)> = Vec::new();
    for (plot_id, obs) in observations {
        let Some(value) = obs.numeric_value() else {
            continue;
        };
        let plot_id: &str = plot_id.as_ref();
        let plot = layout
            .lookup(plot_id)
            .ok_or_else(|| AnalysisError::UnknownPlot {
                plot_id: plot_id.to_string(),
            })?;
        if let Some(treatment) = plot.treatment() {
            values.push((treatment, value));
        }
    }

    if values.is_empty() {
        return Ok(StatsOutcome::InsufficientData);
    }

    let mut groups: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
    for &(treatment, value) in &values {
        groups.entry(treatment).or_default().push(value);
    }

    let means: Vec<TreatmentMeanGroup> = groups
        .into_iter()
        .map(|(treatment, vals)| TreatmentMeanGroup {
            treatment,
            treatment_name: treatment_name(design.treatment_names, treatment),
            mean: mean(&vals),
            n: vals.len(),
            values: vals,
            group: String::new(),
        })
        .collect();

    let treatment_means: HashMap<usize, f64> =
        means.iter().map(|m| (m.treatment, m.mean)).collect();

    let grand_mean = values.iter().map(|&(_, v)| v).sum::<f64>() / values.len() as f64;

    let ss_treatment: f64 = means
        .iter()
        .map(|m| m.n as f64 * (m.mean - grand_mean).powi(2))
        .sum();
    let ss_error: f64 = values
        .iter()
        .map(|(t, v)| (v - treatment_means[t]).powi(2))
        .sum();

    let df_treatment = design.num_treatments as i64 - 1;
    let df_error = values.len() as i64 - design.num_treatments as i64;

    let ms_treatment = ss_treatment / df_treatment as f64;
    let ms_error = ss_error / df_error as f64;
    let f_value = ms_treatment / ms_error;
    let significant = f_value > F_CRITICAL;
    let lsd = LSD_Z * (2.0 * ms_error / design.lsd_replicates as f64).sqrt();

    let means = assign_groups(means, lsd);
    let degenerate = df_treatment <= 0 || df_error <= 0;

    let result = AnalysisResult {
        means,
        grand_mean,
        ss_treatment,
        ss_error,
        df_treatment,
        df_error,
        f_value,
        significant,
        lsd,
        ms_error,
        insufficient_degrees_of_freedom: degenerate,
    };

    if degenerate {
        Ok(StatsOutcome::DegenerateDegreesOfFreedom(result))
    } else {
        Ok(StatsOutcome::Computed(result))
    }
}

/// Sort by mean descending and assign letters with the greedy
/// earliest-match rule.
///
/// Each treatment takes the letter of the *position* of the first earlier
/// treatment within `lsd` of it, or the letter of its own position when
/// none is. This is not a transitive grouping.
pub fn assign_groups(mut means: Vec<TreatmentMeanGroup>, lsd: f64) -> Vec<TreatmentMeanGroup> {
    // Stable: ties keep ascending treatment order.
    means.sort_by(|a, b| b.mean.total_cmp(&a.mean));

    let sorted: Vec<f64> = means.iter().map(|m| m.mean).collect();
    for (idx, entry) in means.iter_mut().enumerate() {
        let position = (0..idx)
            .find(|&i| (sorted[idx] - sorted[i]).abs() <= lsd)
            .unwrap_or(idx);
        entry.group = spreadsheet_letters(position);
    }

    means
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn treatment_name(names: &[String], treatment: usize) -> String {
    names
        .get(treatment)
        .cloned()
        .unwrap_or_else(|| format!("T{}", treatment + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{}", i + 1)).collect()
    }

    /// Layout and observations with one plot per value, blocks numbered by
    /// position within each treatment.
    fn fixture(per_treatment: &[&[f64]]) -> (HashMap<String, Plot>, BTreeMap<String, Observation>) {
        let mut layout = HashMap::new();
        let mut obs = BTreeMap::new();
        for (t, vals) in per_treatment.iter().enumerate() {
            for (b, v) in vals.iter().enumerate() {
                let id = format!("B{}-T{}-R1", b + 1, t + 1);
                layout.insert(id.clone(), Plot::real(id.clone(), b as u32 + 1, t));
                obs.insert(id, Observation::recorded(v.to_string()));
            }
        }
        (layout, obs)
    }

    fn run(
        layout: &HashMap<String, Plot>,
        obs: &BTreeMap<String, Observation>,
        num_treatments: usize,
        reps: usize,
    ) -> StatsOutcome {
        let names = names(num_treatments);
        let design = AnovaDesign {
            treatment_names: &names,
            num_treatments,
            lsd_replicates: reps,
        };
        compute_stats(obs, layout, &design).unwrap()
    }

    fn group(label: &str, mean: f64) -> TreatmentMeanGroup {
        TreatmentMeanGroup {
            treatment: 0,
            treatment_name: label.to_string(),
            mean,
            n: 1,
            values: vec![mean],
            group: String::new(),
        }
    }

    #[test]
    fn test_end_to_end_three_treatments() {
        let (layout, obs) = fixture(&[
            &[8.0, 8.2, 7.9, 8.1],
            &[6.0, 6.1, 5.9, 6.2],
            &[9.0, 9.3, 8.8, 9.1],
        ]);
        let outcome = run(&layout, &obs, 3, 4);
        let StatsOutcome::Computed(result) = outcome else {
            panic!("expected a computed result, got {:?}", outcome);
        };

        assert!((result.treatment(0).unwrap().mean - 8.05).abs() < 1e-6);
        assert!((result.treatment(1).unwrap().mean - 6.05).abs() < 1e-6);
        assert!((result.treatment(2).unwrap().mean - 9.05).abs() < 1e-6);
        assert!((result.grand_mean - 7.716_666_666).abs() < 1e-6);
        assert!(result.significant);
        assert!(result.has_finite_statistics());
        assert!(!result.insufficient_degrees_of_freedom);

        let order: Vec<(usize, &str)> = result
            .means
            .iter()
            .map(|m| (m.treatment, m.group.as_str()))
            .collect();
        assert_eq!(order, vec![(2, "a"), (0, "b"), (1, "c")]);
        assert_eq!(result.means[0].treatment_name, "T3");
    }

    #[test]
    fn test_counts_match_filtered_observations() {
        let (layout, mut obs) = fixture(&[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]]);
        obs.insert("B1-T1-R1".to_string(), Observation::empty());
        obs.insert("B2-T2-R1".to_string(), Observation::recorded("n/a"));

        let outcome = run(&layout, &obs, 2, 3);
        let result = outcome.result().unwrap();
        assert_eq!(result.total_n(), 4);
        assert_eq!(result.treatment(0).unwrap().values, vec![2.0, 3.0]);
        assert_eq!(result.treatment(1).unwrap().values, vec![4.0, 6.0]);
    }

    #[test]
    fn test_grand_mean_is_pooled_not_mean_of_means() {
        let (layout, obs) = fixture(&[&[1.0], &[10.0, 10.0, 10.0]]);
        let outcome = run(&layout, &obs, 2, 2);
        let result = outcome.result().unwrap();
        // pooled: 31 / 4; mean of means would be 5.5
        assert!((result.grand_mean - 7.75).abs() < EPS);
    }

    #[test]
    fn test_sum_of_squares_decomposition() {
        let (layout, obs) = fixture(&[&[3.1, 4.7, 2.2], &[5.5, 6.0], &[9.9, 8.1, 7.4, 8.8]]);
        let outcome = run(&layout, &obs, 3, 3);
        let result = outcome.result().unwrap();

        let all: Vec<f64> = result.means.iter().flat_map(|m| m.values.clone()).collect();
        let ss_total: f64 = all
            .iter()
            .map(|v| (v - result.grand_mean).powi(2))
            .sum();
        assert!((result.ss_treatment + result.ss_error - ss_total).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_calls_are_identical() {
        let (layout, obs) = fixture(&[&[1.0, 2.5, 2.0], &[3.0, 3.5, 4.0]]);
        let first = run(&layout, &obs, 2, 3);
        let second = run(&layout, &obs, 2, 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_greedy_grouping_is_order_dependent() {
        let means = vec![group("x", 10.0), group("y", 9.0), group("z", 8.0)];
        let grouped = assign_groups(means, 1.5);
        let labels: Vec<&str> = grouped.iter().map(|m| m.group.as_str()).collect();
        assert_eq!(labels, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_grouping_sorts_descending_before_labeling() {
        let means = vec![group("low", 2.0), group("high", 20.0), group("mid", 11.0)];
        let grouped = assign_groups(means, 0.5);
        let names: Vec<&str> = grouped.iter().map(|m| m.treatment_name.as_str()).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
        let labels: Vec<&str> = grouped.iter().map(|m| m.group.as_str()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tie_band_shares_letter() {
        let means = vec![group("p", 7.0), group("q", 6.8), group("r", 4.0)];
        let grouped = assign_groups(means, 0.5);
        assert_eq!(grouped[0].group, grouped[1].group);
        assert_ne!(grouped[2].group, grouped[0].group);
        assert_eq!(grouped[2].group, "c");
    }

    #[test]
    fn test_single_observation_is_degenerate() {
        let (layout, obs) = fixture(&[&[5.0]]);
        let outcome = run(&layout, &obs, 3, 4);
        let StatsOutcome::DegenerateDegreesOfFreedom(result) = outcome else {
            panic!("expected degenerate degrees of freedom");
        };
        assert!(result.insufficient_degrees_of_freedom);
        assert!(result.df_error <= 0);
        assert!(!result.has_finite_statistics());
        assert_eq!(result.means.len(), 1);
        assert_eq!(result.means[0].group, "a");
    }

    #[test]
    fn test_single_observation_single_treatment_has_non_finite_mse() {
        let (layout, obs) = fixture(&[&[5.0]]);
        let outcome = run(&layout, &obs, 1, 1);
        let result = outcome.result().unwrap();
        assert_eq!(result.df_error, 0);
        assert!(!result.ms_error.is_finite());
        assert!(!result.f_value.is_finite());
        assert!(!result.significant);
    }

    #[test]
    fn test_single_treatment_is_degenerate() {
        let (layout, obs) = fixture(&[&[5.0, 6.0, 7.0]]);
        let outcome = run(&layout, &obs, 1, 3);
        assert!(matches!(outcome, StatsOutcome::DegenerateDegreesOfFreedom(_)));
        assert!(!outcome.is_significant());
    }

    #[test]
    fn test_no_entered_values_is_insufficient_data() {
        let (layout, mut obs) = fixture(&[&[1.0], &[2.0]]);
        for o in obs.values_mut() {
            *o = Observation::empty();
        }
        assert_eq!(run(&layout, &obs, 2, 1), StatsOutcome::InsufficientData);

        let empty: BTreeMap<String, Observation> = BTreeMap::new();
        assert_eq!(run(&layout, &empty, 2, 1), StatsOutcome::InsufficientData);
    }

    #[test]
    fn test_blank_plots_are_excluded() {
        let (mut layout, mut obs) = fixture(&[&[1.0, 2.0], &[3.0, 4.0]]);
        layout.insert("blank-b1-1".to_string(), Plot::blank("blank-b1-1", 1));
        obs.insert("blank-b1-1".to_string(), Observation::recorded("100"));

        let outcome = run(&layout, &obs, 2, 2);
        let result = outcome.result().unwrap();
        assert_eq!(result.total_n(), 4);
        assert!((result.grand_mean - 2.5).abs() < EPS);
    }

    #[test]
    fn test_unknown_plot_is_rejected() {
        let (layout, mut obs) = fixture(&[&[1.0], &[2.0]]);
        obs.insert("ghost".to_string(), Observation::recorded("3"));

        let names = names(2);
        let design = AnovaDesign {
            treatment_names: &names,
            num_treatments: 2,
            lsd_replicates: 1,
        };
        let err = compute_stats(&obs, &layout, &design).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::UnknownPlot {
                plot_id: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_unentered_unknown_plot_is_ignored() {
        let (layout, mut obs) = fixture(&[&[1.0, 2.0], &[3.0, 4.0]]);
        obs.insert("ghost".to_string(), Observation::empty());
        assert!(run(&layout, &obs, 2, 2).result().is_some());
    }

    #[test]
    fn test_lsd_uses_replicate_denominator() {
        let (layout, obs) = fixture(&[&[1.0, 2.0, 3.0], &[4.0, 6.0, 5.0]]);
        let by_blocks = run(&layout, &obs, 2, 3);
        let by_cells = run(&layout, &obs, 2, 6);
        let r3 = by_blocks.result().unwrap();
        let r6 = by_cells.result().unwrap();

        assert_eq!(r3.ms_error, r6.ms_error);
        let expected = LSD_Z * (2.0 * r3.ms_error / 3.0).sqrt();
        assert!((r3.lsd - expected).abs() < EPS);
        assert!(r6.lsd < r3.lsd);
    }

    #[test]
    fn test_identical_values_do_not_panic() {
        let (layout, obs) = fixture(&[&[5.0, 5.0], &[5.0, 5.0]]);
        let outcome = run(&layout, &obs, 2, 2);
        let result = outcome.result().unwrap();
        assert!(result.f_value.is_nan());
        assert!(!result.significant);
        assert_eq!(result.means[0].group, "a");
        assert_eq!(result.means[1].group, "a");
    }

    #[test]
    fn test_outcome_serializes_with_camel_case_fields() {
        let (layout, obs) = fixture(&[&[1.0, 2.0], &[5.0, 6.0]]);
        let outcome = run(&layout, &obs, 2, 2);
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"computed\""));
        assert!(json.contains("\"fValue\""));
        assert!(json.contains("\"msError\""));
        assert!(json.contains("\"treatmentName\""));
    }
}
