//! CSV exports: raw plot data and the treatment summary.

use crate::analysis::{treatment_values, MeanSe};
use crate::models::{Plot, Trial};

/// Raw data for one assessment type.
///
/// Header `Plot,Block,Treatment,<date>...`, one row per plot in layout
/// order. Unentered cells are empty.
pub fn generate_data_csv(trial: &Trial, assessment: &str) -> String {
    let mut csv = String::from("Plot,Block,Treatment");
    for date in &trial.assessment_dates {
        csv.push(',');
        csv.push_str(&date.date.to_string());
    }
    csv.push('\n');

    for plot in trial.plots() {
        let treatment = match plot {
            Plot::Real(p) => trial.config.treatment_name(p.treatment),
            Plot::Blank(_) => "Blank".to_string(),
        };
        csv.push_str(&field(plot.id()));
        csv.push_str(&format!(",{},", plot.block()));
        csv.push_str(&field(&treatment));

        for date in &trial.assessment_dates {
            let value = date
                .observations(assessment)
                .and_then(|obs| obs.get(plot.id()))
                .map(|o| o.value.as_str())
                .unwrap_or("");
            csv.push(',');
            csv.push_str(&field(value));
        }
        csv.push('\n');
    }

    csv
}

/// Per-treatment mean and standard error for every date.
///
/// Header `Treatment,<date>_Mean,<date>_SE...`. A treatment with no data on
/// a date gets two empty cells.
pub fn generate_summary_csv(trial: &Trial, assessment: &str, decimals: usize) -> String {
    let mut csv = String::from("Treatment");
    for date in &trial.assessment_dates {
        csv.push_str(&format!(",{d}_Mean,{d}_SE", d = date.date));
    }
    csv.push('\n');

    for treatment in 0..trial.config.num_treatments {
        csv.push_str(&field(&trial.config.treatment_name(treatment)));
        for date in &trial.assessment_dates {
            match MeanSe::from_values(&treatment_values(trial, date, assessment, treatment)) {
                Some(stats) => csv.push_str(&format!(
                    ",{:.*},{:.*}",
                    decimals, stats.mean, decimals, stats.std_error
                )),
                None => csv.push_str(",,"),
            }
        }
        csv.push('\n');
    }

    csv
}

/// Quote a field when it contains a delimiter, quote or newline.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::sample_trial;

    #[test]
    fn test_generate_data_csv() {
        let mut trial = sample_trial();
        trial.layout[0].push(Plot::blank("blank-b1-1", 1));
        let csv = generate_data_csv(&trial, "Turf Quality");
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Plot,Block,Treatment,2024-05-01,2024-05-15");
        assert_eq!(lines[1], "B1-T1-R1,1,Treatment A,8,");
        assert_eq!(lines[4], "blank-b1-1,1,Blank,,");
        assert_eq!(lines.len(), 14);
    }

    #[test]
    fn test_generate_summary_csv() {
        let trial = sample_trial();
        let csv = generate_summary_csv(&trial, "Turf Quality", 2);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "Treatment,2024-05-01_Mean,2024-05-01_SE,2024-05-15_Mean,2024-05-15_SE"
        );
        assert!(lines[1].starts_with("Treatment A,8.05,0.06,"));
        assert!(lines[1].ends_with(",,"));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_field_quoting() {
        assert_eq!(field("plain"), "plain");
        assert_eq!(field("a,b"), "\"a,b\"");
        assert_eq!(field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
