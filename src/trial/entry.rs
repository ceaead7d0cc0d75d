//! Data entry: assessment dates, recorded values, notes and synthetic data.

use crate::error::TrialError;
use crate::models::{parse_finite, AssessmentDate, Observation, Trial};
use chrono::NaiveDate;
use rand::Rng;
use std::collections::BTreeMap;

/// Append an assessment date with every assessment type and every plot
/// initialised to an unentered observation.
pub fn add_assessment_date(trial: &mut Trial, date: NaiveDate) -> Result<(), TrialError> {
    if trial.date(date).is_some() {
        return Err(TrialError::DuplicateDate(date.to_string()));
    }

    let blank_sheet: BTreeMap<String, Observation> = trial
        .plots()
        .map(|p| (p.id().to_string(), Observation::empty()))
        .collect();

    let assessments = trial
        .config
        .assessment_types
        .iter()
        .map(|a| (a.name.clone(), blank_sheet.clone()))
        .collect();

    trial.assessment_dates.push(AssessmentDate { date, assessments });
    Ok(())
}

/// Record `value` for a plot. An empty string clears the cell.
///
/// Numbers outside the assessment type's range are rejected.
pub fn record_value(
    trial: &mut Trial,
    date: NaiveDate,
    assessment: &str,
    plot_id: &str,
    value: &str,
) -> Result<(), TrialError> {
    let scale = trial
        .config
        .assessment_type(assessment)
        .cloned()
        .ok_or_else(|| TrialError::UnknownAssessment(assessment.to_string()))?;

    let value = value.trim();
    let plot = trial
        .find_plot(plot_id)
        .ok_or_else(|| TrialError::UnknownPlot(plot_id.to_string()))?;
    if plot.is_blank() && !value.is_empty() {
        return Err(TrialError::BlankPlot(plot_id.to_string()));
    }

    if !value.is_empty() {
        let number = parse_finite(value).ok_or_else(|| TrialError::NotANumber {
            value: value.to_string(),
        })?;
        if !scale.contains(number) {
            return Err(TrialError::OutOfRange {
                assessment: scale.name.clone(),
                value: number,
                min: scale.min,
                max: scale.max,
            });
        }
    }

    let day = trial
        .date_mut(date)
        .ok_or_else(|| TrialError::UnknownDate(date.to_string()))?;
    day.assessments
        .entry(assessment.to_string())
        .or_default()
        .insert(plot_id.to_string(), Observation::recorded(value));
    Ok(())
}

/// Give a newly inserted plot an unentered cell on every existing date.
pub fn add_plot_cells(trial: &mut Trial, plot_id: &str) {
    for date in &mut trial.assessment_dates {
        for observations in date.assessments.values_mut() {
            observations.entry(plot_id.to_string()).or_default();
        }
    }
}

/// Drop a removed plot's cells from every date.
pub fn drop_plot_cells(trial: &mut Trial, plot_id: &str) {
    for date in &mut trial.assessment_dates {
        for observations in date.assessments.values_mut() {
            observations.remove(plot_id);
        }
    }
}

/// Attach or replace the note for a date and assessment type.
/// An empty note removes it.
pub fn set_note(
    trial: &mut Trial,
    date: NaiveDate,
    assessment: &str,
    text: &str,
) -> Result<(), TrialError> {
    if trial.date(date).is_none() {
        return Err(TrialError::UnknownDate(date.to_string()));
    }
    let key = Trial::note_key(date, assessment);
    if text.is_empty() {
        trial.notes.remove(&key);
    } else {
        trial.notes.insert(key, text.to_string());
    }
    Ok(())
}

/// Fill one date and assessment type with synthetic values.
///
/// A randomly chosen treatment scores high; the rest cluster around 60% of
/// the scale. Values are rounded to one decimal and clamped to the scale.
/// Returns the index of the favoured treatment.
pub fn simulate_date<R: Rng + ?Sized>(
    trial: &mut Trial,
    date: NaiveDate,
    assessment: &str,
    rng: &mut R,
) -> Result<usize, TrialError> {
    let scale = trial
        .config
        .assessment_type(assessment)
        .cloned()
        .ok_or_else(|| TrialError::UnknownAssessment(assessment.to_string()))?;
    if trial.date(date).is_none() {
        return Err(TrialError::UnknownDate(date.to_string()));
    }

    let best = rng.random_range(0..trial.config.num_treatments.max(1));
    let range = scale.range();
    let mid = scale.min + range * 0.6;

    let generated: Vec<(String, Observation)> = trial
        .plots()
        .filter_map(|p| p.treatment().map(|t| (p.id().to_string(), t)))
        .map(|(id, treatment)| {
            let raw = if treatment == best {
                mid + range * 0.15 + rng.random::<f64>() * range * 0.15
            } else {
                mid - range * 0.1 + rng.random::<f64>() * range * 0.25
            };
            let value = ((raw * 10.0).round() / 10.0).clamp(scale.min, scale.max);
            (id, Observation::recorded(value.to_string()))
        })
        .collect();

    let day = trial
        .date_mut(date)
        .ok_or_else(|| TrialError::UnknownDate(date.to_string()))?;
    day.assessments
        .entry(assessment.to_string())
        .or_default()
        .extend(generated);
    Ok(best)
}
