//! Offline evaluation of batched predictions.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::predictor::PredictionResult;

/// Fraction of positions where `predicted` equals `actual`.
///
/// Labels are compared exactly; for float labels, round or binarize before
/// calling.
///
/// ```
/// use fmrec_serving::compute_accuracy;
///
/// assert_eq!(compute_accuracy(&[4, 5, 3], &[4, 5, 3]).unwrap(), 1.0);
/// assert!((compute_accuracy(&[4, 5, 3], &[4, 5, 2]).unwrap() - 2.0 / 3.0).abs() < 1e-12);
/// ```
pub fn compute_accuracy<L: PartialEq>(predicted: &[L], actual: &[L]) -> Result<f64, ValidationError> {
    check_lengths(predicted.len(), actual.len())?;
    let correct = count_matches(predicted, actual);
    Ok(correct as f64 / actual.len() as f64)
}

fn check_lengths(predicted: usize, actual: usize) -> Result<(), ValidationError> {
    if predicted != actual {
        return Err(ValidationError::LengthMismatch { predicted, actual });
    }
    if actual == 0 {
        return Err(ValidationError::Empty);
    }
    Ok(())
}

fn count_matches<L: PartialEq>(predicted: &[L], actual: &[L]) -> usize {
    predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count()
}

/// Summary of a prediction run against ground-truth labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Rows evaluated.
    pub count: usize,
    /// Rows whose predicted label matched.
    pub correct: usize,
    /// `correct / count`.
    pub accuracy: f64,
    /// Mean of `|score - label|`.
    pub mean_absolute_error: f64,
}

impl EvaluationReport {
    /// Compares results with labels row by row.
    pub fn from_results(
        results: &[PredictionResult],
        labels: &[f32],
    ) -> Result<Self, ValidationError> {
        check_lengths(results.len(), labels.len())?;

        let predicted: Vec<f32> = results.iter().map(|r| r.predicted_label).collect();
        let correct = count_matches(&predicted, labels);
        let abs_error: f64 = results
            .iter()
            .zip(labels)
            .map(|(r, &label)| (f64::from(r.score) - f64::from(label)).abs())
            .sum();

        let count = labels.len();
        Ok(Self {
            count,
            correct,
            accuracy: correct as f64 / count as f64,
            mean_absolute_error: abs_error / count as f64,
        })
    }
}
