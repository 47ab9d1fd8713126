use std::ops::AddAssign;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Numerator/denominator pair kept separate so batches can be pooled before dividing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchCounts {
    pub matched: f64,
    pub total: f64,
}

impl MatchCounts {
    /// `matched / total`, or 0 when there is nothing to count.
    pub fn ratio(&self) -> f64 {
        if self.total > 0.0 {
            self.matched / self.total
        } else {
            0.0
        }
    }
}

impl AddAssign for MatchCounts {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.total += other.total;
    }
}

/// Correct predictions over ground-truth matches among the first `n1` rows.
pub fn matching_accuracy(
    predicted: &DMatrix<f64>,
    ground_truth: &DMatrix<f64>,
    n1: usize,
) -> Result<MatchCounts> {
    let correct = correct_matches(predicted, ground_truth, n1)?;
    Ok(MatchCounts {
        matched: correct,
        total: real_sum(ground_truth, n1),
    })
}

/// Correct predictions over all predicted matches among the first `n1` rows.
pub fn matching_precision(
    predicted: &DMatrix<f64>,
    ground_truth: &DMatrix<f64>,
    n1: usize,
) -> Result<MatchCounts> {
    let correct = correct_matches(predicted, ground_truth, n1)?;
    Ok(MatchCounts {
        matched: correct,
        total: real_sum(predicted, n1),
    })
}

/// Harmonic mean of precision and accuracy, 0 where it is undefined.
pub fn f1_score(precision: f64, accuracy: f64) -> f64 {
    let denominator = precision + accuracy;
    if denominator > 0.0 && denominator.is_finite() {
        2.0 * precision * accuracy / denominator
    } else {
        0.0
    }
}

fn correct_matches(predicted: &DMatrix<f64>, ground_truth: &DMatrix<f64>, n1: usize) -> Result<f64> {
    if predicted.shape() != ground_truth.shape() {
        return Err(MatchError::mismatch(
            "matching metric",
            format!("{:?}", ground_truth.shape()),
            format!("{:?}", predicted.shape()),
        ));
    }
    if n1 > predicted.nrows() {
        return Err(MatchError::shape(
            "matching metric",
            format!("n1={n1} exceeds {} rows", predicted.nrows()),
        ));
    }
    let prediction = predicted.rows(0, n1);
    let truth = ground_truth.rows(0, n1);
    Ok(prediction.component_mul(&truth).sum())
}

fn real_sum(matrix: &DMatrix<f64>, n1: usize) -> f64 {
    matrix.rows(0, n1).sum()
}
