use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Per-threshold numerators and denominators of one PCK evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PckCounts {
    pub matched: Vec<f64>,
    pub total: Vec<f64>,
}

/// Percentage of correct keypoints for a single pair.
///
/// `candidates` holds predicted candidate coordinates (`N2_max × D`),
/// `ground_truth` the true coordinates of the source points (`N1_max × D`), and
/// `correspondence` a permutation or soft matrix (`N1_max × N2_max`) that is
/// reduced to its row argmax. A real row whose correspondence is all zero has no
/// prediction and counts as a miss; it is not scored against candidate 0. This
/// matters when `n1 > n2`, where a permutation leaves `n1 - n2` real rows empty
/// but they stay in the denominator. A point is correct at threshold `t` when
/// its distance is strictly below `t`.
pub fn pck(
    candidates: &DMatrix<f64>,
    ground_truth: &DMatrix<f64>,
    correspondence: &DMatrix<f64>,
    thresholds: &[f64],
    n1: usize,
) -> Result<PckCounts> {
    if correspondence.nrows() != ground_truth.nrows() {
        return Err(MatchError::mismatch(
            "pck ground truth rows",
            correspondence.nrows(),
            ground_truth.nrows(),
        ));
    }
    if correspondence.ncols() != candidates.nrows() {
        return Err(MatchError::mismatch(
            "pck candidate rows",
            correspondence.ncols(),
            candidates.nrows(),
        ));
    }
    if candidates.ncols() != ground_truth.ncols() {
        return Err(MatchError::mismatch(
            "pck coordinate dimension",
            ground_truth.ncols(),
            candidates.ncols(),
        ));
    }
    if n1 > ground_truth.nrows() {
        return Err(MatchError::shape(
            "pck",
            format!("n1={n1} exceeds {} ground-truth rows", ground_truth.nrows()),
        ));
    }

    let distances: Vec<Option<f64>> = (0..n1)
        .map(|i| {
            row_argmax(correspondence, i)
                .map(|a| (candidates.row(a) - ground_truth.row(i)).norm())
        })
        .collect();

    let matched = thresholds
        .iter()
        .map(|threshold| {
            distances
                .iter()
                .filter(|d| matches!(d, Some(d) if d < threshold))
                .count() as f64
        })
        .collect();
    Ok(PckCounts {
        matched,
        total: vec![n1 as f64; thresholds.len()],
    })
}

/// First column holding the row maximum, or `None` for a row with no positive entry.
fn row_argmax(matrix: &DMatrix<f64>, row: usize) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (col, &value) in matrix.row(row).iter().enumerate() {
        if value <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, top)| value > top) {
            best = Some((col, value));
        }
    }
    best.map(|(col, _)| col)
}

/// Pools PCK counts across pairs and batches, dividing only when asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PckAccumulator {
    matched: Vec<f64>,
    total: Vec<f64>,
}

impl PckAccumulator {
    pub fn new(thresholds: usize) -> Self {
        Self {
            matched: vec![0.0; thresholds],
            total: vec![0.0; thresholds],
        }
    }

    pub fn add(&mut self, counts: &PckCounts) -> Result<()> {
        if counts.matched.len() != self.matched.len() || counts.total.len() != self.total.len() {
            return Err(MatchError::mismatch(
                "pck accumulator thresholds",
                self.matched.len(),
                counts.matched.len(),
            ));
        }
        for (acc, value) in self.matched.iter_mut().zip(&counts.matched) {
            *acc += value;
        }
        for (acc, value) in self.total.iter_mut().zip(&counts.total) {
            *acc += value;
        }
        Ok(())
    }

    pub fn merge(&mut self, other: &PckAccumulator) -> Result<()> {
        self.add(&PckCounts {
            matched: other.matched.clone(),
            total: other.total.clone(),
        })
    }

    /// Pooled `matched / total` per threshold, 0 where nothing was counted.
    pub fn ratios(&self) -> Vec<f64> {
        self.matched
            .iter()
            .zip(&self.total)
            .map(|(m, t)| if *t > 0.0 { m / t } else { 0.0 })
            .collect()
    }
}
