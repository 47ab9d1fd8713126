//! Batched entry points over `batch × rows × cols` tensors with per-pair real counts.

use nalgebra::DMatrix;
use ndarray::{Array3, ArrayView2, Axis};
use rayon::prelude::*;

use crate::assignment::match_permutation;
use crate::config::{BiStochasticConfig, PowerIterationConfig, VotingConfig};
use crate::error::{MatchError, Result};
use crate::graph::PairShape;
use crate::normalize::{normalize_bistochastic, vote};
use crate::spectral::solve_spectral;

pub fn to_dmatrix(view: ArrayView2<'_, f64>) -> DMatrix<f64> {
    let (rows, cols) = view.dim();
    DMatrix::from_fn(rows, cols, |r, c| view[[r, c]])
}

/// Score matrices `batch × N1_max × N2_max` from affinities `batch × D × D`.
pub fn solve_spectral_batch(
    affinities: &Array3<f64>,
    shapes: &[PairShape],
    config: &PowerIterationConfig,
) -> Result<Array3<f64>> {
    let batch = affinities.len_of(Axis(0));
    if shapes.len() != batch {
        return Err(MatchError::mismatch("spectral batch shapes", batch, shapes.len()));
    }
    let Some(first) = shapes.first() else {
        return Ok(Array3::zeros((0, 0, 0)));
    };
    if shapes
        .iter()
        .any(|s| s.n1_max != first.n1_max || s.n2_max != first.n2_max)
    {
        return Err(MatchError::shape(
            "spectral batch",
            "all pairs in a batch must share N1_max and N2_max",
        ));
    }

    let scores = (0..batch)
        .into_par_iter()
        .map(|b| {
            let m = to_dmatrix(affinities.index_axis(Axis(0), b));
            solve_spectral(&m, shapes[b], config)
                .map(|solution| solution.scores)
                .map_err(|err| err.in_pair(b))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(stack(&scores, first.n1_max, first.n2_max))
}

pub fn normalize_bistochastic_batch(
    scores: &Array3<f64>,
    n1: &[usize],
    n2: &[usize],
    config: &BiStochasticConfig,
) -> Result<Array3<f64>> {
    map_pairs(scores, n1, n2, |s, n1, n2| {
        normalize_bistochastic(s, n1, n2, config).map(|normalized| normalized.matrix)
    })
}

pub fn vote_batch(
    scores: &Array3<f64>,
    n1: &[usize],
    n2: &[usize],
    config: &VotingConfig,
) -> Result<Array3<f64>> {
    map_pairs(scores, n1, n2, |s, n1, n2| vote(s, n1, n2, config))
}

pub fn match_batch(scores: &Array3<f64>, n1: &[usize], n2: &[usize]) -> Result<Array3<f64>> {
    map_pairs(scores, n1, n2, match_permutation)
}

fn map_pairs<F>(scores: &Array3<f64>, n1: &[usize], n2: &[usize], stage: F) -> Result<Array3<f64>>
where
    F: Fn(&DMatrix<f64>, usize, usize) -> Result<DMatrix<f64>> + Sync,
{
    let (batch, rows, cols) = scores.dim();
    if n1.len() != batch || n2.len() != batch {
        return Err(MatchError::mismatch(
            "batch real counts",
            batch,
            format!("n1={}, n2={}", n1.len(), n2.len()),
        ));
    }
    let outputs = (0..batch)
        .into_par_iter()
        .map(|b| {
            let s = to_dmatrix(scores.index_axis(Axis(0), b));
            stage(&s, n1[b], n2[b]).map_err(|err| err.in_pair(b))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(stack(&outputs, rows, cols))
}

fn stack(matrices: &[DMatrix<f64>], rows: usize, cols: usize) -> Array3<f64> {
    Array3::from_shape_fn((matrices.len(), rows, cols), |(b, r, c)| matrices[b][(r, c)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_processed_independently() {
        let mut scores = Array3::zeros((2, 3, 3));
        for i in 0..3 {
            scores[[0, i, i]] = 1.0;
            scores[[1, i, 2 - i]] = 1.0;
        }
        let perms = match_batch(&scores, &[3, 2], &[3, 2]).expect("match");
        for i in 0..3 {
            assert_eq!(perms[[0, i, i]], 1.0);
        }
        // Second pair only uses its 2x2 real block.
        assert_eq!(perms.index_axis(Axis(0), 1).sum(), 2.0);
        assert_eq!(perms[[1, 2, 0]], 0.0);
    }

    #[test]
    fn count_length_mismatch_is_rejected() {
        let scores = Array3::zeros((2, 2, 2));
        let err = vote_batch(&scores, &[2], &[2, 2], &VotingConfig::default()).unwrap_err();
        assert!(matches!(err, MatchError::DimensionMismatch { .. }));
    }

    #[test]
    fn failing_pair_is_identified() {
        let scores = Array3::from_elem((2, 2, 2), 1.0);
        let err = normalize_bistochastic_batch(&scores, &[2, 2], &[2, 0], &BiStochasticConfig::default())
            .unwrap_err();
        assert!(matches!(err, MatchError::InPair { index: 1, .. }));
    }

    #[test]
    fn spectral_batch_reshapes_each_pair() {
        let mut affinities = Array3::zeros((2, 4, 4));
        for b in 0..2 {
            for d in 0..4 {
                affinities[[b, d, d]] = 1.0;
            }
            affinities[[b, b, b]] = 4.0;
        }
        let shapes = vec![PairShape::new(2, 2, 2, 2).expect("shape"); 2];
        let config = PowerIterationConfig {
            max_iter: 200,
            tolerance: 1e-12,
        };
        let scores = solve_spectral_batch(&affinities, &shapes, &config).expect("spectral");
        assert_eq!(scores.dim(), (2, 2, 2));
        assert!(scores[[0, 0, 0]] > 0.99);
        assert!(scores[[1, 0, 1]] > 0.99);
    }
}
