use log::debug;
use nalgebra::DMatrix;

use crate::config::BiStochasticConfig;
use crate::convergence::Convergence;
use crate::error::{Result, check_real_counts};

const ZERO_SUM: f64 = 1e-300;

#[derive(Debug, Clone)]
pub struct Normalized {
    pub matrix: DMatrix<f64>,
    pub convergence: Convergence,
}

/// Sinkhorn-style projection of the real `n1 × n2` block onto the
/// (partial) doubly stochastic polytope.
///
/// Square blocks alternate full row and column normalization. When `n1 != n2`
/// the smaller side is normalized to one and the larger side is only scaled down
/// where its sum exceeds one, so every real marginal ends at or below one.
/// Iteration stops once no real row or column sum moves by more than
/// `config.tolerance` in a pass. Rows or columns summing to zero are left at
/// zero and reported through `degenerate`.
pub fn normalize_bistochastic(
    s: &DMatrix<f64>,
    n1: usize,
    n2: usize,
    config: &BiStochasticConfig,
) -> Result<Normalized> {
    check_real_counts("bi-stochastic normalization", s.nrows(), s.ncols(), n1, n2)?;

    let mut matrix = DMatrix::zeros(s.nrows(), s.ncols());
    matrix
        .view_mut((0, 0), (n1, n2))
        .copy_from(&s.view((0, 0), (n1, n2)));

    let rows_first = n1 <= n2;
    let square = n1 == n2;
    let mut convergence = Convergence::default();
    let (mut row_sums, mut col_sums) = marginals(&matrix, n1, n2);

    for step in 1..=config.max_iter.max(1) {
        if rows_first {
            convergence.degenerate |= scale_rows(&mut matrix, n1, n2, false);
            convergence.degenerate |= scale_columns(&mut matrix, n1, n2, !square);
        } else {
            convergence.degenerate |= scale_columns(&mut matrix, n1, n2, false);
            convergence.degenerate |= scale_rows(&mut matrix, n1, n2, true);
        }

        let (next_rows, next_cols) = marginals(&matrix, n1, n2);
        let residual = max_change(&row_sums, &next_rows).max(max_change(&col_sums, &next_cols));
        row_sums = next_rows;
        col_sums = next_cols;
        convergence.iterations = step;
        convergence.residual = residual;
        if residual < config.tolerance {
            convergence.converged = true;
            break;
        }
    }

    if convergence.degenerate {
        debug!("bi-stochastic normalization met an all-zero row or column in the {n1}x{n2} block");
    }
    Ok(Normalized {
        matrix,
        convergence,
    })
}

/// Divides each real row by its sum. With `only_above_one`, rows summing to at
/// most one are left untouched. Returns true if a real row summed to zero.
fn scale_rows(matrix: &mut DMatrix<f64>, n1: usize, n2: usize, only_above_one: bool) -> bool {
    let mut degenerate = false;
    for i in 0..n1 {
        let sum: f64 = (0..n2).map(|a| matrix[(i, a)]).sum();
        if sum <= ZERO_SUM {
            degenerate = true;
            continue;
        }
        if only_above_one && sum <= 1.0 {
            continue;
        }
        for a in 0..n2 {
            matrix[(i, a)] /= sum;
        }
    }
    degenerate
}

fn scale_columns(matrix: &mut DMatrix<f64>, n1: usize, n2: usize, only_above_one: bool) -> bool {
    let mut degenerate = false;
    for a in 0..n2 {
        let mut column = matrix.view_mut((0, a), (n1, 1));
        let sum = column.sum();
        if sum <= ZERO_SUM {
            degenerate = true;
            continue;
        }
        if only_above_one && sum <= 1.0 {
            continue;
        }
        column /= sum;
    }
    degenerate
}

fn marginals(matrix: &DMatrix<f64>, n1: usize, n2: usize) -> (Vec<f64>, Vec<f64>) {
    let block = matrix.view((0, 0), (n1, n2));
    let rows = block.row_iter().map(|row| row.sum()).collect();
    let cols = block.column_iter().map(|col| col.sum()).collect();
    (rows, cols)
}

fn max_change(previous: &[f64], next: &[f64]) -> f64 {
    previous
        .iter()
        .zip(next)
        .map(|(p, n)| (p - n).abs())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MatchError;

    fn config(max_iter: usize) -> BiStochasticConfig {
        BiStochasticConfig {
            max_iter,
            tolerance: 1e-9,
        }
    }

    fn row_sum(m: &DMatrix<f64>, i: usize, n2: usize) -> f64 {
        (0..n2).map(|a| m[(i, a)]).sum()
    }

    fn col_sum(m: &DMatrix<f64>, a: usize, n1: usize) -> f64 {
        (0..n1).map(|i| m[(i, a)]).sum()
    }

    #[test]
    fn square_block_becomes_doubly_stochastic() {
        let s = DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 2.0,
            1.0, 2.0, 3.0,
            3.0, 4.0, 1.0,
        ]);
        let out = normalize_bistochastic(&s, 3, 3, &config(500)).expect("normalize");
        assert!(out.convergence.converged);
        for k in 0..3 {
            assert!((row_sum(&out.matrix, k, 3) - 1.0).abs() < 1e-8);
            assert!((col_sum(&out.matrix, k, 3) - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn padding_is_zeroed() {
        let s = DMatrix::from_element(4, 5, 1.0);
        let out = normalize_bistochastic(&s, 2, 3, &config(50)).expect("normalize");
        for i in 0..4 {
            for a in 0..5 {
                if i >= 2 || a >= 3 {
                    assert_eq!(out.matrix[(i, a)], 0.0);
                }
            }
        }
    }

    #[test]
    fn unequal_counts_keep_marginals_at_most_one() {
        let s = DMatrix::from_row_slice(2, 4, &[
            5.0, 1.0, 1.0, 2.0,
            1.0, 3.0, 2.0, 1.0,
        ]);
        let out = normalize_bistochastic(&s, 2, 4, &config(100)).expect("normalize");
        for i in 0..2 {
            let sum = row_sum(&out.matrix, i, 4);
            assert!(sum <= 1.0 + 1e-12);
            assert!((sum - 1.0).abs() < 1e-6, "smaller side should reach one, got {sum}");
        }
        for a in 0..4 {
            assert!(col_sum(&out.matrix, a, 2) <= 1.0 + 1e-12);
        }

        let tall = normalize_bistochastic(&s.transpose(), 4, 2, &config(100)).expect("normalize");
        for a in 0..2 {
            assert!((col_sum(&tall.matrix, a, 4) - 1.0).abs() < 1e-6);
        }
        for i in 0..4 {
            assert!(row_sum(&tall.matrix, i, 2) <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn converged_input_is_a_fixed_point() {
        let third = 1.0 / 3.0;
        let s = DMatrix::from_element(3, 3, third);
        let cfg = config(10);
        let out = normalize_bistochastic(&s, 3, 3, &cfg).expect("normalize");
        assert!(out.convergence.converged);
        assert_eq!(out.convergence.iterations, 1);
        assert!((&out.matrix - &s).abs().max() < cfg.tolerance);
    }

    #[test]
    fn zero_row_is_tolerated() {
        let s = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 1.0, 1.0]);
        let out = normalize_bistochastic(&s, 2, 2, &config(10)).expect("normalize");
        assert!(out.convergence.degenerate);
        assert_eq!(row_sum(&out.matrix, 0, 2), 0.0);
        assert!(out.matrix.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_real_count_is_rejected() {
        let err =
            normalize_bistochastic(&DMatrix::zeros(3, 3), 3, 0, &config(10)).unwrap_err();
        assert!(matches!(err, MatchError::InvalidShape { .. }));
    }
}
