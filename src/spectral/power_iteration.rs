use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::config::PowerIterationConfig;
use crate::convergence::Convergence;
use crate::error::{MatchError, Result};
use crate::graph::PairShape;

#[derive(Debug, Clone)]
pub struct SpectralSolution {
    /// Unit-norm dominant eigenvector, length `N1_max · N2_max`.
    pub vector: DVector<f64>,
    /// `vector` reshaped row-major to `N1_max × N2_max`.
    pub scores: DMatrix<f64>,
    pub convergence: Convergence,
}

/// Dominant eigenvector of a non-negative affinity matrix by power iteration.
///
/// Starts from the uniform vector over real assignments and iterates
/// `v ← M·v / ‖M·v‖` until successive iterates differ by less than
/// `config.tolerance` or `config.max_iter` steps have run. If `M·v` vanishes the
/// last non-degenerate iterate is returned with `degenerate` set.
pub fn solve_spectral(
    m: &DMatrix<f64>,
    shape: PairShape,
    config: &PowerIterationConfig,
) -> Result<SpectralSolution> {
    let dim = shape.assignment_dim();
    if m.shape() != (dim, dim) {
        return Err(MatchError::mismatch(
            "spectral affinity",
            format!("{dim}x{dim}"),
            format!("{}x{}", m.nrows(), m.ncols()),
        ));
    }

    let mask = real_mask(shape);
    let real = (shape.n1 * shape.n2) as f64;
    let mut vector = mask.map(|keep| keep / real.sqrt());
    let mut convergence = Convergence::default();

    for step in 1..=config.max_iter.max(1) {
        let mut next = m * &vector;
        next.component_mul_assign(&mask);
        if !normalize(&mut next) {
            debug!("power iteration hit a zero-norm product at step {step}");
            convergence.degenerate = true;
            break;
        }
        let residual = (&next - &vector).norm();
        vector = next;
        convergence.iterations = step;
        convergence.residual = residual;
        if residual < config.tolerance {
            convergence.converged = true;
            break;
        }
    }

    if !convergence.converged && !convergence.degenerate {
        debug!(
            "power iteration stopped after {} steps, residual {:.3e}",
            convergence.iterations, convergence.residual
        );
    }

    let scores = DMatrix::from_row_slice(shape.n1_max, shape.n2_max, vector.as_slice());
    Ok(SpectralSolution {
        vector,
        scores,
        convergence,
    })
}

fn real_mask(shape: PairShape) -> DVector<f64> {
    DVector::from_fn(shape.assignment_dim(), |idx, _| {
        let i = idx / shape.n2_max;
        let a = idx % shape.n2_max;
        if shape.is_real(i, a) { 1.0 } else { 0.0 }
    })
}

fn normalize(vector: &mut DVector<f64>) -> bool {
    let norm = vector.norm();
    if !norm.is_finite() || norm <= f64::MIN_POSITIVE {
        return false;
    }
    *vector /= norm;
    true
}
