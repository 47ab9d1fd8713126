use nalgebra::{DMatrix, DVector};

use crate::error::{MatchError, Result};

/// Quadratic objective `vec(P)ᵀ · M · vec(P)` attained by an assignment.
///
/// `vec(P)` is the row-major flattening matching the affinity index `(i, a) ↦ i·N2_max + a`.
pub fn objective_score(permutation: &DMatrix<f64>, affinity: &DMatrix<f64>) -> Result<f64> {
    let dim = permutation.nrows() * permutation.ncols();
    if affinity.shape() != (dim, dim) {
        return Err(MatchError::mismatch(
            "objective score affinity",
            format!("{dim}x{dim}"),
            format!("{}x{}", affinity.nrows(), affinity.ncols()),
        ));
    }
    let flat = DVector::from_iterator(dim, permutation.transpose().iter().copied());
    Ok(flat.dot(&(affinity * &flat)))
}
