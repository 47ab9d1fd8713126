use nalgebra::DMatrix;

use crate::error::{MatchError, Result};

#[derive(Debug, Clone)]
pub struct Displacement {
    /// `s · P2 − P1` on real rows, zero on padded rows. `N1_max × D`.
    pub offsets: DMatrix<f64>,
    /// 1.0 for real source rows, 0.0 for padding. `N1_max × D`.
    pub mask: DMatrix<f64>,
}

/// Predicted displacement of each source point towards its soft-matched target
/// location, where `s` supplies per-row convex weights over target points.
pub fn displacement(
    s: &DMatrix<f64>,
    src_points: &DMatrix<f64>,
    tgt_points: &DMatrix<f64>,
    n1: usize,
) -> Result<Displacement> {
    if s.nrows() != src_points.nrows() {
        return Err(MatchError::mismatch(
            "displacement source points",
            s.nrows(),
            src_points.nrows(),
        ));
    }
    if s.ncols() != tgt_points.nrows() {
        return Err(MatchError::mismatch(
            "displacement target points",
            s.ncols(),
            tgt_points.nrows(),
        ));
    }
    if src_points.ncols() != tgt_points.ncols() {
        return Err(MatchError::mismatch(
            "displacement coordinate dimension",
            src_points.ncols(),
            tgt_points.ncols(),
        ));
    }
    if n1 > s.nrows() {
        return Err(MatchError::shape(
            "displacement",
            format!("n1={n1} exceeds {} rows", s.nrows()),
        ));
    }

    let mut offsets = s * tgt_points - src_points;
    let mut mask = DMatrix::from_element(offsets.nrows(), offsets.ncols(), 1.0);
    for i in n1..offsets.nrows() {
        offsets.row_mut(i).fill(0.0);
        mask.row_mut(i).fill(0.0);
    }
    Ok(Displacement { offsets, mask })
}
