use nalgebra::DMatrix;

use crate::error::{MatchError, Result};
use crate::graph::{GraphFeatures, Incidence};

/// Unary compatibility `U1ᵀ·U2` between every source and target node.
///
/// Entries touching padded nodes are zero and negative similarities are clamped
/// to zero, so the result can seed a non-negative affinity matrix.
pub fn node_scores(src: &GraphFeatures, tgt: &GraphFeatures) -> Result<DMatrix<f64>> {
    if src.channels() != tgt.channels() {
        return Err(MatchError::mismatch(
            "node feature channels",
            src.channels(),
            tgt.channels(),
        ));
    }
    check_count("source node features", src.node_count, src.node_capacity())?;
    check_count("target node features", tgt.node_count, tgt.node_capacity())?;

    let mut scores = src.features.transpose() * &tgt.features;
    mask_and_clamp(&mut scores, src.node_count, tgt.node_count);
    Ok(scores)
}

/// Pairwise compatibility `Xᵀ·Λ·Y` between every source and target edge.
///
/// `x` and `y` hold one edge feature `[F_source; F_target]` per column
/// (`2C × E_max`). The bilinear form is assembled from two `C × C` weights as
/// `Λ = [[Λ1, Λ2], [Λ2, Λ1]]` with `Λk = relu(λk + λkᵀ)`. That block layout gives
/// an edge and its reverse the same score against a reversed target edge, so
/// undirected graphs yield a symmetric affinity. Only real edges are scored.
pub fn edge_scores(
    x: &DMatrix<f64>,
    src: &Incidence,
    y: &DMatrix<f64>,
    tgt: &Incidence,
    lambda1: &DMatrix<f64>,
    lambda2: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    if x.nrows() != y.nrows() {
        return Err(MatchError::mismatch(
            "edge feature channels",
            x.nrows(),
            y.nrows(),
        ));
    }
    let channels = lambda1.nrows();
    for (context, lambda) in [("edge weight lambda1", lambda1), ("edge weight lambda2", lambda2)] {
        if lambda.shape() != (channels, channels) {
            return Err(MatchError::mismatch(
                context,
                format!("{channels}x{channels}"),
                format!("{}x{}", lambda.nrows(), lambda.ncols()),
            ));
        }
    }
    if x.nrows() != 2 * channels {
        return Err(MatchError::mismatch(
            "edge feature channels",
            2 * channels,
            x.nrows(),
        ));
    }
    if x.ncols() != src.edge_capacity() {
        return Err(MatchError::mismatch(
            "source edge features",
            src.edge_capacity(),
            x.ncols(),
        ));
    }
    if y.ncols() != tgt.edge_capacity() {
        return Err(MatchError::mismatch(
            "target edge features",
            tgt.edge_capacity(),
            y.ncols(),
        ));
    }

    let weight = block_weight(lambda1, lambda2);
    let mut scores = x.transpose() * weight * y;
    mask_and_clamp(&mut scores, src.edge_count(), tgt.edge_count());
    Ok(scores)
}

fn block_weight(lambda1: &DMatrix<f64>, lambda2: &DMatrix<f64>) -> DMatrix<f64> {
    let channels = lambda1.nrows();
    let diagonal = (lambda1 + lambda1.transpose()).map(|v| v.max(0.0));
    let off_diagonal = (lambda2 + lambda2.transpose()).map(|v| v.max(0.0));
    DMatrix::from_fn(2 * channels, 2 * channels, |r, c| {
        let block = if (r < channels) == (c < channels) {
            &diagonal
        } else {
            &off_diagonal
        };
        block[(r % channels, c % channels)]
    })
}

fn check_count(context: &'static str, count: usize, capacity: usize) -> Result<()> {
    if count > capacity {
        return Err(MatchError::shape(
            context,
            format!("real count {count} exceeds capacity {capacity}"),
        ));
    }
    Ok(())
}

fn mask_and_clamp(scores: &mut DMatrix<f64>, rows: usize, cols: usize) {
    let (nrows, ncols) = scores.shape();
    for c in 0..ncols {
        for r in 0..nrows {
            let value = &mut scores[(r, c)];
            if r >= rows || c >= cols || *value < 0.0 {
                *value = 0.0;
            }
        }
    }
}
