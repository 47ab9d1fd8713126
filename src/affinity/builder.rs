use log::trace;
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::{MatchError, Result};
use crate::graph::{Edge, Incidence};

/// Global affinity matrix over all candidate assignments of two padded graphs.
///
/// Assignment `(i, a)` (source node `i` to target node `a`) lives at flat index
/// `i * N2_max + a`. For `(i, a) != (j, b)`,
/// `M[(i,a),(j,b)] = Σ Me[e1, e2]` over source edges `e1: i → j` and target
/// edges `e2: a → b`; the diagonal holds the unary scores `Mp[i, a]`.
/// Only real edges are enumerated, so the work is `O(E1 · E2)` plus the dense
/// output allocation.
pub fn build_affinity(
    node_scores: &DMatrix<f64>,
    edge_scores: &DMatrix<f64>,
    src: &Incidence,
    tgt: &Incidence,
) -> Result<DMatrix<f64>> {
    AffinityBuilder::new(src, tgt)?.build(node_scores, edge_scores)
}

pub struct AffinityBuilder<'a> {
    src: &'a Incidence,
    tgt: &'a Incidence,
    src_by_source: Vec<Vec<(usize, Edge)>>,
}

impl<'a> AffinityBuilder<'a> {
    pub fn new(src: &'a Incidence, tgt: &'a Incidence) -> Result<Self> {
        if src.node_count() == 0 || tgt.node_count() == 0 {
            return Err(MatchError::shape(
                "affinity",
                format!(
                    "both graphs need real nodes, got n1={}, n2={}",
                    src.node_count(),
                    tgt.node_count()
                ),
            ));
        }
        let mut src_by_source = vec![Vec::new(); src.node_capacity()];
        for (e, edge) in src.edges().iter().enumerate() {
            src_by_source[edge.source].push((e, *edge));
        }
        Ok(Self {
            src,
            tgt,
            src_by_source,
        })
    }

    /// Side length of the square affinity matrix, `N1_max · N2_max`.
    pub fn dimension(&self) -> usize {
        self.src.node_capacity() * self.tgt.node_capacity()
    }

    pub fn build(
        &self,
        node_scores: &DMatrix<f64>,
        edge_scores: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>> {
        let n1_max = self.src.node_capacity();
        let n2_max = self.tgt.node_capacity();
        if node_scores.shape() != (n1_max, n2_max) {
            return Err(MatchError::mismatch(
                "affinity node scores",
                format!("{n1_max}x{n2_max}"),
                format!("{}x{}", node_scores.nrows(), node_scores.ncols()),
            ));
        }
        let e1_max = self.src.edge_capacity();
        let e2_max = self.tgt.edge_capacity();
        if edge_scores.shape() != (e1_max, e2_max) {
            return Err(MatchError::mismatch(
                "affinity edge scores",
                format!("{e1_max}x{e2_max}"),
                format!("{}x{}", edge_scores.nrows(), edge_scores.ncols()),
            ));
        }

        let n1 = self.src.node_count();
        let n2 = self.tgt.node_count();
        let dim = self.dimension();
        let tgt_edges = self.tgt.edges();

        // Row-major staging buffer; one chunk per source node holds its N2_max rows.
        let mut data = vec![0.0; dim * dim];
        data.par_chunks_mut(n2_max * dim)
            .enumerate()
            .for_each(|(i, block)| {
                for &(e1, src_edge) in &self.src_by_source[i] {
                    let j = src_edge.target;
                    for (e2, tgt_edge) in tgt_edges.iter().enumerate() {
                        let a = tgt_edge.source;
                        let b = tgt_edge.target;
                        if i == j && a == b {
                            continue;
                        }
                        block[a * dim + j * n2_max + b] += edge_scores[(e1, e2)];
                    }
                }
                if i < n1 {
                    for a in 0..n2 {
                        block[a * dim + i * n2_max + a] = node_scores[(i, a)];
                    }
                }
            });

        trace!(
            "affinity {}x{} from {} source edges and {} target edges",
            dim,
            dim,
            self.src.edge_count(),
            self.tgt.edge_count()
        );
        Ok(DMatrix::from_row_slice(dim, dim, &data))
    }
}
