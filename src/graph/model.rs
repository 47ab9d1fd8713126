use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Directed edge between two real nodes, `source → target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: usize,
    pub target: usize,
}

/// Node/edge incidence of one padded graph.
///
/// Equivalent to the `G` (node→edge) and `H` (edge→node) 0/1 matrices of shape
/// `node_capacity × edge_capacity`: edge `e` has `G[source, e] = 1` and
/// `H[target, e] = 1`. Only the first `node_count` nodes and `edges.len()` edges
/// are real; everything beyond is padding with zero incidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Incidence {
    pub(crate) node_capacity: usize,
    pub(crate) edge_capacity: usize,
    pub(crate) node_count: usize,
    pub(crate) edges: Vec<Edge>,
}

impl Incidence {
    pub fn node_capacity(&self) -> usize {
        self.node_capacity
    }

    pub fn edge_capacity(&self) -> usize {
        self.edge_capacity
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Dense node→edge incidence `G`.
    pub fn g_matrix(&self) -> DMatrix<f64> {
        let mut g = DMatrix::zeros(self.node_capacity, self.edge_capacity);
        for (e, edge) in self.edges.iter().enumerate() {
            g[(edge.source, e)] = 1.0;
        }
        g
    }

    /// Dense edge→node incidence `H`.
    pub fn h_matrix(&self) -> DMatrix<f64> {
        let mut h = DMatrix::zeros(self.node_capacity, self.edge_capacity);
        for (e, edge) in self.edges.iter().enumerate() {
            h[(edge.target, e)] = 1.0;
        }
        h
    }

    /// Dense adjacency `G·Hᵀ` restricted to the padded node set.
    pub fn adjacency(&self) -> DMatrix<f64> {
        let mut adjacency = DMatrix::zeros(self.node_capacity, self.node_capacity);
        for edge in &self.edges {
            adjacency[(edge.source, edge.target)] += 1.0;
        }
        adjacency
    }
}

/// Serialized incidence, validated by [`crate::graph::IncidenceBuilder::from_raw`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIncidence {
    pub node_capacity: usize,
    pub edge_capacity: usize,
    pub node_count: usize,
    #[serde(default)]
    pub edges: Vec<(usize, usize)>,
    #[serde(default)]
    pub fully_connected: bool,
}

/// Per-node feature matrix of one padded graph, stored `channels × node_capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphFeatures {
    pub features: DMatrix<f64>,
    pub node_count: usize,
}

impl GraphFeatures {
    pub fn channels(&self) -> usize {
        self.features.nrows()
    }

    pub fn node_capacity(&self) -> usize {
        self.features.ncols()
    }
}

/// Padded and real node counts of one source/target graph pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairShape {
    pub n1_max: usize,
    pub n2_max: usize,
    pub n1: usize,
    pub n2: usize,
}

impl PairShape {
    pub fn new(n1_max: usize, n2_max: usize, n1: usize, n2: usize) -> crate::error::Result<Self> {
        crate::error::check_real_counts("pair shape", n1_max, n2_max, n1, n2)?;
        Ok(Self {
            n1_max,
            n2_max,
            n1,
            n2,
        })
    }

    pub fn of(src: &Incidence, tgt: &Incidence) -> crate::error::Result<Self> {
        Self::new(
            src.node_capacity(),
            tgt.node_capacity(),
            src.node_count(),
            tgt.node_count(),
        )
    }

    /// Side length of the pair's affinity matrix.
    pub fn assignment_dim(&self) -> usize {
        self.n1_max * self.n2_max
    }

    pub fn is_real(&self, i: usize, a: usize) -> bool {
        i < self.n1 && a < self.n2
    }
}
