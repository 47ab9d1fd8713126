use nalgebra::DMatrix;
use petgraph::EdgeType;
use petgraph::graph::Graph;
use petgraph::visit::EdgeRef;

use crate::error::{MatchError, Result};
use crate::graph::model::{Edge, GraphFeatures, Incidence, RawIncidence};

/// Builds validated [`Incidence`] structures from the shapes callers hand us.
#[derive(Debug, Default)]
pub struct IncidenceBuilder;

impl IncidenceBuilder {
    /// Incidence from an explicit directed edge list over the first `node_count` nodes.
    pub fn from_edges(
        node_capacity: usize,
        edge_capacity: usize,
        node_count: usize,
        edges: &[(usize, usize)],
    ) -> Result<Incidence> {
        if node_count > node_capacity {
            return Err(MatchError::shape(
                "incidence",
                format!("node count {node_count} exceeds capacity {node_capacity}"),
            ));
        }
        if edges.len() > edge_capacity {
            return Err(MatchError::shape(
                "incidence",
                format!(
                    "edge count {} exceeds capacity {edge_capacity}",
                    edges.len()
                ),
            ));
        }
        let edges = edges
            .iter()
            .map(|&(source, target)| {
                if source >= node_count || target >= node_count {
                    return Err(MatchError::shape(
                        "incidence",
                        format!(
                            "edge ({source}, {target}) references a node outside the {node_count} real nodes"
                        ),
                    ));
                }
                Ok(Edge { source, target })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Incidence {
            node_capacity,
            edge_capacity,
            node_count,
            edges,
        })
    }

    /// Complete directed graph over `node_count` real nodes, no self loops.
    pub fn fully_connected(
        node_capacity: usize,
        edge_capacity: usize,
        node_count: usize,
    ) -> Result<Incidence> {
        let edges: Vec<(usize, usize)> = (0..node_count)
            .flat_map(|i| (0..node_count).filter(move |&j| j != i).map(move |j| (i, j)))
            .collect();
        Self::from_edges(node_capacity, edge_capacity, node_count, &edges)
    }

    /// Incidence from dense `G`/`H` matrices with `edge_count` real columns.
    ///
    /// Every real column must hold exactly one source in `G` and one target in `H`,
    /// both among the real nodes; padded rows and columns must be zero.
    pub fn from_dense(
        g: &DMatrix<f64>,
        h: &DMatrix<f64>,
        node_count: usize,
        edge_count: usize,
    ) -> Result<Incidence> {
        if g.shape() != h.shape() {
            return Err(MatchError::mismatch(
                "incidence G/H",
                format!("{:?}", g.shape()),
                format!("{:?}", h.shape()),
            ));
        }
        let (node_capacity, edge_capacity) = g.shape();
        if node_count > node_capacity || edge_count > edge_capacity {
            return Err(MatchError::shape(
                "incidence",
                format!(
                    "real counts ({node_count}, {edge_count}) exceed shape {node_capacity}x{edge_capacity}"
                ),
            ));
        }

        let mut edges = Vec::with_capacity(edge_count);
        for e in 0..edge_capacity {
            let sources = nonzero_rows(g, e);
            let targets = nonzero_rows(h, e);
            if e >= edge_count {
                if !sources.is_empty() || !targets.is_empty() {
                    return Err(MatchError::shape(
                        "incidence",
                        format!("padded edge {e} has non-zero incidence"),
                    ));
                }
                continue;
            }
            match (sources.as_slice(), targets.as_slice()) {
                (&[source], &[target]) if source < node_count && target < node_count => {
                    edges.push(Edge { source, target });
                }
                _ => {
                    return Err(MatchError::shape(
                        "incidence",
                        format!(
                            "edge {e} must connect exactly one real source to one real target, got sources {sources:?}, targets {targets:?}"
                        ),
                    ));
                }
            }
        }

        Ok(Incidence {
            node_capacity,
            edge_capacity,
            node_count,
            edges,
        })
    }

    /// Same as [`IncidenceBuilder::from_dense`] for row-major `node_capacity × edge_capacity` buffers.
    pub fn from_row_major(
        node_capacity: usize,
        edge_capacity: usize,
        g: &[f64],
        h: &[f64],
        node_count: usize,
        edge_count: usize,
    ) -> Result<Incidence> {
        let expected = node_capacity * edge_capacity;
        if g.len() != expected || h.len() != expected {
            return Err(MatchError::mismatch(
                "incidence buffers",
                expected,
                format!("G={}, H={}", g.len(), h.len()),
            ));
        }
        let g = DMatrix::from_row_slice(node_capacity, edge_capacity, g);
        let h = DMatrix::from_row_slice(node_capacity, edge_capacity, h);
        Self::from_dense(&g, &h, node_count, edge_count)
    }

    /// Incidence of a petgraph graph. Undirected edges are emitted in both directions.
    pub fn from_graph<N, E, Ty: EdgeType>(
        graph: &Graph<N, E, Ty>,
        node_capacity: usize,
        edge_capacity: usize,
    ) -> Result<Incidence> {
        let mut edges = Vec::with_capacity(graph.edge_count() * 2);
        for edge in graph.edge_references() {
            let source = edge.source().index();
            let target = edge.target().index();
            edges.push((source, target));
            if !graph.is_directed() && source != target {
                edges.push((target, source));
            }
        }
        Self::from_edges(node_capacity, edge_capacity, graph.node_count(), &edges)
    }

    pub fn from_raw(raw: &RawIncidence) -> Result<Incidence> {
        if raw.fully_connected {
            if !raw.edges.is_empty() {
                return Err(MatchError::shape(
                    "incidence",
                    "fully_connected incidence must not list explicit edges",
                ));
            }
            return Self::fully_connected(raw.node_capacity, raw.edge_capacity, raw.node_count);
        }
        Self::from_edges(
            raw.node_capacity,
            raw.edge_capacity,
            raw.node_count,
            &raw.edges,
        )
    }
}

/// Edge features `[F[:, source]; F[:, target]]` for each real edge, `2C × edge_capacity`.
pub fn edge_features(nodes: &GraphFeatures, incidence: &Incidence) -> Result<DMatrix<f64>> {
    if nodes.node_capacity() != incidence.node_capacity() {
        return Err(MatchError::mismatch(
            "edge features node capacity",
            incidence.node_capacity(),
            nodes.node_capacity(),
        ));
    }
    let channels = nodes.channels();
    let mut features = DMatrix::zeros(channels * 2, incidence.edge_capacity());
    for (e, edge) in incidence.edges().iter().enumerate() {
        for c in 0..channels {
            features[(c, e)] = nodes.features[(c, edge.source)];
            features[(channels + c, e)] = nodes.features[(c, edge.target)];
        }
    }
    Ok(features)
}

fn nonzero_rows(matrix: &DMatrix<f64>, column: usize) -> Vec<usize> {
    matrix
        .column(column)
        .iter()
        .enumerate()
        .filter(|(_, value)| **value != 0.0)
        .map(|(row, _)| row)
        .collect()
}
