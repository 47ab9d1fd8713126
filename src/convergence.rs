use serde::{Deserialize, Serialize};

/// Outcome of an iterative stage. Iterative stages never fail on numeric
/// degeneracy; they stop early, fall back, and set `degenerate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Convergence {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
    pub degenerate: bool,
}
