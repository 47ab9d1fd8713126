use std::time::{Duration, Instant};

use log::{debug, info};
use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::affinity::build_affinity;
use crate::assignment::match_permutation;
use crate::config::MatchingConfig;
use crate::convergence::Convergence;
use crate::displacement::{Displacement, displacement};
use crate::error::Result;
use crate::graph::{Incidence, PairShape};
use crate::normalize::{normalize_bistochastic, vote};
use crate::spectral::solve_spectral;

/// Inputs of one graph pair, as supplied by the feature extraction side.
#[derive(Debug, Clone)]
pub struct GraphPair {
    /// Unary scores `Mp`, `N1_max × N2_max`.
    pub node_scores: DMatrix<f64>,
    /// Pairwise edge scores `Me`, `E1_max × E2_max`.
    pub edge_scores: DMatrix<f64>,
    pub src: Incidence,
    pub tgt: Incidence,
    /// Optional keypoint coordinates (`N1_max × D`, `N2_max × D`) for displacement decoding.
    pub points: Option<(DMatrix<f64>, DMatrix<f64>)>,
}

#[derive(Debug, Clone)]
pub struct PairOutcome {
    pub shape: PairShape,
    pub affinity: DMatrix<f64>,
    pub doubly_stochastic: DMatrix<f64>,
    /// Row-stochastic voting output.
    pub soft: DMatrix<f64>,
    pub permutation: DMatrix<f64>,
    pub displacement: Option<Displacement>,
    pub spectral: Convergence,
    pub bi_stochastic: Convergence,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkflowStats {
    pub pairs: usize,
    pub spectral_converged: usize,
    pub spectral_degenerate: usize,
    pub bi_stochastic_converged: usize,
    pub bi_stochastic_degenerate: usize,
    pub matched_nodes: usize,
}

pub struct MatchingSummary {
    pub outcomes: Vec<PairOutcome>,
    pub stats: WorkflowStats,
    pub matching_duration: Duration,
}

pub struct MatchingWorkflow {
    config: MatchingConfig,
}

impl MatchingWorkflow {
    pub fn new(config: MatchingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Runs every pair through affinity → spectral → bi-stochastic → voting →
    /// assignment. Pairs are independent and processed in parallel; the first
    /// invalid pair aborts the batch with its index attached.
    pub fn execute(&self, pairs: &[GraphPair]) -> Result<MatchingSummary> {
        let start = Instant::now();
        let outcomes = pairs
            .par_iter()
            .enumerate()
            .map(|(index, pair)| self.run_pair(pair).map_err(|err| err.in_pair(index)))
            .collect::<Result<Vec<_>>>()?;
        let matching_duration = start.elapsed();

        let stats = outcomes
            .par_iter()
            .fold(WorkflowStats::default, |mut stats, outcome| {
                stats.consume(outcome);
                stats
            })
            .reduce(WorkflowStats::default, WorkflowStats::combine);

        info!(
            "Matched {} pairs in {:?} (spectral converged {}, degenerate {}; bi-stochastic converged {}, degenerate {})",
            stats.pairs,
            matching_duration,
            stats.spectral_converged,
            stats.spectral_degenerate,
            stats.bi_stochastic_converged,
            stats.bi_stochastic_degenerate
        );

        Ok(MatchingSummary {
            outcomes,
            stats,
            matching_duration,
        })
    }

    pub fn run_pair(&self, pair: &GraphPair) -> Result<PairOutcome> {
        let shape = PairShape::of(&pair.src, &pair.tgt)?;
        let affinity = build_affinity(&pair.node_scores, &pair.edge_scores, &pair.src, &pair.tgt)?;
        let spectral = solve_spectral(&affinity, shape, &self.config.power_iteration)?;
        let normalized = normalize_bistochastic(
            &spectral.scores,
            shape.n1,
            shape.n2,
            &self.config.bi_stochastic,
        )?;
        let soft = vote(&normalized.matrix, shape.n1, shape.n2, &self.config.voting)?;
        let permutation = match_permutation(&soft, shape.n1, shape.n2)?;
        let displacement = pair
            .points
            .as_ref()
            .map(|(src_points, tgt_points)| displacement(&soft, src_points, tgt_points, shape.n1))
            .transpose()?;

        debug!(
            "pair {}x{}: spectral {} steps (residual {:.3e}), bi-stochastic {} steps (residual {:.3e})",
            shape.n1,
            shape.n2,
            spectral.convergence.iterations,
            spectral.convergence.residual,
            normalized.convergence.iterations,
            normalized.convergence.residual
        );

        Ok(PairOutcome {
            shape,
            affinity,
            doubly_stochastic: normalized.matrix,
            soft,
            permutation,
            displacement,
            spectral: spectral.convergence,
            bi_stochastic: normalized.convergence,
        })
    }
}

impl WorkflowStats {
    fn consume(&mut self, outcome: &PairOutcome) {
        self.pairs += 1;
        if outcome.spectral.converged {
            self.spectral_converged += 1;
        }
        if outcome.spectral.degenerate {
            self.spectral_degenerate += 1;
        }
        if outcome.bi_stochastic.converged {
            self.bi_stochastic_converged += 1;
        }
        if outcome.bi_stochastic.degenerate {
            self.bi_stochastic_degenerate += 1;
        }
        self.matched_nodes += outcome.permutation.sum() as usize;
    }

    fn combine(mut self, other: Self) -> Self {
        self.pairs += other.pairs;
        self.spectral_converged += other.spectral_converged;
        self.spectral_degenerate += other.spectral_degenerate;
        self.bi_stochastic_converged += other.bi_stochastic_converged;
        self.bi_stochastic_degenerate += other.bi_stochastic_degenerate;
        self.matched_nodes += other.matched_nodes;
        self
    }
}
