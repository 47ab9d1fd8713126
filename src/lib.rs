pub mod affinity;
pub mod assignment;
pub mod config;
pub mod convergence;
pub mod datasets;
pub mod displacement;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod spectral;

pub use affinity::{AffinityBuilder, build_affinity, edge_scores, node_scores};
pub use assignment::{Assignment, match_permutation, solve_assignment};
pub use config::{
    BiStochasticConfig, MatchingConfig, PckConfig, PowerIterationConfig, VotingConfig,
};
pub use convergence::Convergence;
pub use datasets::{BatchLoader, LoadedBatch, LoadedPair};
pub use displacement::{Displacement, displacement};
pub use error::{MatchError, Result};
pub use graph::{Edge, GraphFeatures, Incidence, IncidenceBuilder, PairShape, edge_features};
pub use normalize::{Normalized, normalize_bistochastic, vote};
pub use pipeline::{
    Evaluator, GraphPair, KeypointSample, MatchingSummary, MatchingWorkflow, PairOutcome,
    WorkflowStats,
};
pub use spectral::{SpectralSolution, solve_spectral};
