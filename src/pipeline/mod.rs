pub mod batch;
pub mod evaluation;
pub mod workflow;

pub use batch::{match_batch, normalize_bistochastic_batch, solve_spectral_batch, vote_batch};
pub use evaluation::{ClassReport, EvaluationReport, Evaluator, KeypointSample};
pub use workflow::{GraphPair, MatchingSummary, MatchingWorkflow, PairOutcome, WorkflowStats};
