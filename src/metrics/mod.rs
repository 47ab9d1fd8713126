//! Stateless quality metrics over predicted and ground-truth permutation matrices.

pub mod accuracy;
pub mod objective;
pub mod pck;
pub mod summary;

pub use accuracy::{MatchCounts, f1_score, matching_accuracy, matching_precision};
pub use objective::objective_score;
pub use pck::{PckAccumulator, PckCounts, pck};
pub use summary::{MetricSummary, format_accuracy_metric};
