pub mod builder;
pub mod scores;

pub use builder::{AffinityBuilder, build_affinity};
pub use scores::{edge_scores, node_scores};
