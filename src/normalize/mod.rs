pub mod bistochastic;
pub mod voting;

pub use bistochastic::{Normalized, normalize_bistochastic};
pub use voting::vote;
