pub mod hungarian;

pub use hungarian::{Assignment, match_permutation, solve_assignment};
