pub mod power_iteration;

pub use power_iteration::{SpectralSolution, solve_spectral};
