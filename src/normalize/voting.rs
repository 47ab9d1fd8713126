use nalgebra::DMatrix;

use crate::config::VotingConfig;
use crate::error::{MatchError, Result, check_real_counts};

/// Row-wise `softmax(alpha · s)` over the real `n1 × n2` block.
///
/// Padded rows and columns stay zero and padded columns do not enter the
/// denominator. A row of equal scores (including all zeros) becomes uniform.
pub fn vote(s: &DMatrix<f64>, n1: usize, n2: usize, config: &VotingConfig) -> Result<DMatrix<f64>> {
    check_real_counts("voting", s.nrows(), s.ncols(), n1, n2)?;
    if !(config.alpha > 0.0) {
        return Err(MatchError::InvalidConfig(format!(
            "voting alpha must be positive, got {}",
            config.alpha
        )));
    }

    let mut out = DMatrix::zeros(s.nrows(), s.ncols());
    for i in 0..n1 {
        let peak = (0..n2)
            .map(|a| config.alpha * s[(i, a)])
            .fold(f64::NEG_INFINITY, f64::max);
        let mut total = 0.0;
        for a in 0..n2 {
            let weight = (config.alpha * s[(i, a)] - peak).exp();
            out[(i, a)] = weight;
            total += weight;
        }
        // total >= 1 because the peak entry contributes exp(0).
        for a in 0..n2 {
            out[(i, a)] /= total;
        }
    }
    Ok(out)
}
