use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerIterationConfig {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for PowerIterationConfig {
    fn default() -> Self {
        Self {
            max_iter: 50,
            tolerance: 2e-7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiStochasticConfig {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for BiStochasticConfig {
    fn default() -> Self {
        Self {
            max_iter: 10,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Softmax sharpness applied to each real row.
    pub alpha: f64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self { alpha: 200.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PckConfig {
    pub alphas: Vec<f64>,
    /// Reference length `L`; thresholds are `alpha * L`.
    pub reference_length: f64,
}

impl Default for PckConfig {
    fn default() -> Self {
        Self {
            alphas: vec![0.05, 0.10],
            reference_length: 256.0,
        }
    }
}

impl PckConfig {
    pub fn thresholds(&self) -> Vec<f64> {
        self.alphas
            .iter()
            .map(|alpha| alpha * self.reference_length)
            .collect()
    }
}

/// Parameters for one matching invocation. Passed explicitly to every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub power_iteration: PowerIterationConfig,
    pub bi_stochastic: BiStochasticConfig,
    pub voting: VotingConfig,
    pub pck: PckConfig,
}

impl MatchingConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| MatchError::InvalidConfig(format!("parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|err| {
            MatchError::InvalidConfig(format!("read config file {:?}: {err}", path))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.power_iteration.max_iter == 0 {
            return Err(MatchError::InvalidConfig(
                "power_iteration.max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.power_iteration.tolerance > 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "power_iteration.tolerance must be positive, got {}",
                self.power_iteration.tolerance
            )));
        }
        if self.bi_stochastic.max_iter == 0 {
            return Err(MatchError::InvalidConfig(
                "bi_stochastic.max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.bi_stochastic.tolerance > 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "bi_stochastic.tolerance must be positive, got {}",
                self.bi_stochastic.tolerance
            )));
        }
        if !(self.voting.alpha > 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "voting.alpha must be positive, got {}",
                self.voting.alpha
            )));
        }
        if !(self.pck.reference_length >= 0.0) {
            return Err(MatchError::InvalidConfig(format!(
                "pck.reference_length must be non-negative, got {}",
                self.pck.reference_length
            )));
        }
        Ok(())
    }
}
