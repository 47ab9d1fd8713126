use serde::{Deserialize, Serialize};

/// Mean and sample standard deviation of a list of per-pair values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
    pub count: usize,
}

impl MetricSummary {
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }
        let mean = values.iter().sum::<f64>() / count as f64;
        let std = if count > 1 {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };
        Self { mean, std, count }
    }
}

pub fn format_accuracy_metric(precision: &[f64], accuracy: &[f64], f1: &[f64]) -> String {
    let p = MetricSummary::from_values(precision);
    let r = MetricSummary::from_values(accuracy);
    let f = MetricSummary::from_values(f1);
    format!(
        "p = {:.4}±{:.4}, r = {:.4}±{:.4}, f1 = {:.4}±{:.4}",
        p.mean, p.std, r.mean, r.std, f.mean, f.std
    )
}
