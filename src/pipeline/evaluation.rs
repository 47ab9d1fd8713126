use indexmap::IndexMap;
use log::info;
use nalgebra::DMatrix;
use serde::Serialize;

use crate::config::PckConfig;
use crate::error::Result;
use crate::metrics::{
    MetricSummary, PckAccumulator, f1_score, format_accuracy_metric, matching_accuracy,
    matching_precision, objective_score, pck,
};
use crate::pipeline::workflow::PairOutcome;

/// Keypoint coordinates used for PCK on one pair.
#[derive(Debug, Clone)]
pub struct KeypointSample {
    /// Predicted candidate locations in the target, `N2_max × D`.
    pub candidates: DMatrix<f64>,
    /// True locations of each source point in the target, `N1_max × D`.
    pub ground_truth: DMatrix<f64>,
    /// Reference length `L` for this pair; falls back to the configured one.
    pub reference_length: Option<f64>,
}

#[derive(Debug, Clone)]
struct ClassRecord {
    pck: PckAccumulator,
    accuracy: Vec<f64>,
    precision: Vec<f64>,
    f1: Vec<f64>,
    objective_total: f64,
    pairs: usize,
}

impl ClassRecord {
    fn new(thresholds: usize) -> Self {
        Self {
            pck: PckAccumulator::new(thresholds),
            accuracy: Vec::new(),
            precision: Vec::new(),
            f1: Vec::new(),
            objective_total: 0.0,
            pairs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub class: String,
    pub pck: Vec<f64>,
    pub accuracy: MetricSummary,
    pub precision: MetricSummary,
    pub f1: MetricSummary,
    pub objective: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub alphas: Vec<f64>,
    pub classes: Vec<ClassReport>,
    /// Mean over classes of each class's pooled PCK.
    pub mean_pck: Vec<f64>,
    pub accuracy: MetricSummary,
    pub precision: MetricSummary,
    pub f1: MetricSummary,
    pub mean_objective: f64,
}

/// Accumulates per-class matching metrics across batches.
///
/// PCK numerators and denominators are pooled per class before dividing;
/// accuracy, precision and F1 are kept as per-pair lists.
#[derive(Debug, Clone)]
pub struct Evaluator {
    pck: PckConfig,
    classes: IndexMap<String, ClassRecord>,
}

impl Evaluator {
    pub fn new(pck: PckConfig) -> Self {
        Self {
            pck,
            classes: IndexMap::new(),
        }
    }

    pub fn record(
        &mut self,
        class: &str,
        outcome: &PairOutcome,
        ground_truth: &DMatrix<f64>,
        keypoints: Option<&KeypointSample>,
    ) -> Result<()> {
        let n1 = outcome.shape.n1;
        let accuracy = matching_accuracy(&outcome.permutation, ground_truth, n1)?.ratio();
        let precision = matching_precision(&outcome.permutation, ground_truth, n1)?.ratio();
        let objective = objective_score(&outcome.permutation, &outcome.affinity)?;

        let pck_counts = keypoints
            .map(|sample| {
                let length = sample.reference_length.unwrap_or(self.pck.reference_length);
                let thresholds: Vec<f64> =
                    self.pck.alphas.iter().map(|alpha| alpha * length).collect();
                pck(
                    &sample.candidates,
                    &sample.ground_truth,
                    &outcome.permutation,
                    &thresholds,
                    n1,
                )
            })
            .transpose()?;

        let thresholds = self.pck.alphas.len();
        let record = self
            .classes
            .entry(class.to_string())
            .or_insert_with(|| ClassRecord::new(thresholds));
        if let Some(counts) = pck_counts {
            record.pck.add(&counts)?;
        }
        record.accuracy.push(accuracy);
        record.precision.push(precision);
        record.f1.push(f1_score(precision, accuracy));
        record.objective_total += objective;
        record.pairs += 1;
        Ok(())
    }

    pub fn report(&self) -> EvaluationReport {
        let classes: Vec<ClassReport> = self
            .classes
            .iter()
            .map(|(class, record)| ClassReport {
                class: class.clone(),
                pck: record.pck.ratios(),
                accuracy: MetricSummary::from_values(&record.accuracy),
                precision: MetricSummary::from_values(&record.precision),
                f1: MetricSummary::from_values(&record.f1),
                objective: if record.pairs > 0 {
                    record.objective_total / record.pairs as f64
                } else {
                    0.0
                },
            })
            .collect();

        let class_count = classes.len().max(1) as f64;
        let mean_pck = (0..self.pck.alphas.len())
            .map(|idx| classes.iter().map(|c| c.pck[idx]).sum::<f64>() / class_count)
            .collect();
        let mean_objective = classes.iter().map(|c| c.objective).sum::<f64>() / class_count;

        let (mut accuracy, mut precision, mut f1) = (Vec::new(), Vec::new(), Vec::new());
        for record in self.classes.values() {
            accuracy.extend_from_slice(&record.accuracy);
            precision.extend_from_slice(&record.precision);
            f1.extend_from_slice(&record.f1);
        }

        EvaluationReport {
            alphas: self.pck.alphas.clone(),
            accuracy: MetricSummary::from_values(&accuracy),
            precision: MetricSummary::from_values(&precision),
            f1: MetricSummary::from_values(&f1),
            classes,
            mean_pck,
            mean_objective,
        }
    }

    /// Logs the per-class and averaged report at `info` level.
    pub fn log_report(&self) {
        let report = self.report();
        for (idx, alpha) in report.alphas.iter().enumerate() {
            info!("PCK@{:.2}", alpha);
            for class in &report.classes {
                info!("{} = {:.4}", class.class, class.pck[idx]);
            }
            info!("average PCK = {:.4}", report.mean_pck[idx]);
        }
        info!("Matching accuracy");
        for (class, record) in &self.classes {
            info!(
                "{}: {}",
                class,
                format_accuracy_metric(&record.precision, &record.accuracy, &record.f1)
            );
        }
        info!(
            "average accuracy: p = {:.4}±{:.4}, r = {:.4}±{:.4}, f1 = {:.4}±{:.4}",
            report.precision.mean,
            report.precision.std,
            report.accuracy.mean,
            report.accuracy.std,
            report.f1.mean,
            report.f1.std
        );
        info!("Objective score");
        for class in &report.classes {
            info!("{} = {:.4}", class.class, class.objective);
        }
        info!("average objscore = {:.4}", report.mean_objective);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PckConfig;
    use crate::convergence::Convergence;
    use crate::graph::PairShape;

    fn outcome(permutation: DMatrix<f64>) -> PairOutcome {
        let n = permutation.nrows();
        PairOutcome {
            shape: PairShape::new(n, n, n, n).expect("shape"),
            affinity: DMatrix::identity(n * n, n * n),
            doubly_stochastic: permutation.clone(),
            soft: permutation.clone(),
            permutation,
            displacement: None,
            spectral: Convergence::default(),
            bi_stochastic: Convergence::default(),
        }
    }

    #[test]
    fn classes_keep_insertion_order_and_pool_pck() {
        let mut evaluator = Evaluator::new(PckConfig {
            alphas: vec![0.1],
            reference_length: 10.0,
        });
        let identity = DMatrix::<f64>::identity(2, 2);
        let swapped = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        let points = DMatrix::from_row_slice(2, 2, &[0.0, 0.0, 5.0, 5.0]);
        let sample = KeypointSample {
            candidates: points.clone(),
            ground_truth: points,
            reference_length: None,
        };

        evaluator
            .record("car", &outcome(identity.clone()), &identity, Some(&sample))
            .expect("record");
        evaluator
            .record("bike", &outcome(swapped), &identity, Some(&sample))
            .expect("record");
        evaluator
            .record("car", &outcome(identity.clone()), &identity, Some(&sample))
            .expect("record");

        let report = evaluator.report();
        assert_eq!(report.classes[0].class, "car");
        assert_eq!(report.classes[1].class, "bike");
        assert_eq!(report.classes[0].pck, vec![1.0]);
        assert_eq!(report.classes[1].pck, vec![0.0]);
        assert_eq!(report.mean_pck, vec![0.5]);
        assert_eq!(report.classes[0].accuracy.mean, 1.0);
        assert_eq!(report.classes[1].f1.mean, 0.0);
        assert_eq!(report.classes[0].objective, 2.0);
    }
}
