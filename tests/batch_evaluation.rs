use anyhow::Result;
use nalgebra::DMatrix;
use spgm::config::PckConfig;
use spgm::metrics::{PckAccumulator, pck};
use spgm::{BatchLoader, Evaluator, MatchingWorkflow};

const TRIANGLES: &str = r#"{
    "config": { "pck": { "alphas": [0.05, 0.10], "reference_length": 100.0 } },
    "pairs": [
        {
            "class": "duck",
            "src": { "node_capacity": 3, "edge_capacity": 6, "node_count": 3, "fully_connected": true },
            "tgt": { "node_capacity": 3, "edge_capacity": 6, "node_count": 3, "fully_connected": true },
            "node_scores": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            "edge_scores": [
                [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 0.0, 0.0, 1.0]
            ],
            "ground_truth": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            "keypoints": {
                "source": [[0.0, 0.0], [40.0, 0.0], [0.0, 40.0]],
                "target": [[1.0, 1.0], [41.0, 1.0], [1.0, 41.0]]
            }
        }
    ]
}"#;

#[test]
fn loaded_batch_evaluates_to_perfect_scores() -> Result<()> {
    let batch = BatchLoader::from_json_str(TRIANGLES)?;
    let config = batch.config.clone().expect("batch config");
    let workflow = MatchingWorkflow::new(config)?;
    let pairs: Vec<_> = batch.pairs.iter().map(|loaded| loaded.pair.clone()).collect();
    let summary = workflow.execute(&pairs)?;

    let mut evaluator = Evaluator::new(workflow.config().pck.clone());
    for (loaded, outcome) in batch.pairs.iter().zip(&summary.outcomes) {
        let ground_truth = loaded.ground_truth.as_ref().expect("ground truth");
        evaluator.record(&loaded.class, outcome, ground_truth, loaded.keypoints.as_ref())?;
    }
    let report = evaluator.report();
    assert_eq!(report.classes.len(), 1);
    assert_eq!(report.classes[0].class, "duck");
    assert_eq!(report.mean_pck, vec![1.0, 1.0]);
    assert_eq!(report.f1.mean, 1.0);

    let displacement = summary.outcomes[0]
        .displacement
        .as_ref()
        .expect("keypoints give a displacement");
    assert!((displacement.offsets[(1, 0)] - 1.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn pck_thresholds_scale_with_reference_length() -> Result<()> {
    let config = PckConfig {
        alphas: vec![0.05, 0.10],
        reference_length: 100.0,
    };
    let thresholds = config.thresholds();
    let truth = DMatrix::from_row_slice(3, 2, &[10.0, 10.0, 50.0, 20.0, 80.0, 90.0]);
    let identity = DMatrix::<f64>::identity(3, 3);

    // Every prediction 3 units (0.03 L) off.
    let close = DMatrix::from_fn(3, 2, |r, c| truth[(r, c)] + if c == 0 { 3.0 } else { 0.0 });
    // Every prediction 25 units (0.25 L) off.
    let far = DMatrix::from_fn(3, 2, |r, c| truth[(r, c)] + if c == 1 { 25.0 } else { 0.0 });

    let close_counts = pck(&close, &truth, &identity, &thresholds, 3)?;
    let far_counts = pck(&far, &truth, &identity, &thresholds, 3)?;

    let mut accumulator = PckAccumulator::new(2);
    accumulator.add(&close_counts)?;
    assert_eq!(accumulator.ratios(), vec![1.0, 1.0]);

    let mut far_only = PckAccumulator::new(2);
    far_only.add(&far_counts)?;
    assert_eq!(far_only.ratios(), vec![0.0, 0.0]);

    accumulator.merge(&far_only)?;
    assert_eq!(accumulator.ratios(), vec![0.5, 0.5]);
    Ok(())
}
