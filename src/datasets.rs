use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result, bail};
use nalgebra::DMatrix;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::affinity::{edge_scores, node_scores};
use crate::config::MatchingConfig;
use crate::graph::{GraphFeatures, Incidence, IncidenceBuilder, RawIncidence, edge_features};
use crate::pipeline::{EvaluationReport, GraphPair, KeypointSample};

const DEFAULT_CLASS: &str = "default";

/// Row-major nested matrix as it appears in batch files.
type RawMatrix = Vec<Vec<f64>>;

#[derive(Debug, Clone, Deserialize)]
struct RawBatch {
    #[serde(default)]
    config: Option<MatchingConfig>,
    pairs: Vec<RawPair>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawPair {
    #[serde(default)]
    class: Option<String>,
    src: RawIncidence,
    tgt: RawIncidence,
    #[serde(default)]
    node_scores: Option<RawMatrix>,
    #[serde(default)]
    edge_scores: Option<RawMatrix>,
    #[serde(default)]
    features: Option<RawFeatures>,
    #[serde(default)]
    ground_truth: Option<RawMatrix>,
    #[serde(default)]
    keypoints: Option<RawKeypoints>,
}

/// Node features (`C × N_max`) and the two `C × C` edge weights `λ1`, `λ2`.
#[derive(Debug, Clone, Deserialize)]
struct RawFeatures {
    source: RawMatrix,
    target: RawMatrix,
    lambda1: RawMatrix,
    lambda2: RawMatrix,
}

#[derive(Debug, Clone, Deserialize)]
struct RawKeypoints {
    source: RawMatrix,
    target: RawMatrix,
    #[serde(default)]
    reference_length: Option<f64>,
}

/// One pair read from a batch file together with its evaluation inputs.
#[derive(Debug, Clone)]
pub struct LoadedPair {
    pub class: String,
    pub pair: GraphPair,
    pub ground_truth: Option<DMatrix<f64>>,
    pub keypoints: Option<KeypointSample>,
}

#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub config: Option<MatchingConfig>,
    pub pairs: Vec<LoadedPair>,
}

/// Reads graph-pair batches from JSON.
///
/// Each pair carries its incidence and either precomputed `node_scores` /
/// `edge_scores` or raw `features` from which both are derived.
pub struct BatchLoader;

impl BatchLoader {
    pub fn from_path(path: &Path) -> Result<LoadedBatch> {
        let raw: RawBatch = read_json(path)?;
        Self::from_raw(raw).with_context(|| format!("build graph pairs from {:?}", path))
    }

    pub fn from_json_str(json: &str) -> Result<LoadedBatch> {
        let raw: RawBatch = serde_json::from_str(json).context("parse batch json")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawBatch) -> Result<LoadedBatch> {
        let pairs = raw
            .pairs
            .into_iter()
            .enumerate()
            .map(|(idx, pair)| load_pair(pair).with_context(|| format!("pair {idx}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(LoadedBatch {
            config: raw.config,
            pairs,
        })
    }
}

fn load_pair(raw: RawPair) -> Result<LoadedPair> {
    let src = IncidenceBuilder::from_raw(&raw.src).context("source incidence")?;
    let tgt = IncidenceBuilder::from_raw(&raw.tgt).context("target incidence")?;

    let (node_scores, edge_scores) = match (raw.node_scores, raw.edge_scores, raw.features) {
        (Some(mp), Some(me), None) => (
            to_matrix(&mp, tgt.node_capacity()).context("node_scores")?,
            to_matrix(&me, tgt.edge_capacity()).context("edge_scores")?,
        ),
        (None, None, Some(features)) => scores_from_features(&features, &src, &tgt)?,
        _ => bail!("a pair needs either node_scores and edge_scores, or features"),
    };

    let ground_truth = raw
        .ground_truth
        .as_ref()
        .map(|gt| to_matrix(gt, tgt.node_capacity()))
        .transpose()
        .context("ground_truth")?;

    let points = raw
        .keypoints
        .as_ref()
        .map(|kp| -> Result<_> {
            let source = to_matrix(&kp.source, 0).context("source keypoints")?;
            let target = to_matrix(&kp.target, 0).context("target keypoints")?;
            Ok((source, target, kp.reference_length))
        })
        .transpose()?;

    // PCK compares predicted target locations with where each source point truly lands.
    let keypoints = match (&points, &ground_truth) {
        (Some((_, target, reference_length)), Some(gt)) => {
            if gt.ncols() != target.nrows() {
                bail!(
                    "ground_truth has {} columns but {} target keypoints were given",
                    gt.ncols(),
                    target.nrows()
                );
            }
            Some(KeypointSample {
                candidates: target.clone(),
                ground_truth: gt * target,
                reference_length: *reference_length,
            })
        }
        _ => None,
    };

    Ok(LoadedPair {
        class: raw.class.unwrap_or_else(|| DEFAULT_CLASS.to_string()),
        pair: GraphPair {
            node_scores,
            edge_scores,
            src,
            tgt,
            points: points.map(|(source, target, _)| (source, target)),
        },
        ground_truth,
        keypoints,
    })
}

fn scores_from_features(
    raw: &RawFeatures,
    src: &Incidence,
    tgt: &Incidence,
) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
    let source = GraphFeatures {
        features: to_matrix(&raw.source, src.node_capacity()).context("source features")?,
        node_count: src.node_count(),
    };
    let target = GraphFeatures {
        features: to_matrix(&raw.target, tgt.node_capacity()).context("target features")?,
        node_count: tgt.node_count(),
    };
    let lambda1 = to_matrix(&raw.lambda1, 0).context("edge weight lambda1")?;
    let lambda2 = to_matrix(&raw.lambda2, 0).context("edge weight lambda2")?;

    let mp = node_scores(&source, &target).context("node scores from features")?;
    let x = edge_features(&source, src).context("source edge features")?;
    let y = edge_features(&target, tgt).context("target edge features")?;
    let me = edge_scores(&x, src, &y, tgt, &lambda1, &lambda2)
        .context("edge scores from features")?;
    Ok((mp, me))
}

/// Dense matrix from row-major nested vectors. An empty list becomes `0 × empty_cols`.
fn to_matrix(rows: &[Vec<f64>], empty_cols: usize) -> Result<DMatrix<f64>> {
    let Some(first) = rows.first() else {
        return Ok(DMatrix::zeros(0, empty_cols));
    };
    let cols = first.len();
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols) {
        bail!("row {idx} has {} entries, expected {cols}", row.len());
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(DMatrix::from_row_slice(rows.len(), cols, &flat))
}

pub fn write_report(path: &Path, report: &EvaluationReport) -> Result<()> {
    write_json(path, report)
}

fn read_json<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let file = File::open(path).with_context(|| format!("open batch json file {:?}", path))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).with_context(|| format!("deserialize batch json file {:?}", path))
}

fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report parent directory {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("create report file {:?}", path))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)
        .with_context(|| format!("serialize report file {:?}", path))
}
