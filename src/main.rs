use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use spgm::datasets::write_report;
use spgm::{BatchLoader, Evaluator, MatchingConfig, MatchingWorkflow};

fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

struct Args {
    batch: PathBuf,
    config: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let batch = args
        .next()
        .context("usage: spgm <batch.json> [config.json] [report.json]")?;
    let config = args.next().map(PathBuf::from);
    let report = args.next().map(PathBuf::from);
    if let Some(extra) = args.next() {
        anyhow::bail!("Unexpected extra argument: {extra}");
    }
    Ok(Args {
        batch: PathBuf::from(batch),
        config,
        report,
    })
}

fn main() -> Result<()> {
    init_logging();
    let args = parse_args()?;

    let batch = BatchLoader::from_path(&args.batch)
        .with_context(|| format!("load batch from {:?}", args.batch))?;
    let config = match (&args.config, batch.config.clone()) {
        (Some(path), _) => MatchingConfig::from_path(path)
            .with_context(|| format!("load config from {:?}", path))?,
        (None, Some(config)) => config,
        (None, None) => MatchingConfig::default(),
    };
    info!(
        "Batch {:?}: {} pairs, voting alpha {}, alphas {:?}",
        args.batch,
        batch.pairs.len(),
        config.voting.alpha,
        config.pck.alphas
    );

    let workflow = MatchingWorkflow::new(config).context("validate matching config")?;
    let pairs: Vec<_> = batch.pairs.iter().map(|loaded| loaded.pair.clone()).collect();
    let summary = workflow.execute(&pairs).context("match graph pairs")?;

    let mut evaluator = Evaluator::new(workflow.config().pck.clone());
    let mut evaluated = 0;
    for (loaded, outcome) in batch.pairs.iter().zip(&summary.outcomes) {
        let Some(ground_truth) = &loaded.ground_truth else {
            continue;
        };
        evaluator
            .record(
                &loaded.class,
                outcome,
                ground_truth,
                loaded.keypoints.as_ref(),
            )
            .with_context(|| format!("evaluate pair of class {}", loaded.class))?;
        evaluated += 1;
    }

    if evaluated == 0 {
        warn!("No pair carried ground truth; skipping evaluation");
        return Ok(());
    }
    info!("Evaluated {} of {} pairs", evaluated, summary.outcomes.len());
    evaluator.log_report();

    if let Some(path) = &args.report {
        write_report(path, &evaluator.report())?;
        info!("Wrote evaluation report to {:?}", path);
    }
    Ok(())
}
