use criterion::{Criterion, black_box, criterion_group, criterion_main};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use spgm::config::{BiStochasticConfig, MatchingConfig, PowerIterationConfig};
use spgm::graph::{IncidenceBuilder, PairShape};
use spgm::{
    GraphPair, MatchingWorkflow, build_affinity, match_permutation, normalize_bistochastic,
    solve_spectral,
};

fn random_pair(nodes: usize, probability: f64, seed: u64) -> GraphPair {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let mut edges = Vec::new();
    for i in 0..nodes {
        for j in (i + 1)..nodes {
            if rng.gen_bool(probability) {
                edges.push((i, j));
                edges.push((j, i));
            }
        }
    }
    let src = IncidenceBuilder::from_edges(nodes, edges.len(), nodes, &edges).expect("src");
    let tgt = src.clone();
    let node_scores = DMatrix::from_fn(nodes, nodes, |i, a| {
        if i == a { 1.0 } else { rng.gen_range(0.0..0.5) }
    });
    let edge_count = edges.len();
    let edge_scores = DMatrix::from_fn(edge_count, edge_count, |e1, e2| {
        if e1 == e2 { 1.0 } else { rng.gen_range(0.0..0.2) }
    });
    GraphPair {
        node_scores,
        edge_scores,
        src,
        tgt,
        points: None,
    }
}

fn bench_matching_pipeline(c: &mut Criterion) {
    let pair_small = random_pair(10, 0.4, 42);
    let pair_medium = random_pair(20, 0.2, 7);

    let mut group = c.benchmark_group("matching_pipeline");

    group.bench_function("affinity_10", |b| {
        b.iter(|| {
            let m = build_affinity(
                &pair_small.node_scores,
                &pair_small.edge_scores,
                &pair_small.src,
                &pair_small.tgt,
            )
            .expect("affinity");
            black_box(m);
        });
    });

    group.bench_function("affinity_20", |b| {
        b.iter(|| {
            let m = build_affinity(
                &pair_medium.node_scores,
                &pair_medium.edge_scores,
                &pair_medium.src,
                &pair_medium.tgt,
            )
            .expect("affinity");
            black_box(m);
        });
    });

    group.bench_function("spectral_20", |b| {
        let m = build_affinity(
            &pair_medium.node_scores,
            &pair_medium.edge_scores,
            &pair_medium.src,
            &pair_medium.tgt,
        )
        .expect("affinity");
        let shape = PairShape::of(&pair_medium.src, &pair_medium.tgt).expect("shape");
        let config = PowerIterationConfig::default();
        b.iter(|| {
            let solution = solve_spectral(&m, shape, &config).expect("spectral");
            black_box(solution);
        });
    });

    group.bench_function("sinkhorn_hungarian_64", |b| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let s = DMatrix::from_fn(64, 64, |_, _| rng.gen_range(0.01..1.0));
        let config = BiStochasticConfig::default();
        b.iter(|| {
            let normalized = normalize_bistochastic(&s, 64, 64, &config).expect("sinkhorn");
            let permutation = match_permutation(&normalized.matrix, 64, 64).expect("hungarian");
            black_box(permutation);
        });
    });

    group.bench_function("workflow_batch_8x10", |b| {
        let workflow = MatchingWorkflow::new(MatchingConfig::default()).expect("workflow");
        let pairs: Vec<GraphPair> = (0..8).map(|seed| random_pair(10, 0.4, seed)).collect();
        b.iter(|| {
            let summary = workflow.execute(&pairs).expect("execute");
            black_box(summary.stats.clone());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_matching_pipeline);
criterion_main!(benches);
