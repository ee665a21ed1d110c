//! Performance benchmarks for rating calculations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use session_elo::rating::{
    EloRatingEngine, InMemoryPlayerStore, PlayerStore, RatingEngine, ResultProcessor,
};
use session_elo::types::{Player, RawResult};
use std::sync::Arc;

fn field(size: usize) -> Vec<(Player, f64)> {
    (0..size)
        .map(|i| {
            (
                Player::with_rating(format!("player{}", i), 1000.0 + (i as f64 * 37.0) % 900.0, 32.0),
                ((i * 7) % size) as f64,
            )
        })
        .collect()
}

fn bench_rating_calculations(c: &mut Criterion) {
    let engine = EloRatingEngine::default();
    let mut group = c.benchmark_group("report_game");

    for size in [2usize, 4, 8, 16, 32] {
        let entries = field(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &entries, |b, entries| {
            b.iter(|| black_box(engine.report_game(entries.clone())))
        });
    }

    group.finish();
}

fn bench_expectation(c: &mut Criterion) {
    let engine = EloRatingEngine::default();

    c.bench_function("estimate_score_vs_one", |b| {
        b.iter(|| black_box(engine.estimate_score_vs_one(black_box(1200.0), black_box(1650.0))))
    });
}

fn bench_result_processing(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = Arc::new(InMemoryPlayerStore::default());
    let processor = ResultProcessor::new(store.clone(), Arc::new(EloRatingEngine::default()));

    let batch: Vec<RawResult> = (0..8)
        .map(|i| RawResult::new(i.to_string(), format!("player{}", i), (i * 3 % 8) as f64))
        .collect();

    c.bench_function("process_8_player_batch", |b| {
        b.iter(|| rt.block_on(async { black_box(processor.process(batch.clone()).await) }))
    });

    c.bench_function("leaderboard_page", |b| {
        b.iter(|| black_box(store.get_leaderboard(20, 0)))
    });
}

criterion_group!(
    benches,
    bench_rating_calculations,
    bench_expectation,
    bench_result_processing
);
criterion_main!(benches);
