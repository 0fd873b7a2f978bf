use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rankdex::{Config, Database, Id, IdSet, Membership};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Arc;

const UNIVERSE: u32 = 100_000;

/// Database with a shuffled "popular" list over the whole universe and a few filters
fn create_test_database() -> Database {
    let db = Database::in_memory(Config {
        query_pool_size: 8,
        ..Config::default()
    })
    .unwrap();

    let mut rng = rand::thread_rng();
    let mut popular: Vec<Id> = (1..=UNIVERSE).map(Id).collect();
    popular.shuffle(&mut rng);
    db.set_list("popular", popular);

    for (name, size) in [("tiny", 100), ("small", 400), ("medium", 5_000), ("large", 50_000)] {
        let members: Vec<Id> = (0..size).map(|_| Id(rng.gen_range(1..=UNIVERSE))).collect();
        db.set_set(name, members);
    }
    db
}

/// Scan-driven: every filter is large, so the sort source is walked
fn bench_scan_driven(c: &mut Criterion) {
    let db = create_test_database();
    let mut group = c.benchmark_group("scan_driven");

    for filter in ["medium", "large"] {
        group.bench_with_input(BenchmarkId::from_parameter(filter), filter, |b, filter| {
            b.iter(|| {
                let result = db.query().sort("popular").and(filter).limit(50).no_payload().execute().unwrap();
                black_box(result.len());
            });
        });
    }
    group.finish();
}

/// Set-driven: the smallest filter is under the threshold
fn bench_set_driven(c: &mut Criterion) {
    let db = create_test_database();
    let mut group = c.benchmark_group("set_driven");

    for filter in ["tiny", "small"] {
        group.bench_with_input(BenchmarkId::from_parameter(filter), filter, |b, filter| {
            b.iter(|| {
                let result = db
                    .query()
                    .sort("popular")
                    .and(filter)
                    .and("large")
                    .limit(50)
                    .no_payload()
                    .execute()
                    .unwrap();
                black_box(result.len());
            });
        });
    }
    group.finish();
}

fn bench_around(c: &mut Criterion) {
    let db = create_test_database();
    let popular = db.get_list("popular");
    let anchor = popular.to_vec()[UNIVERSE as usize / 2];

    c.bench_function("around_medium", |b| {
        b.iter(|| {
            let result = db.query().sort("popular").and("medium").around(anchor).limit(20).no_payload().execute().unwrap();
            black_box(result.len());
        });
    });
}

fn bench_set_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_build");
    for size in [16usize, 1_000, 100_000] {
        let ids: Vec<Id> = (0..size as u32).map(Id).collect();
        group.bench_with_input(BenchmarkId::new("list", size), &ids, |b, ids| {
            b.iter(|| black_box(Arc::new(IdSet::list(ids.clone())).len()));
        });
        group.bench_with_input(BenchmarkId::new("set", size), &ids, |b, ids| {
            b.iter(|| black_box(IdSet::set(ids.clone()).exists(Id(7))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scan_driven, bench_set_driven, bench_around, bench_set_build);
criterion_main!(benches);
