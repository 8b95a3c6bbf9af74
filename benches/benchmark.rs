// Fit and query benchmarks over synthetic design lists
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use moldrec_core::{fit, recommend, DesignRecord, RecordTable, Snapshot};
use rand::prelude::*;

const CATEGORIES: &[&str] = &["사출금형", "프레스금형", "다이캐스팅", "블로우금형"];
const PARTS: &[&str] = &[
    "핸들커버", "손잡이", "브라켓", "가이드", "레일", "하우징", "커넥터", "캡", "패널", "그릴",
    "스위치", "힌지", "베젤", "덕트", "클립",
];
const REMARKS: &[&str] = &["", "(구형)", "(신형)", "(좌)", "(우)", "(LH/RH)"];

fn generate_table(size: usize) -> RecordTable {
    let mut rng = rand::rng();
    (0..size)
        .map(|i| {
            let part = format!(
                "{} {}{}",
                PARTS[rng.random_range(0..PARTS.len())],
                PARTS[rng.random_range(0..PARTS.len())],
                REMARKS[rng.random_range(0..REMARKS.len())]
            );
            DesignRecord::new(
                format!("25-{:04}", i),
                CATEGORIES[rng.random_range(0..CATEGORIES.len())],
                part,
            )
        })
        .collect()
}

fn benchmark_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");

    for size in [100, 1000, 5000].iter() {
        let table = generate_table(*size);
        group.bench_with_input(BenchmarkId::new("tfidf", size), &table, |b, table| {
            b.iter(|| fit(black_box(table)));
        });
    }

    group.finish();
}

fn benchmark_recommend(c: &mut Criterion) {
    let mut group = c.benchmark_group("recommend");

    for size in [100, 1000, 5000].iter() {
        let table = generate_table(*size);
        let (model, matrix) = fit(&table);
        group.bench_with_input(BenchmarkId::new("top10", size), size, |b, _| {
            b.iter(|| recommend(black_box("사출금형 핸들커버(신형)"), &model, &matrix, &table, 10));
        });
    }

    group.finish();
}

fn benchmark_snapshot_rebuild(c: &mut Criterion) {
    let table = generate_table(2000);
    c.bench_function("snapshot_build_2000", |b| {
        b.iter(|| Snapshot::build(black_box(table.clone()), 1));
    });
}

criterion_group!(benches, benchmark_fit, benchmark_recommend, benchmark_snapshot_rebuild);
criterion_main!(benches);
