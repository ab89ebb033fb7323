//! Benchmarks for encoding and ranking.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glyph_churn::{ChurnModel, Labels, ModelConfig, PatternAnnotation, Record, TrainingEntry};

fn metrics(i: usize) -> Record {
    Record::new()
        .with_numeric("logins", (i * 7 % 200) as f64)
        .with_numeric("support_cases", (i % 20) as f64)
        .with_numeric("defects", (i % 15) as f64)
        .with_numeric("feature_adoption", (i * 3 % 100) as f64)
}

fn entries(n: usize) -> Vec<TrainingEntry> {
    let risks = ["high", "medium", "low"];
    (0..n)
        .map(|i| {
            TrainingEntry::new(
                metrics(i),
                PatternAnnotation {
                    name: format!("pattern_{i}"),
                    labels: Labels::new(risks[i % 3], "low_usage", "stable"),
                    ..PatternAnnotation::default()
                },
            )
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let model = ChurnModel::load(ModelConfig::churn(), &[]).unwrap();
    let record = metrics(11);

    // Warm the symbol cache so only binding and bundling are measured.
    model.encoder().encode(&record).unwrap();

    c.bench_function("encode_10k", |bench| {
        bench.iter(|| black_box(model.encoder().encode(&record)))
    });
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [16usize, 128, 1024].iter() {
        let model = ChurnModel::load(ModelConfig::churn(), &entries(*size)).unwrap();
        let record = metrics(5);

        group.bench_with_input(BenchmarkId::new("top5", size), size, |bench, _| {
            bench.iter(|| black_box(model.query(record.clone(), 5)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_query);
criterion_main!(benches);
