//! Benchmarks for error logging.
//!
//! Measures fingerprinting plus counter update for a nested error, and the
//! cost of reading the counters back as JSON.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sidereal_errorstats::{visit, ErrorStats, Visitor};

#[derive(Debug, thiserror::Error)]
#[error("outer")]
struct Outer {
    message: String,
    middle: Middle,
    inner: Box<Inner>,
}

#[derive(Debug, thiserror::Error)]
#[error("middle")]
struct Middle {
    message: String,
}

#[derive(Debug, thiserror::Error)]
#[error("inner")]
struct Inner {
    message: String,
}

fn stats() -> ErrorStats {
    let stats = ErrorStats::new();
    stats.set_encoder(|e: &Outer, v: &Visitor<'_>| visit!(v, e.message, e.middle, e.inner));
    stats.set_encoder(|e: &Middle, _: &Visitor<'_>| e.message.clone());
    stats.set_encoder(|e: &Inner, _: &Visitor<'_>| e.message.clone());
    stats
}

fn outer(n: usize) -> Outer {
    Outer {
        message: format!("err-{n}"),
        middle: Middle {
            message: "err-two".to_owned(),
        },
        inner: Box::new(Inner {
            message: "err-three".to_owned(),
        }),
    }
}

fn bench_log(c: &mut Criterion) {
    let stats = stats();
    let err = outer(1);

    c.bench_function("log_nested", |b| b.iter(|| stats.log(black_box(&err))));
}

fn bench_log_boxed(c: &mut Criterion) {
    let stats = stats();
    let err = Arc::new(outer(1));

    c.bench_function("log_nested_arc", |b| b.iter(|| stats.log(black_box(&err))));
}

fn bench_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("json");

    for distinct in [1, 100, 10_000] {
        let stats = stats();
        for n in 0..distinct {
            stats.log(&outer(n));
        }

        group.bench_with_input(BenchmarkId::from_parameter(distinct), &stats, |b, stats| {
            b.iter(|| black_box(stats.json()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_log, bench_log_boxed, bench_json);
criterion_main!(benches);
