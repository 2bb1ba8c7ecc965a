//! Benchmark: write-then-propagate over chain and fan-out graphs.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use signal_flow::{Engine, Signal, SignalWriter};

fn build_chain(en: &mut Engine, depth: usize) -> (SignalWriter<i64>, Signal<i64>) {
    let (source, writer) = en.changeable(0i64);
    let mut cur = en.lift(&source, |x| x + 1);
    for _ in 1..depth {
        cur = en.lift(&cur, |x| x + 1);
    }
    (writer, cur)
}

fn build_fanout(en: &mut Engine, width: usize) -> (SignalWriter<i64>, Signal<i64>) {
    let (source, writer) = en.changeable(0i64);
    let legs: Vec<Signal<i64>> = (0..width)
        .map(|i| en.lift(&source, move |x| x + i as i64))
        .collect();
    let sum = en.lift_all(&legs, |vs| vs.iter().sum::<i64>());
    (writer, sum)
}

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain");
    for depth in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut en = Engine::new();
            let (writer, last) = build_chain(&mut en, depth);
            let mut v = 0i64;
            b.iter(|| {
                v += 1;
                en.write(&writer, black_box(v));
                en.propagate();
                black_box(last.read().unwrap())
            });
        });
    }
    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");
    for width in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            let mut en = Engine::new();
            let (writer, sum) = build_fanout(&mut en, width);
            let mut v = 0i64;
            b.iter(|| {
                v += 1;
                en.write(&writer, black_box(v));
                en.propagate();
                black_box(sum.read().unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_fanout);
criterion_main!(benches);
