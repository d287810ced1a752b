//! Benchmark: reactive fan-out and keyed list reconciliation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trellis_core::prelude::*;

fn keyed_list(keys: &[usize]) -> VNode {
    let items = keys
        .iter()
        .map(|k| element("li", Some(Props::new().with("key", *k as i32)), k.to_string()))
        .collect::<Vec<_>>();
    element("ul", None, items)
}

fn benchmark_trigger_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_fan_out");
    for subscribers in [10usize, 100, 1000] {
        let source = Ref::new(0i64);
        let runners: Vec<_> = (0..subscribers)
            .map(|_| {
                let source = source.clone();
                effect(move || {
                    black_box(source.get());
                })
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, _| {
            let mut next = 0;
            b.iter(|| {
                next += 1;
                source.set(next);
            });
        });
        for runner in runners {
            runner.stop();
        }
    }
    group.finish();
}

fn benchmark_computed_chain(c: &mut Criterion) {
    let source = Ref::new(0i64);
    let mut tail = {
        let source = source.clone();
        computed(move || Value::from(source.get() as f64))
    };
    for _ in 0..50 {
        let prev = tail.clone();
        tail = computed(move || Value::from(prev.get().as_f64().unwrap_or(0.0) + 1.0));
    }

    c.bench_function("computed_chain_50", |b| {
        let mut next = 0;
        b.iter(|| {
            next += 1;
            source.set(next);
            black_box(tail.get());
        });
    });
}

fn benchmark_keyed_reverse(c: &mut Criterion) {
    let mut group = c.benchmark_group("keyed_reverse");
    for len in [10usize, 100, 1000] {
        let forward: Vec<usize> = (0..len).collect();
        let backward: Vec<usize> = forward.iter().rev().copied().collect();
        let renderer = Renderer::new(TestHost::new());
        let root = renderer.host().create_root();

        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, _| {
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                let keys = if flip { &backward } else { &forward };
                let _ = renderer.render(Some(keyed_list(keys)), root);
                renderer.host().reset_ops();
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_trigger_fan_out,
    benchmark_computed_chain,
    benchmark_keyed_reverse
);
criterion_main!(benches);
