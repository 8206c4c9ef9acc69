//! Criterion benchmarks for the evaluation engine.

use circuitry_core::engine::Circuit;
use circuitry_core::test_utils::*;
use criterion::{Criterion, criterion_group, criterion_main};

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step");
    group.sample_size(50);

    // 100 chains x 100 OR gates, all settled: measures the evaluate pass.
    group.bench_function("quiescent_10k_gates", |b| {
        let mut circuit = Circuit::default();
        build_or_chains(&mut circuit, 100, 100);
        for _ in 0..5 {
            circuit.step().unwrap();
        }
        b.iter(|| circuit.step().unwrap());
    });

    // Flip every switch each iteration so a wave runs down every chain.
    group.bench_function("propagating_10k_gates", |b| {
        let mut circuit = Circuit::default();
        let switches = build_or_chains(&mut circuit, 100, 100);
        let mut level = false;
        b.iter(|| {
            level = !level;
            for &s in &switches {
                circuit.set_value(s, level).unwrap();
            }
            circuit.step().unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
