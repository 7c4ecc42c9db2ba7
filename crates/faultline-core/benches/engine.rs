//! End-to-end engine benchmarks over synthetic trees.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use faultline_core::generator::{generate, GeneratorConfig};
use faultline_core::{RiskAnalysis, Settings};
use faultline_model::{FaultTree, Model};

fn build_model(num_basic_events: usize, seed: u64) -> Arc<Model> {
    let config = GeneratorConfig {
        num_basic_events,
        num_gates: num_basic_events / 5,
        max_children: 3,
        seed,
        ..GeneratorConfig::default()
    };
    let (top, events) = generate(&config);
    let mut model = Model::new("bench");
    for event in &events {
        model.add_basic_event(event.clone()).unwrap();
    }
    model.add_gate(top.clone()).unwrap();
    let mut tree = FaultTree::new("ft");
    tree.add_gate(top);
    model.add_fault_tree(tree).unwrap();
    Arc::new(model)
}

fn bench_cut_sets(c: &mut Criterion) {
    let mut group = c.benchmark_group("cut-sets");
    for size in [50, 100, 200] {
        let model = build_model(size, 42);
        let settings = Settings::default().with_limit_order(4).with_num_workers(1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &model, |b, model| {
            b.iter(|| {
                RiskAnalysis::new(model.clone(), settings.clone())
                    .analyze()
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_quantification(c: &mut Criterion) {
    let model = build_model(100, 7);
    let settings = Settings::default()
        .with_probability_analysis(true)
        .with_importance_analysis(true)
        .with_limit_order(4)
        .with_num_sums(3)
        .with_num_workers(1);
    c.bench_function("quantification-100", |b| {
        b.iter(|| {
            RiskAnalysis::new(model.clone(), settings.clone())
                .analyze()
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_cut_sets, bench_quantification);
criterion_main!(benches);
