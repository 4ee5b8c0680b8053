//! Criterion benchmarks for sweep expansion and history aggregation
//!
//! Run with: cargo bench -p sweeplab_core

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sweeplab_core::formula::{EnergyFormulas, FormulaSet};
use sweeplab_core::history::load_history;
use sweeplab_core::spec::{ParamValue, ParameterSpec};
use sweeplab_core::store::{ResultRow, RunsDirectory};
use sweeplab_core::sweep::{expand, total_series};

/// `dims` list parameters of `len` values each, interleaved with scalars
fn create_spec(dims: usize, len: usize) -> ParameterSpec {
    let mut spec = ParameterSpec::new();
    for d in 0..dims {
        let values: Vec<f64> = (0..len).map(|v| v as f64 * 0.5).collect();
        spec.insert(format!("p{d}"), ParamValue::List(values))
            .expect("unique names");
        spec.insert(format!("c{d}"), d as f64).expect("unique names");
    }
    spec
}

fn bench_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("expand");

    for (dims, len) in [(2, 10), (3, 10), (4, 10), (2, 100)] {
        let spec = create_spec(dims, len);
        group.bench_with_input(
            BenchmarkId::new("series", total_series(&spec).unwrap_or(0)),
            &spec,
            |b, spec| b.iter(|| expand(black_box(spec))),
        );
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let inputs = [2.0, 9.8, 3.0, 4.0, 30.0, 1.0];

    c.bench_function("energy_formulas", |b| {
        b.iter(|| EnergyFormulas.evaluate(black_box(&inputs)))
    });
}

fn bench_load_history(c: &mut Criterion) {
    let temp = tempfile::tempdir().expect("temp dir");
    let runs = RunsDirectory::new(temp.path());

    for _ in 0..20 {
        let files = runs.create_run().expect("create run");
        for series in 1..=50 {
            let row = ResultRow {
                columns: vec!["series".to_string(), "x".to_string(), "y".to_string()],
                values: vec![series as f64, series as f64 * 0.1, series as f64 * 2.0],
            };
            files.append_row(&row).expect("append row");
        }
    }

    c.bench_function("load_history_20x50", |b| {
        b.iter(|| load_history(black_box(&runs)))
    });
}

criterion_group!(benches, bench_expand, bench_evaluate, bench_load_history);
criterion_main!(benches);
