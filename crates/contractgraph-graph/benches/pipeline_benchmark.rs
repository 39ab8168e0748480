use contractgraph_core::{ContextFile, EngineConfig, RawFileChange};
use contractgraph_graph::ContractDiffEngine;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

/// A chain of modules where each one renders the previous one's export; the
/// first module drops a prop in the after snapshot.
fn create_component_chain(length: usize) -> (Vec<RawFileChange>, Vec<ContextFile>) {
    let leaf_before = "export function C0({ a, b }) {\n  return a;\n}\n";
    let leaf_after = "export function C0({ a }) {\n  return a;\n}\n";
    let records = vec![RawFileChange::modified("src/c0.tsx", leaf_before, leaf_after)];

    let context = (1..length)
        .map(|i| {
            let source = format!(
                "import {{ C{prev} }} from './c{prev}';\n\n\
                 export function C{i}({{ a, b }}) {{\n  return <C{prev} a={{a}} b={{b}} />;\n}}\n",
                prev = i - 1,
                i = i
            );
            ContextFile::new(&format!("src/c{}.tsx", i), &source)
        })
        .collect();
    (records, context)
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("contract_diff_pipeline");
    group.measurement_time(Duration::from_secs(5));

    let engine = ContractDiffEngine::new(EngineConfig::default()).unwrap();
    for size in [10, 100, 500].iter() {
        let (records, context) = create_component_chain(*size);
        group.bench_with_input(BenchmarkId::new("chain", size), size, |b, _| {
            b.iter(|| {
                let output = engine
                    .run(black_box(records.clone()), black_box(context.clone()))
                    .unwrap();
                black_box(output.report.affected_identities.len())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
