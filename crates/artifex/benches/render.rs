//! Cold renders (transform + load + render) against cached ones.

use std::rc::Rc;

use artifex::runtime;
use artifex::{CapabilityRegistry, Engine, EngineConfig};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn list_component(items: usize) -> String {
    format!(
        r#"
        import React from 'react';

        export default function List() {{
          const items = Array.from({{ length: {items} }}, (_, i) => ({{ id: i, label: `Item ${{i}}` }}));
          return (
            <ul className="list">
              {{items.map((item) => <li key={{item.id}} data-even={{item.id % 2 === 0}}>{{item.label}}</li>)}}
            </ul>
          );
        }}
        "#
    )
}

fn engine() -> Engine {
    let registry = CapabilityRegistry::builder()
        .register("react", runtime::namespace())
        .build()
        .expect("registry");
    Engine::new(Rc::new(registry), EngineConfig::default()).expect("engine")
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for n in [10, 100, 1000] {
        let source = list_component(n);

        group.bench_with_input(BenchmarkId::new("cold", n), &source, |b, source| {
            b.iter(|| {
                let mut engine = engine();
                engine.render(Some(source), None)
            });
        });

        group.bench_with_input(BenchmarkId::new("new_data", n), &source, |b, source| {
            let mut engine = engine();
            let mut round = 0u64;
            b.iter(|| {
                round += 1;
                engine.render(Some(source), Some(&serde_json::json!({ "round": round })))
            });
        });

        group.bench_with_input(BenchmarkId::new("cached", n), &source, |b, source| {
            let mut engine = engine();
            engine.render(Some(source), None);
            b.iter(|| engine.render(Some(source), None));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
