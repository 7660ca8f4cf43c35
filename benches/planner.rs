//! Benchmarks for batch planning.
//!
//! Planning runs once per pass over the full drain chunk, so it should stay
//! well under the cost of a single network round trip:
//! - 20,000 objects (default drain chunk): <5ms
//! - 100,000 objects: <25ms

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use spacesweep::models::{Entity, ObjectId, Relation};
use spacesweep::sweep::{Caps, Snapshot, plan};
use std::hint::black_box;

/// Builds a snapshot that is half relations and half entities, a third of
/// them holding values.
fn build_snapshot(total: usize) -> Snapshot {
    let anchor = ObjectId::generate();
    let relations = total / 2;
    Snapshot {
        relations: (0..relations)
            .map(|_| Relation {
                id: ObjectId::generate(),
                type_id: anchor,
                from_id: anchor,
                to_id: anchor,
            })
            .collect(),
        entities: (0..total - relations)
            .map(|i| {
                let entity = Entity::new(ObjectId::generate());
                if i % 3 == 0 {
                    entity.with_property(anchor)
                } else {
                    entity
                }
            })
            .collect(),
        ..Snapshot::default()
    }
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for total in [1_000, 20_000, 100_000] {
        let snapshot = build_snapshot(total);
        group.bench_with_input(BenchmarkId::new("uncapped", total), &snapshot, |b, snap| {
            b.iter(|| plan(black_box(snap), Caps::none(), 5_000).unwrap());
        });
        group.bench_with_input(
            BenchmarkId::new("drain_chunk", total),
            &snapshot,
            |b, snap| {
                b.iter(|| plan(black_box(snap), Caps::none().with_max_items(20_000), 5_000).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_plan);
criterion_main!(benches);
