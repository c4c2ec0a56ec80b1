//! Write/flush propagation benchmarks.

use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use fly_core::component::data;
use fly_core::reactive::{create_computed, create_effect, create_signal, tick, Disposer};

// =============================================================================
// Fan-out
// =============================================================================

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(subscribers), &subscribers, |b, &n| {
            let source = create_signal(0u64);
            let sink = Rc::new(Cell::new(0u64));
            let effects: Vec<Disposer> = (0..n)
                .map(|_| {
                    let (s, out) = (source.clone(), sink.clone());
                    create_effect(move || out.set(out.get().wrapping_add(s.get())))
                })
                .collect();
            tick().unwrap();

            let mut next = 0u64;
            b.iter(|| {
                next += 1;
                source.set(next);
                black_box(tick().unwrap())
            });

            for effect in effects {
                effect.dispose();
            }
        });
    }

    group.finish();
}

// =============================================================================
// Chains of derived values
// =============================================================================

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1usize, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let source = create_signal(0i64);
            let s = source.clone();
            let mut tail = create_computed(move || s.get());
            let mut chain = Vec::with_capacity(depth);
            for _ in 0..depth {
                let prev = tail.clone();
                chain.push(tail);
                tail = create_computed(move || prev.get() + 1);
            }
            tick().unwrap();

            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                source.set(next);
                tick().unwrap();
                black_box(tail.get_untracked())
            });
        });
    }

    group.finish();
}

// =============================================================================
// Batching
// =============================================================================

fn bench_batched_writes(c: &mut Criterion) {
    c.bench_function("batched_writes_64", |b| {
        let cells: Vec<_> = (0..64).map(|i| create_signal(i as u32)).collect();
        let readers = cells.clone();
        let _effect = create_effect(move || {
            black_box(readers.iter().map(|cell| cell.get()).sum::<u32>());
        });
        tick().unwrap();

        let mut round = 0u32;
        b.iter(|| {
            round += 1;
            for cell in &cells {
                cell.set(round);
            }
            black_box(tick().unwrap())
        });
    });
}

// =============================================================================
// Attribute data
// =============================================================================

fn bench_data_parse(c: &mut Criterion) {
    let input = "{ count: 5, label: 'Counter', items: [1, 2, 3, 4], nested: { on: true, ratio: 0.5, }, }";
    c.bench_function("data_parse", |b| b.iter(|| data::parse(black_box(input)).unwrap()));
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_computed_chain,
    bench_batched_writes,
    bench_data_parse
);
criterion_main!(benches);
