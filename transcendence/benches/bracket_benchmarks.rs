use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use transcendence::bracket::{BracketBuilder, Entrant, RandomSeeding, RegistrationOrder, layout};
use transcendence::db::MemoryBracketStore;

/// Helper to create a roster of N entrants
fn roster(n: usize) -> Vec<Entrant> {
    (1..=n as i64)
        .map(|id| Entrant {
            id,
            tournament_id: 1,
            user_id: id,
            alias: format!("player{id}"),
        })
        .collect()
}

/// Benchmark round layout for growing rosters
fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");

    for n in [8, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| layout(black_box(n)));
        });
    }

    group.finish();
}

/// Benchmark planning a bracket in registration order
fn bench_plan_registration_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_registration_order");

    // Powers of two have no byes; the others exercise bye chaining
    for n in [8, 13, 64, 257] {
        let entrants = roster(n);
        let mut builder = BracketBuilder::new(Arc::new(MemoryBracketStore::new()), RegistrationOrder);

        group.bench_with_input(BenchmarkId::from_parameter(n), &entrants, |b, entrants| {
            b.iter(|| builder.plan(black_box(entrants.clone())));
        });
    }

    group.finish();
}

/// Benchmark planning with a seeded shuffle
fn bench_plan_random(c: &mut Criterion) {
    let entrants = roster(128);
    let mut builder = BracketBuilder::new(
        Arc::new(MemoryBracketStore::new()),
        RandomSeeding::from_seed(7),
    );

    c.bench_function("plan_random_128", |b| {
        b.iter(|| builder.plan(black_box(entrants.clone())));
    });
}

criterion_group!(
    benches,
    bench_layout,
    bench_plan_registration_order,
    bench_plan_random
);
criterion_main!(benches);
