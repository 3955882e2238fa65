//! Criterion benchmarks for the matching hot path.
//!
//! Measures resting inserts, full matches at varying book depth, cancels,
//! and a Hawkes-driven mixed workload.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use micro_lob::{CancelRequest, Engine, NewOrderRequest, Side, SimConfig, Simulator, Symbol};

fn sym() -> Symbol {
    Symbol::new("BENCH")
}

fn bench_place_no_match(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.add_symbol(sym());

    let mut order_id = 0u64;
    c.bench_function("place_no_match", |b| {
        b.iter(|| {
            order_id += 1;
            // Deep below any ask: always rests
            let req = NewOrderRequest::limit(order_id, Side::Buy, 9000, 100, sym());
            black_box(engine.submit_order(&req))
        })
    });
}

fn bench_place_full_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("place_full_match");

    for depth in [1u64, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let mut engine = Engine::new();
            engine.add_symbol(sym());
            for i in 0..depth {
                engine.submit_order(&NewOrderRequest::limit(i + 1, Side::Sell, 10000, 100, sym()));
            }

            let mut order_id = 1_000_000u64;
            b.iter(|| {
                order_id += 1;
                // Replace the liquidity we are about to take
                engine.submit_order(&NewOrderRequest::limit(
                    order_id,
                    Side::Sell,
                    10000,
                    100,
                    sym(),
                ));
                order_id += 1;
                let req = NewOrderRequest::limit(order_id, Side::Buy, 10000, 100, sym());
                black_box(engine.submit_order(&req))
            })
        });
    }
    group.finish();
}

fn bench_cancel(c: &mut Criterion) {
    let mut engine = Engine::new();
    engine.add_symbol(sym());

    let mut order_id = 0u64;
    c.bench_function("place_then_cancel", |b| {
        b.iter(|| {
            order_id += 1;
            engine.submit_order(&NewOrderRequest::limit(order_id, Side::Buy, 9000, 100, sym()));
            black_box(engine.cancel_order(&CancelRequest {
                order_id,
                symbol: sym(),
            }))
        })
    });
}

fn bench_mixed_workload(c: &mut Criterion) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut engine = Engine::new();
    engine.add_symbol(sym());

    let mut order_id = 0u64;
    c.bench_function("mixed_workload", |b| {
        b.iter(|| {
            order_id += 1;
            let side = if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
            let req = if rng.gen_bool(0.15) {
                NewOrderRequest::market(order_id, side, rng.gen_range(1..5) * 100, sym())
            } else {
                NewOrderRequest::limit(
                    order_id,
                    side,
                    rng.gen_range(9990..10011),
                    rng.gen_range(1..5) * 100,
                    sym(),
                )
            };
            black_box(engine.submit_order(&req))
        })
    });
}

fn bench_full_simulation(c: &mut Criterion) {
    c.bench_function("hawkes_simulation_10s", |b| {
        b.iter(|| {
            let config = SimConfig {
                duration: 10.0,
                seed: 42,
                ..SimConfig::default()
            };
            black_box(Simulator::new(config).run())
        })
    });
}

criterion_group!(
    benches,
    bench_place_no_match,
    bench_place_full_match,
    bench_cancel,
    bench_mixed_workload,
    bench_full_simulation
);
criterion_main!(benches);
