/*!
 * Exploration Benchmarks
 *
 * Compare exploration cost for a CAS-retry increment loop against a
 * fetch_and_add counter, each run by two processes
 */

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use dscheck::{trace, Context, IntCell};

fn cas_loop_increment(ctx: &Arc<Context>) {
    let counter = Arc::new(IntCell::make(ctx, 0));
    for _ in 0..2 {
        let c = Arc::clone(&counter);
        ctx.spawn(move |ctx| loop {
            let old = c.get(ctx);
            if c.compare_and_set(ctx, old, old + 1) {
                break;
            }
        });
    }
}

fn fetch_and_add_increment(ctx: &Arc<Context>) {
    let counter = Arc::new(IntCell::make(ctx, 0));
    for _ in 0..2 {
        let c = Arc::clone(&counter);
        ctx.spawn(move |ctx| {
            c.incr(ctx);
        });
    }
}

fn bench_explore(c: &mut Criterion) {
    c.bench_function("explore cas-loop increment (2 procs)", |b| {
        b.iter(|| trace(cas_loop_increment).expect("cas-loop exploration should not find a violation"));
    });

    c.bench_function("explore fetch-and-add increment (2 procs)", |b| {
        b.iter(|| {
            trace(fetch_and_add_increment)
                .expect("fetch-and-add exploration should not find a violation")
        });
    });
}

criterion_group!(benches, bench_explore);
criterion_main!(benches);
