/*!
 * Assertion & Callback Hooks
 * check/every/finally — the user-facing observation points (spec.md §4.6)
 */

use std::sync::Arc;

use crate::context::Context;

/// `check(pred)`: disables tracing, evaluates `pred`, and on failure prints
/// the schedule that produced the current run and records the violation on
/// the context.
///
/// Rather than panicking across a possible fiber/driver thread boundary,
/// recording the violation on `Context` lets `do_run`'s dispatch loop
/// notice it at its next safe checkpoint (after the current step) and stop
/// dispatching further steps — the Rust-native rendering of "prints...
/// and aborts" (spec.md §4.6, §7) that still lets every already-spawned
/// fiber be cleanly discontinued rather than unwound mid-operation.
pub fn check(ctx: &Context, pred: impl FnOnce() -> bool) {
    let was_tracing = ctx.is_tracing();
    ctx.set_tracing(false);
    let ok = pred();
    if !ok {
        ctx.record_assertion_violation();
    }
    ctx.set_tracing(was_tracing);
}

/// `every(g)`: installs a callback invoked by the driver after each
/// dispatched step, with tracing disabled.
pub fn every(ctx: &Arc<Context>, f: impl FnMut(&Context) + Send + 'static) {
    ctx.set_every_hook(f);
}

/// `finally(g)`: installs a callback invoked by the driver exactly once per
/// fully completed run, after every process has finished. Named `finally`
/// rather than spec.md's `final` — a reserved word in Rust.
pub fn finally(ctx: &Arc<Context>, f: impl FnMut(&Context) + Send + 'static) {
    ctx.set_finally_hook(f);
}
