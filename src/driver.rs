/*!
 * Run Driver
 * Replays one fixed schedule against a fresh registry and returns its frontier
 */

use log::info;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::Context;
use crate::errors::{DscheckError, DscheckResult};
use crate::registry::ProcStep;
use crate::state::StateCell;
use crate::trace::print_interleaving;

/// `do_run(f, schedule) -> state_cell` (spec.md §4.4).
///
/// Always replays from scratch: clears the registry, resets the atomic-id
/// counter, calls `f` to re-spawn every process, then walks `schedule` in
/// order, asserting at each step that the dispatched process's recorded
/// pending operation matches. Returns the post-run frontier as a
/// [`StateCell`], or a [`DscheckError`] if a process body panicked or an
/// assertion installed via [`crate::hooks::check`] was violated.
pub(crate) fn do_run(
    ctx: &Arc<Context>,
    f: &(dyn Fn(&Arc<Context>) + Send + Sync),
    schedule: &[ProcStep],
    run_number: usize,
) -> DscheckResult<StateCell> {
    assert!(!schedule.is_empty(), "do_run requires a nonempty schedule");

    ctx.registry.clear();
    ctx.reset_for_run();
    info!(
        "run {run_number}: replaying schedule of {} step(s)",
        schedule.len()
    );

    f(ctx);

    for (i, step) in schedule.iter().enumerate() {
        if ctx.registry.num_procs() > 0 && ctx.registry.enabled().is_empty() {
            panic!(
                "no enabled processes: schedule has {} entries remaining at step {i}",
                schedule.len() - i
            );
        }

        let pending = ctx.registry.pending_step(step.proc_id);
        assert_eq!(
            pending, *step,
            "scheduler invariant violation: process {} expected {:?} but schedule says {:?}",
            step.proc_id, pending, step
        );

        ctx.grant_step(step.proc_id);

        if let Some(err) = bail_on_violation(ctx, run_number, schedule) {
            ctx.cancel_and_join_all();
            return Err(err);
        }

        ctx.fire_every();

        if let Some(err) = bail_on_violation(ctx, run_number, schedule) {
            ctx.cancel_and_join_all();
            return Err(err);
        }
    }

    if ctx.registry.all_finished() {
        ctx.fire_finally();
        if let Some(err) = bail_on_violation(ctx, run_number, schedule) {
            ctx.cancel_and_join_all();
            return Err(err);
        }
    }

    let panicked = (0..ctx.registry.num_procs())
        .find_map(|pid| ctx.registry.take_panic(pid).map(|message| (pid, message)));

    let last = schedule.last().expect("checked nonempty above");
    let state = StateCell {
        procs: ctx.pending_steps_snapshot(),
        run_proc: last.proc_id,
        run_op: last.op,
        run_target: last.target,
        enabled: ctx.registry.enabled().into_iter().collect::<BTreeSet<_>>(),
        backtrack: BTreeSet::new(),
    };

    ctx.cancel_and_join_all();

    if let Some((pid, message)) = panicked {
        return Err(DscheckError::ProcessPanicked { pid, message });
    }

    Ok(state)
}

fn bail_on_violation(
    ctx: &Context,
    run_number: usize,
    schedule: &[ProcStep],
) -> Option<DscheckError> {
    if !ctx.assertion_violated() {
        return None;
    }
    println!("Found assertion violation at run {run_number}:");
    let mut stdout = std::io::stdout();
    let _ = print_interleaving(&mut stdout, schedule, run_number);
    Some(DscheckError::AssertionViolated { run: run_number })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::{AtomicId, Cell, OpKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn single_process_with_no_atomic_ops_finishes_on_start() {
        let ctx = Context::new();
        let f: &(dyn Fn(&Arc<Context>) + Send + Sync) = &|ctx: &Arc<Context>| {
            ctx.spawn(|_ctx| {});
        };
        let schedule = vec![ProcStep {
            proc_id: 0,
            op: OpKind::Start,
            target: None,
        }];
        let state = do_run(&ctx, f, &schedule, 1).unwrap();
        assert!(state.enabled.is_empty());
        assert_eq!(state.run_proc, 0);
        assert_eq!(state.run_op, OpKind::Start);
    }

    #[test]
    fn process_panic_surfaces_as_error() {
        let ctx = Context::new();
        let f: &(dyn Fn(&Arc<Context>) + Send + Sync) = &|ctx: &Arc<Context>| {
            ctx.spawn(|_ctx| panic!("boom"));
        };
        let schedule = vec![ProcStep {
            proc_id: 0,
            op: OpKind::Start,
            target: None,
        }];
        match do_run(&ctx, f, &schedule, 1) {
            Err(DscheckError::ProcessPanicked { pid, message }) => {
                assert_eq!(pid, 0);
                assert!(message.contains("boom"));
            }
            other => panic!("expected ProcessPanicked, got {other:?}"),
        }
    }

    #[test]
    fn replaying_the_same_schedule_twice_is_deterministic() {
        let ctx = Context::new();
        let f: &(dyn Fn(&Arc<Context>) + Send + Sync) = &|ctx: &Arc<Context>| {
            let cell = Cell::make(ctx, 0);
            ctx.spawn(move |ctx| {
                cell.set(ctx, 1);
            });
        };
        let schedule = vec![
            ProcStep {
                proc_id: 0,
                op: OpKind::Start,
                target: None,
            },
            ProcStep {
                proc_id: 0,
                op: OpKind::Set,
                target: Some(AtomicId::from_counter(1)),
            },
        ];
        let first = do_run(&ctx, f, &schedule, 1).unwrap();
        let second = do_run(&ctx, f, &schedule, 2).unwrap();
        assert_eq!(first.run_op, second.run_op);
        assert_eq!(first.enabled, second.enabled);
        assert_eq!(first.run_target, second.run_target);
    }

    proptest::proptest! {
        /// Invariants 1 & 3: replaying the same schedule against a freshly
        /// reset context always reproduces the same frontier, for any
        /// number of independent (non-racing) processes.
        #[test]
        fn replay_is_deterministic_for_any_process_count(n in 1usize..6) {
            let ctx = Context::new();
            let f: &(dyn Fn(&Arc<Context>) + Send + Sync) = &move |ctx: &Arc<Context>| {
                for _ in 0..n {
                    ctx.spawn(|_ctx| {});
                }
            };
            let schedule: Vec<ProcStep> = (0..n)
                .map(|pid| ProcStep { proc_id: pid, op: OpKind::Start, target: None })
                .collect();

            let first = do_run(&ctx, f, &schedule, 1).unwrap();
            let second = do_run(&ctx, f, &schedule, 2).unwrap();
            proptest::prop_assert_eq!(first.enabled, second.enabled);
            proptest::prop_assert_eq!(first.run_proc, second.run_proc);
            proptest::prop_assert_eq!(first.run_op, second.run_op);
        }
    }

    #[test]
    fn no_enabled_processes_with_remaining_schedule_panics() {
        let ctx = Context::new();
        let f: &(dyn Fn(&Arc<Context>) + Send + Sync) = &|ctx: &Arc<Context>| {
            ctx.spawn(|_ctx| {});
        };
        let schedule = vec![
            ProcStep {
                proc_id: 0,
                op: OpKind::Start,
                target: None,
            },
            ProcStep {
                proc_id: 0,
                op: OpKind::Get,
                target: Some(AtomicId::from_counter(1)),
            },
        ];
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            do_run(&ctx, f, &schedule, 1)
        }));
        assert!(result.is_err());
    }
}
