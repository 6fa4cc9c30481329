/*!
 * DPOR Explorer
 * Grows the explored state tree, seeding backtracks from racing last-accesses
 */

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use crate::atomic::{OpKind, ProcId};
use crate::context::Context;
use crate::driver::do_run;
use crate::errors::DscheckResult;
use crate::registry::ProcStep;
use crate::state::{schedule_of, Clock, ExecutionState, LastAccess, StateCell};

/// What `explore` produces: every fully completed interleaving's schedule,
/// in discovery order, and the total number of states (`do_run`
/// invocations) it took to find them all.
pub struct ExploreResult {
    pub interleavings: Vec<Vec<ProcStep>>,
    pub num_states: usize,
}

/// One still-open branch of the search.
///
/// `explore(f, state, clock, last_access)` in spec.md §4.5 is naturally
/// recursive; this crate converts that to an explicit work stack per
/// spec.md §9 Design Notes ("convert to an explicit work stack if depths
/// can exceed the host's native stack"). Each frame is one call's local
/// variables: its own `state`/`clock`/`last_access` triple (sharing the
/// common prefix with its parent via `Rc`, per [`crate::state::StateHandle`])
/// plus the in-progress `backtrack \ dones` loop (spec.md §4.5 Step B).
struct Frame {
    state: ExecutionState,
    clock: Clock,
    last_access: LastAccess,
    /// Process ids already dispatched from this frame's state.
    dones: BTreeSet<ProcId>,
    /// Whether Step A has already run for this frame (it must run exactly
    /// once, the first time this frame is visited).
    step_a_done: bool,
}

/// `explore(f, ...)`, seeded from the synthetic initial schedule
/// `[(0, Start, None)]` (spec.md §4.4 Edge cases).
pub(crate) fn explore(
    ctx: &Arc<Context>,
    f: &(dyn Fn(&Arc<Context>) + Send + Sync),
) -> DscheckResult<ExploreResult> {
    let mut num_states = 1;
    let seed_schedule = vec![ProcStep {
        proc_id: 0,
        op: OpKind::Start,
        target: None,
    }];
    let seed_cell = do_run(ctx, f, &seed_schedule, num_states)?;
    let initial_state: ExecutionState = vec![Rc::new(RefCell::new(seed_cell))];

    let mut interleavings = Vec::new();
    let mut stack = vec![Frame {
        state: initial_state,
        clock: Clock::new(),
        last_access: LastAccess::new(),
        dones: BTreeSet::new(),
        step_a_done: false,
    }];

    while let Some(frame) = stack.last_mut() {
        if !frame.step_a_done {
            seed_backtracks_at_predecessors(&frame.state, &frame.last_access);
            frame.step_a_done = true;

            let s = frame.state.last().expect("frame state is never empty").clone();
            if s.borrow().enabled.is_empty() {
                interleavings.push(schedule_of(&frame.state));
                stack.pop();
                continue;
            }
            seed_initial_backtrack(&s);
        }

        let s = frame.state.last().expect("frame state is never empty").clone();
        let next = {
            let cell = s.borrow();
            cell.backtrack.difference(&frame.dones).min().copied()
        };
        let Some(j) = next else {
            stack.pop();
            continue;
        };
        frame.dones.insert(j);

        let proc_step = pending_step_of(&s, j);

        let mut schedule = schedule_of(&frame.state);
        schedule.push(proc_step);
        num_states += 1;
        let new_cell = do_run(ctx, f, &schedule, num_states)?;

        let mut new_state = frame.state.clone();
        new_state.push(Rc::new(RefCell::new(new_cell)));
        let new_index = new_state.len() - 1;

        let mut new_last_access = frame.last_access.clone();
        if let Some(target) = proc_step.target {
            new_last_access.insert(target.get(), new_index);
        }
        let mut new_clock = frame.clock.clone();
        new_clock.insert(j, new_index);

        stack.push(Frame {
            state: new_state,
            clock: new_clock,
            last_access: new_last_access,
            dones: BTreeSet::new(),
            step_a_done: false,
        });
    }

    Ok(ExploreResult {
        interleavings,
        num_states,
    })
}

/// Step A (spec.md §4.5): for each process's pending step at the current
/// frontier, seed a backtrack point at the predecessor of that atomic's
/// last access — the earlier state from which an alternative process must
/// also be tried, since two different processes touching the same atomic
/// potentially race.
fn seed_backtracks_at_predecessors(state: &ExecutionState, last_access: &LastAccess) {
    let s = state.last().expect("frame state is never empty");
    let (steps, enabled) = {
        let cell = s.borrow();
        (cell.procs.clone(), cell.enabled.clone())
    };
    for step in steps {
        if !enabled.contains(&step.proc_id) {
            continue;
        }
        let Some(target) = step.target else {
            continue;
        };
        let Some(&t) = last_access.get(&target.get()) else {
            continue;
        };
        if t == 0 {
            continue;
        }
        let predecessor = &state[t - 1];
        let predecessor_has_proc = predecessor.borrow().enabled.contains(&step.proc_id);
        let mut predecessor_mut = predecessor.borrow_mut();
        if predecessor_has_proc {
            predecessor_mut.backtrack.insert(step.proc_id);
        } else {
            let fallback: Vec<ProcId> = predecessor_mut.enabled.iter().copied().collect();
            predecessor_mut.backtrack.extend(fallback);
        }
    }
}

/// Step B's `backtrack := {min(enabled)}` initialization, applied only if
/// nothing has seeded this state's backtrack set yet (spec.md §4.5).
fn seed_initial_backtrack(s: &Rc<RefCell<StateCell>>) {
    let mut cell = s.borrow_mut();
    if cell.backtrack.is_empty() {
        if let Some(&min_enabled) = cell.enabled.iter().next() {
            cell.backtrack.insert(min_enabled);
        }
    }
}

fn pending_step_of(s: &Rc<RefCell<StateCell>>, proc_id: ProcId) -> ProcStep {
    *s.borrow()
        .procs
        .iter()
        .find(|p| p.proc_id == proc_id)
        .expect("backtrack id must name a pending process")
}
