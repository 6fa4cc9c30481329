/*!
 * Execution State
 * Per-run snapshots and the last-access relation the explorer reduces over
 */

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::atomic::{AtomicId, OpKind, ProcId};
use crate::registry::ProcStep;

/// One completed run's frontier (spec.md §3).
#[derive(Debug, Clone)]
pub struct StateCell {
    /// Every spawned process's pending step, in id order.
    pub procs: Vec<ProcStep>,
    /// The step that produced this state — the last entry of the schedule
    /// that was replayed to reach it.
    pub run_proc: ProcId,
    pub run_op: OpKind,
    pub run_target: Option<AtomicId>,
    /// Ids of processes not yet finished.
    pub enabled: BTreeSet<ProcId>,
    /// Ids at which exploration must also diverge from this state. Starts
    /// empty; grown by `explore`'s backtrack-seeding step.
    pub backtrack: BTreeSet<ProcId>,
}

impl StateCell {
    /// The schedule entry leading into this state, as a `ProcStep`.
    pub fn run_step(&self) -> ProcStep {
        ProcStep {
            proc_id: self.run_proc,
            op: self.run_op,
            target: self.run_target,
        }
    }
}

/// A single state cell in a shared execution prefix.
///
/// `explore`'s backtrack-seeding step (spec.md §4.5 Step A) mutates an
/// *earlier* state's `backtrack` set from deep inside a still-running
/// exploration of a *later* one; both share the same prefix of states, so
/// that mutation must be visible back up the (explicit, not native-recursive
/// — spec.md §9) call stack. `Rc<RefCell<_>>` gives every branch that shares
/// a prefix a handle to the very same cells, the way the source's captured,
/// by-reference execution list does.
pub type StateHandle = Rc<RefCell<StateCell>>;

/// A completed execution: the time-ordered sequence of state cells from the
/// initial seed to the current frontier. Extending this with one more state
/// (`state.clone()` then `push`) clones only the `Rc` pointers, preserving
/// sharing of the common prefix across sibling branches.
pub type ExecutionState = Vec<StateHandle>;

/// Reconstructs the full schedule that (re)produces `state`'s frontier —
/// "the schedule used to (re)produce state S\[i\] is exactly the sequence of
/// every state's `run_*` fields up to and including S\[i\]" (spec.md
/// invariant 3).
pub fn schedule_of(state: &ExecutionState) -> Vec<ProcStep> {
    state.iter().map(|s| s.borrow().run_step()).collect()
}

/// `atomic-id -> state-index` giving the time of the most recent step that
/// touched each atomic on the current execution (spec.md §3).
pub type LastAccess = std::collections::HashMap<u32, usize>;

/// `proc-id -> state-index` giving the time of the most recent step by each
/// process. Retained for extensibility; never read by the reduction itself
/// (spec.md §3, §9 Open Question).
pub type Clock = std::collections::HashMap<ProcId, usize>;
