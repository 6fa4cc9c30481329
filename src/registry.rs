/*!
 * Process Registry
 * Sequentially indexed table of logical processes under exploration
 */

use parking_lot::Mutex;
use std::sync::Arc;

use crate::atomic::{AtomicId, OpKind, ProcId};
use crate::gate::Gate;

/// Snapshot of a process's pending (not yet dispatched) operation.
///
/// Mirrors spec.md's `proc_rec`: captured once a run ends, one per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStep {
    pub proc_id: ProcId,
    pub op: OpKind,
    pub target: Option<AtomicId>,
}

/// Mutable bookkeeping for one logical process.
pub(crate) struct ProcessRecord {
    pub id: ProcId,
    pub next_op: OpKind,
    pub next_target: Option<AtomicId>,
    pub finished: bool,
    /// Set when the process body panicked with something other than the
    /// cancellation sentinel.
    pub panic_message: Option<String>,
    pub gate: Arc<Gate>,
}

impl ProcessRecord {
    fn new(id: ProcId, gate: Arc<Gate>) -> Self {
        Self {
            id,
            next_op: OpKind::Start,
            next_target: None,
            finished: false,
            panic_message: None,
            gate,
        }
    }

    pub fn pending_step(&self) -> ProcStep {
        ProcStep {
            proc_id: self.id,
            op: self.next_op,
            target: self.next_target,
        }
    }
}

/// The registry of every process spawned so far in the current run.
///
/// Process ids are dense and equal to push order, per spec.md invariant 2.
pub(crate) struct Registry {
    procs: Mutex<Vec<ProcessRecord>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            procs: Mutex::new(Vec::new()),
        }
    }

    /// Allocate the next process id and install its gate. Returns the id.
    pub fn push(&self, gate: Arc<Gate>) -> ProcId {
        let mut procs = self.procs.lock();
        let id = procs.len();
        procs.push(ProcessRecord::new(id, gate));
        id
    }

    pub fn all_finished(&self) -> bool {
        let procs = self.procs.lock();
        !procs.is_empty() && procs.iter().all(|p| p.finished)
    }

    pub fn pending_step(&self, pid: ProcId) -> ProcStep {
        self.procs.lock()[pid].pending_step()
    }

    pub fn is_finished(&self, pid: ProcId) -> bool {
        self.procs.lock()[pid].finished
    }

    pub fn set_pending(&self, pid: ProcId, op: OpKind, target: Option<AtomicId>) {
        let mut procs = self.procs.lock();
        procs[pid].next_op = op;
        procs[pid].next_target = target;
    }

    pub fn mark_finished(&self, pid: ProcId) {
        self.procs.lock()[pid].finished = true;
    }

    pub fn record_panic(&self, pid: ProcId, message: String) {
        self.procs.lock()[pid].panic_message = Some(message);
    }

    pub fn take_panic(&self, pid: ProcId) -> Option<String> {
        self.procs.lock()[pid].panic_message.take()
    }

    /// All process steps in id order, for snapshotting into a `StateCell`.
    pub fn all_pending_steps(&self) -> Vec<ProcStep> {
        self.procs.lock().iter().map(|p| p.pending_step()).collect()
    }

    /// Ids of processes that have not yet finished.
    pub fn enabled(&self) -> Vec<ProcId> {
        self.procs
            .lock()
            .iter()
            .filter(|p| !p.finished)
            .map(|p| p.id)
            .collect()
    }

    /// Clone the `Arc<Gate>` for `pid` out from under the registry lock.
    ///
    /// Callers then block on the gate's own condvar without holding the
    /// registry's lock — a fiber parked mid-run must never hold this lock,
    /// or every other registry access (including the driver's own dispatch
    /// loop) would deadlock behind it.
    pub fn gate(&self, pid: ProcId) -> Arc<Gate> {
        Arc::clone(&self.procs.lock()[pid].gate)
    }

    pub fn num_procs(&self) -> usize {
        self.procs.lock().len()
    }

    /// "clear the registry" at the end of every run (spec.md §4.4 step 5),
    /// so the next `do_run` rebuilds it from scratch via `f`.
    pub fn clear(&self) {
        self.procs.lock().clear();
    }
}
