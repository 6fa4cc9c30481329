/*!
 * Process Gate
 * Mutex/condvar rendezvous standing in for a captured continuation
 */

use parking_lot::{Condvar, Mutex};
use std::panic::AssertUnwindSafe;

/// Internal cancellation sentinel. A fiber's top-level catch boundary must
/// swallow exactly this payload and let anything else propagate (spec.md
/// §4.3, §5 "Cancellation").
pub(crate) struct TerminatedEarly;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// The fiber is blocked at a suspension point (or not yet started);
    /// the driver has not yet granted it a step.
    ParkedAtStep,
    /// The driver has granted the fiber exactly one step; the fiber is the
    /// only one that may touch shared state right now.
    GrantedOneStep,
    /// The fiber's body returned (normally or via a caught panic).
    Finished,
    /// The run is ending; the fiber must unwind with `TerminatedEarly`.
    Cancelled,
}

/// What the driver observed after granting a process its one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GrantOutcome {
    /// The fiber ran to its next suspension point and re-parked.
    Parked,
    /// The fiber's body returned; it will not be scheduled again.
    Finished,
}

/// Per-process rendezvous point standing in for a captured continuation.
///
/// Grounded on the teacher's `core::sync::condvar::CondvarWait` waiter-state
/// shape (state behind a mutex, signaled through a condvar), narrowed to the
/// single dedicated waiter a `Gate` always has on each side: exactly one
/// fiber thread waits for grants, and exactly one driver thread waits for
/// parks, so persistent state plus `notify_all` (rather than a keyed
/// multi-waiter map) is enough to rule out lost wakeups — a `wait` call
/// always rechecks the stored phase before sleeping again.
pub(crate) struct Gate {
    phase: Mutex<Phase>,
    condvar: Condvar,
}

impl Gate {
    /// A freshly spawned fiber starts parked: "the fiber is parked at Start,
    /// ready to execute until its first atomic operation when resumed"
    /// (spec.md §4.2).
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::ParkedAtStep),
            condvar: Condvar::new(),
        }
    }

    /// Fiber side: block until granted a step, or cancelled.
    ///
    /// Used both for the fiber's very first step (where the phase is
    /// already `ParkedAtStep` from `new`) and, via [`Gate::suspend`], after
    /// every subsequent atomic operation.
    fn wait_for_grant(&self) {
        let mut phase = self.phase.lock();
        loop {
            match *phase {
                Phase::GrantedOneStep => return,
                Phase::Cancelled => {
                    drop(phase);
                    std::panic::panic_any(TerminatedEarly);
                }
                Phase::ParkedAtStep | Phase::Finished => self.condvar.wait(&mut phase),
            }
        }
    }

    /// Fiber side, the very first grant (launching the spawned thread).
    pub fn wait_for_start(&self) {
        self.wait_for_grant();
    }

    /// Fiber side: called after performing one atomic operation's real
    /// effect and recording the next pending step in the registry. Re-parks
    /// and blocks for the next grant or cancellation.
    pub fn suspend(&self) {
        {
            let mut phase = self.phase.lock();
            *phase = Phase::ParkedAtStep;
            self.condvar.notify_all();
        }
        self.wait_for_grant();
    }

    /// Fiber side: called once the process body has returned or been caught
    /// panicking with something other than `TerminatedEarly`.
    pub fn finish(&self) {
        let mut phase = self.phase.lock();
        *phase = Phase::Finished;
        self.condvar.notify_all();
    }

    /// Driver side: grant the fiber exactly one step and block until it
    /// re-parks at its next suspension point or finishes.
    pub fn grant_and_await(&self) -> GrantOutcome {
        {
            let mut phase = self.phase.lock();
            *phase = Phase::GrantedOneStep;
            self.condvar.notify_all();
        }
        let mut phase = self.phase.lock();
        loop {
            match *phase {
                Phase::ParkedAtStep => return GrantOutcome::Parked,
                Phase::Finished => return GrantOutcome::Finished,
                Phase::GrantedOneStep | Phase::Cancelled => self.condvar.wait(&mut phase),
            }
        }
    }

    /// Driver side: discontinue a still-parked fiber at run end (spec.md
    /// §5, "Cancellation"). Only valid to call on a fiber observed
    /// `ParkedAtStep`, i.e. not already finished.
    pub fn cancel(&self) {
        let mut phase = self.phase.lock();
        *phase = Phase::Cancelled;
        self.condvar.notify_all();
    }
}

/// Runs `body` to completion, swallowing the `TerminatedEarly` sentinel (a
/// discontinued fiber exits silently — spec.md §5) and converting any other
/// panic into a message that propagates out as a `ProcessPanicked` error
/// ("any exception other than `TerminatedEarly` is re-raised out of the
/// handler", spec.md §4.3).
pub(crate) fn catch_process_panic(body: impl FnOnce()) -> Result<(), String> {
    match std::panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(()) => Ok(()),
        Err(payload) => {
            if payload.downcast_ref::<TerminatedEarly>().is_some() {
                return Ok(());
            }
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "process panicked with a non-string payload".to_string()
            };
            Err(message)
        }
    }
}
