/*!
 * Error Types
 * Centralized error handling for the exploration driver
 */

use thiserror::Error;

use crate::atomic::ProcId;

/// Result type returned by the driver and explorer.
pub type DscheckResult<T> = Result<T, DscheckError>;

/// Errors surfaced out of `do_run`/`explore`.
///
/// Scheduler invariant violations (a dispatched step not matching a
/// process's recorded pending operation) and schedule exhaustion with no
/// enabled processes are *not* represented here: both indicate a bug in this
/// crate itself, and are raised as hard panics rather than values a caller
/// could recover from.
#[derive(Error, Debug)]
pub enum DscheckError {
    /// A process body panicked with something other than the internal
    /// cancellation sentinel.
    #[error("process {pid} panicked: {message}")]
    ProcessPanicked { pid: ProcId, message: String },

    /// `check` observed a false predicate.
    #[error("assertion violated on run {run}")]
    AssertionViolated { run: usize },
}
