/*!
 * dscheck
 * Dynamic partial-order reduction model checker for atomic shared-memory programs
 *
 * A user-supplied closure spawns logical processes that communicate only
 * through [`Cell`]/[`IntCell`] atomic operations; [`trace`] replays every
 * schedule the reduction deems necessary, printing each explored
 * interleaving and reporting the first assertion violation or process
 * panic it finds.
 */

mod atomic;
mod context;
mod driver;
mod errors;
mod explorer;
mod gate;
mod hooks;
mod registry;
mod state;
mod trace;

pub use atomic::{AtomicId, Cell, IntCell, OpKind, ProcId};
pub use context::Context;
pub use errors::{DscheckError, DscheckResult};
pub use hooks::{check, every, finally};

use std::sync::Arc;

/// Explores every schedule the reduction needs, printing each one to
/// stdout as it's found and a closing summary line (spec.md §6):
///
/// ```text
/// explored N interleavings and M states
/// ```
///
/// `f` is called once per replayed schedule (`do_run`'s step 1) and must
/// deterministically spawn the same processes given the same schedule — it
/// is handed a fresh [`Context`] each time it's invoked internally, so it
/// should capture nothing stateful across calls.
///
/// If the `dscheck_trace_file` environment variable is set, every explored
/// interleaving is additionally written to that path, one block per
/// schedule, in discovery order (spec.md §6).
///
/// Convenience wrapper over [`trace_to`] that always prints to stdout; see
/// that function for the full `interleavings_channel`/`record_traces` form
/// spec.md §6 names.
pub fn trace(f: impl Fn(&Arc<Context>) + Send + Sync + 'static) -> DscheckResult<()> {
    let mut stdout = std::io::stdout();
    trace_to(f, Some(&mut stdout as &mut dyn std::io::Write), false)
}

/// Full form of spec.md §6's entry point:
/// `trace(f, interleavings_channel=None, record_traces=false)`.
///
/// If `interleavings_channel` is given, every explored interleaving is
/// printed to it as it's found, followed by the closing summary line. If
/// `record_traces` is true, or the `dscheck_trace_file` environment variable
/// is set (which implicitly enables it, per spec.md §6), every explored
/// schedule is collected and, at exit, written to the path named by that
/// variable via the trace-tracker collaborator ([`trace::write_trace_file`]).
pub fn trace_to(
    f: impl Fn(&Arc<Context>) + Send + Sync + 'static,
    interleavings_channel: Option<&mut dyn std::io::Write>,
    record_traces: bool,
) -> DscheckResult<()> {
    let ctx = Context::new();
    let result = explorer::explore(&ctx, &f)?;

    if let Some(channel) = interleavings_channel {
        for (i, schedule) in result.interleavings.iter().enumerate() {
            let _ = trace::print_interleaving(channel, schedule, i + 1);
        }
        let _ = trace::print_summary(channel, result.interleavings.len(), result.num_states);
    }

    let env_path = std::env::var(trace::TRACE_FILE_ENV_VAR).ok();
    if record_traces || env_path.is_some() {
        if let Some(path) = &env_path {
            if let Err(e) =
                trace::write_trace_file(std::path::Path::new(path), &result.interleavings)
            {
                log::warn!("failed to write {path}: {e}");
            }
        }
    }

    Ok(())
}
