/*!
 * Interleaving Trace Printer
 * Textual dump of a schedule, and the `dscheck_trace_file` dump collaborator
 */

use std::io::{self, Write};
use std::path::Path;

use crate::registry::ProcStep;

const BAR_WIDTH: usize = 40;

fn target_label(step: &ProcStep) -> char {
    match step.target {
        Some(id) => char::from_u32(96 + id.get()).unwrap_or(' '),
        None => ' ',
    }
}

/// Prints one interleaving in the format pinned by spec.md §6:
///
/// ```text
/// sequence <N>
/// --------------------------------
/// P0            P1            ...
/// --------------------------------
/// set a
///            get a
/// --------------------------------
/// ```
///
/// One `\t\t\t` of indentation per process column before the acting
/// process, so each step visually lines up under its owning process.
pub(crate) fn print_interleaving(
    out: &mut dyn Write,
    schedule: &[ProcStep],
    sequence: usize,
) -> io::Result<()> {
    let num_procs = schedule
        .iter()
        .map(|s| s.proc_id)
        .max()
        .map(|m| m + 1)
        .unwrap_or(0);
    let bar = "-".repeat(BAR_WIDTH);

    writeln!(out, "sequence {sequence}")?;
    writeln!(out, "{bar}")?;
    let header: Vec<String> = (0..num_procs).map(|p| format!("P{p}")).collect();
    writeln!(out, "{}", header.join("\t\t\t"))?;
    writeln!(out, "{bar}")?;
    for step in schedule {
        let prefix = "\t\t\t".repeat(step.proc_id);
        writeln!(out, "{prefix}{} {}", step.op.trace_name(), target_label(step))?;
    }
    writeln!(out, "{bar}")?;
    Ok(())
}

/// Prints the closing summary line: `"explored N interleavings and M
/// states"` (spec.md §6).
pub(crate) fn print_summary(
    out: &mut dyn Write,
    num_interleavings: usize,
    num_states: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "explored {num_interleavings} interleavings and {num_states} states"
    )
}

/// `dscheck_trace_file` collaborator: writes every explored schedule to
/// `path`, one interleaving block per schedule, in discovery order.
pub(crate) fn write_trace_file(path: &Path, schedules: &[Vec<ProcStep>]) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    for (i, schedule) in schedules.iter().enumerate() {
        print_interleaving(&mut file, schedule, i + 1)?;
    }
    Ok(())
}

/// Name of the environment variable that, if set, enables collecting and
/// dumping every explored schedule (spec.md §6).
pub const TRACE_FILE_ENV_VAR: &str = "dscheck_trace_file";
