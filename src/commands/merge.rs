//! Implementation of `provrun merge`.

use super::Invocation;
use crate::coordinator::run_merge_stage;
use crate::error::Result;
use crate::merge::{MergeReport, check_reports};

/// Run the merge mapping once against the shared output directory.
///
/// Fails with `MergeFailed` after printing when any entry could not be written.
pub fn cmd_merge(invocation: &Invocation) -> Result<()> {
    let reports = run_merge_stage(
        &invocation.layout,
        &invocation.declarations,
        &invocation.reporter,
    )?;

    if reports.is_empty() {
        println!("No merge configuration found.");
        return Ok(());
    }

    print_reports(&reports);
    check_reports(&reports)
}

fn print_reports(reports: &[MergeReport]) {
    for report in reports {
        match (&report.written, &report.error) {
            (_, Some(error)) => println!("  {:<24} failed   {}", report.output, error),
            (Some(path), None) => {
                let mut line = format!(
                    "  {:<24} written  {} input(s)",
                    report.output,
                    report.inputs_used.len()
                );
                if !report.inputs_missing.is_empty() {
                    line.push_str(&format!(", missing: {}", report.inputs_missing.join(", ")));
                }
                println!("{}  -> {}", line, path.display());
            }
            (None, None) => {}
        }
    }
}
