//! Merge stage: concatenate collected outputs into combined artifacts.
//!
//! Every merge entry names an output file and an ordered list of inputs,
//! all relative to the shared output directory. Each input that exists is
//! appended followed by a blank line (`"\n\n"`); missing inputs are reported
//! and skipped. Entries are independent of each other.

use crate::context::BaseLayout;
use crate::declaration::MergeSpec;
use crate::error::{Result, RunError};
use crate::events::{Event, EventAction, Reporter};
use crate::fs::{atomic_write, resolve_within};
use serde_json::json;
use std::path::{Path, PathBuf};

/// Separator appended after every merged input.
pub const MERGE_SEPARATOR: &[u8] = b"\n\n";

/// Outcome of one merge entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Output filename as declared.
    pub output: String,
    /// Where the merged file was written, when it was.
    pub written: Option<PathBuf>,
    pub inputs_used: Vec<String>,
    pub inputs_missing: Vec<String>,
    pub error: Option<String>,
}

impl MergeReport {
    fn new(output: &str) -> Self {
        Self {
            output: output.to_string(),
            written: None,
            inputs_used: Vec::new(),
            inputs_missing: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Run every merge entry against the shared output directory.
///
/// Fails as a whole only when the output directory does not exist. Entry
/// failures are recorded in their reports; use [`check_reports`] to turn
/// them into an error.
pub fn run_merge(
    layout: &BaseLayout,
    merge: &MergeSpec,
    reporter: &dyn Reporter,
) -> Result<Vec<MergeReport>> {
    if merge.is_empty() {
        tracing::info!("no merge configuration");
        return Ok(Vec::new());
    }

    if !layout.output_dir.is_dir() {
        return Err(RunError::MergeUnavailable(layout.output_dir.clone()));
    }

    reporter.report(
        Event::new(EventAction::MergeStarted).with_details(json!({ "entries": merge.len() })),
    );

    let reports: Vec<MergeReport> = merge
        .iter()
        .map(|(output, inputs)| merge_entry(&layout.output_dir, output, inputs, reporter))
        .collect();

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    reporter.report(Event::new(EventAction::MergeCompleted).with_details(json!({
        "written": reports.len() - failed,
        "failed": failed,
    })));

    Ok(reports)
}

/// `MergeFailed` if any entry failed.
pub fn check_reports(reports: &[MergeReport]) -> Result<()> {
    let failed = reports.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        return Err(RunError::MergeFailed { failed });
    }
    Ok(())
}

fn merge_entry(
    output_dir: &Path,
    output: &str,
    inputs: &[String],
    reporter: &dyn Reporter,
) -> MergeReport {
    let mut report = MergeReport::new(output);

    match build_entry(output_dir, output, inputs, &mut report, reporter) {
        Ok(path) => {
            reporter.report(Event::new(EventAction::MergeWritten).with_details(json!({
                "output": output,
                "path": path.display().to_string(),
                "inputs": report.inputs_used,
                "missing": report.inputs_missing,
            })));
            report.written = Some(path);
        }
        Err(error) => {
            reporter.report(Event::new(EventAction::MergeFailed).with_details(json!({
                "output": output,
                "error": error,
            })));
            report.error = Some(error);
        }
    }

    report
}

fn build_entry(
    output_dir: &Path,
    output: &str,
    inputs: &[String],
    report: &mut MergeReport,
    reporter: &dyn Reporter,
) -> std::result::Result<PathBuf, String> {
    let target = resolve_within(output_dir, output)
        .ok_or_else(|| format!("merge output '{}' escapes the output directory", output))?;

    let mut merged = Vec::new();
    for input in inputs {
        let source = resolve_within(output_dir, input)
            .ok_or_else(|| format!("merge input '{}' escapes the output directory", input))?;

        if !source.exists() {
            reporter.report(Event::new(EventAction::MergeInputMissing).with_details(json!({
                "output": output,
                "input": input,
            })));
            report.inputs_missing.push(input.clone());
            continue;
        }

        let content = std::fs::read(&source)
            .map_err(|e| format!("failed to read '{}': {}", source.display(), e))?;
        merged.extend_from_slice(&content);
        merged.extend_from_slice(MERGE_SEPARATOR);
        report.inputs_used.push(input.clone());
    }

    atomic_write(&target, &merged)
        .map_err(|e| format!("failed to write '{}': {}", target.display(), e))?;

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingReporter, create_test_base};

    fn spec(entries: &[(&str, &[&str])]) -> MergeSpec {
        entries
            .iter()
            .map(|(out, ins)| (out.to_string(), ins.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn write_output(layout: &BaseLayout, name: &str, content: &str) {
        std::fs::create_dir_all(&layout.output_dir).unwrap();
        std::fs::write(layout.output_dir.join(name), content).unwrap();
    }

    fn read_output(layout: &BaseLayout, name: &str) -> String {
        std::fs::read_to_string(layout.output_dir.join(name)).unwrap()
    }

    #[test]
    fn inputs_are_concatenated_in_declared_order() {
        let (_temp_dir, layout) = create_test_base();
        write_output(&layout, "a.txt", "alpha");
        write_output(&layout, "b.txt", "beta");
        let reporter = RecordingReporter::default();

        let reports = run_merge(
            &layout,
            &spec(&[("all.txt", &["b.txt", "a.txt"])]),
            &reporter,
        )
        .unwrap();

        assert_eq!(read_output(&layout, "all.txt"), "beta\n\nalpha\n\n");
        assert_eq!(reports[0].inputs_used, vec!["b.txt", "a.txt"]);
        assert_eq!(reports[0].written, Some(layout.output_dir.join("all.txt")));
        check_reports(&reports).unwrap();
        assert_eq!(
            reporter.actions(),
            vec![
                EventAction::MergeStarted,
                EventAction::MergeWritten,
                EventAction::MergeCompleted
            ]
        );
    }

    #[test]
    fn missing_input_is_skipped_with_warning() {
        let (_temp_dir, layout) = create_test_base();
        write_output(&layout, "a.txt", "alpha");
        let reporter = RecordingReporter::default();

        let reports = run_merge(&layout, &spec(&[("out.txt", &["a.txt", "b.txt"])]), &reporter)
            .unwrap();

        assert_eq!(read_output(&layout, "out.txt"), "alpha\n\n");
        assert_eq!(reports[0].inputs_missing, vec!["b.txt"]);
        assert!(reports[0].is_success());
        assert_eq!(reporter.count(EventAction::MergeInputMissing), 1);
    }

    #[test]
    fn no_inputs_available_writes_empty_file() {
        let (_temp_dir, layout) = create_test_base();
        std::fs::create_dir_all(&layout.output_dir).unwrap();

        let reports = run_merge(
            &layout,
            &spec(&[("out.txt", &["a.txt", "b.txt"])]),
            &RecordingReporter::default(),
        )
        .unwrap();

        assert!(reports[0].is_success());
        assert_eq!(read_output(&layout, "out.txt"), "");
    }

    #[test]
    fn missing_output_directory_aborts_merge() {
        let (_temp_dir, layout) = create_test_base();
        let reporter = RecordingReporter::default();

        let err = run_merge(&layout, &spec(&[("out.txt", &["a.txt"])]), &reporter).unwrap_err();

        assert!(matches!(err, RunError::MergeUnavailable(ref p) if p == &layout.output_dir));
        assert_eq!(err.exit_code(), crate::exit_codes::MERGE_FAILURE);
        assert!(reporter.events().is_empty());
    }

    #[test]
    fn empty_mapping_succeeds_without_output_directory() {
        let (_temp_dir, layout) = create_test_base();

        let reports = run_merge(&layout, &MergeSpec::new(), &RecordingReporter::default()).unwrap();

        assert!(reports.is_empty());
        assert!(!layout.output_dir.exists());
    }

    #[test]
    fn failed_entry_does_not_stop_later_entries() {
        let (_temp_dir, layout) = create_test_base();
        write_output(&layout, "a.txt", "alpha");
        // A directory cannot be read as an input.
        std::fs::create_dir_all(layout.output_dir.join("dir.txt")).unwrap();
        let reporter = RecordingReporter::default();

        let reports = run_merge(
            &layout,
            &spec(&[
                ("broken.txt", &["dir.txt"]),
                ("../outside.txt", &["a.txt"]),
                ("good.txt", &["a.txt"]),
            ]),
            &reporter,
        )
        .unwrap();

        assert!(!reports[0].is_success());
        assert!(!reports[1].is_success());
        assert!(reports[1].error.as_ref().unwrap().contains("escapes"));
        assert!(reports[2].is_success());
        assert_eq!(read_output(&layout, "good.txt"), "alpha\n\n");
        assert!(!layout.base_dir.join("outside.txt").exists());
        assert_eq!(reporter.count(EventAction::MergeFailed), 2);

        let err = check_reports(&reports).unwrap_err();
        assert!(matches!(err, RunError::MergeFailed { failed: 2 }));
        assert_eq!(err.to_string(), "2 merge entries failed");
    }

    #[test]
    fn rerun_replaces_previous_merge() {
        let (_temp_dir, layout) = create_test_base();
        write_output(&layout, "a.txt", "alpha");
        write_output(&layout, "out.txt", "stale content");
        let merge = spec(&[("out.txt", &["a.txt"])]);

        run_merge(&layout, &merge, &RecordingReporter::default()).unwrap();
        run_merge(&layout, &merge, &RecordingReporter::default()).unwrap();

        assert_eq!(read_output(&layout, "out.txt"), "alpha\n\n");
    }
}
