//! Per-provider pipeline: provision, install, materialize, execute, collect.
//!
//! A pipeline never fails the caller. Every outcome, including errors, is
//! returned as a [`ProviderReport`], and the workspace is disposed of
//! according to the [`CleanupPolicy`] once the stages are done.

use crate::context::BaseLayout;
use crate::declaration::{CleanupPolicy, ProviderSpec, Settings};
use crate::error::{ProviderError, Stage};
use crate::events::{Event, EventAction, Reporter};
use crate::executor::execute;
use crate::install::install_dependencies;
use crate::materialize::{FormatRegistry, materialize};
use crate::provision::{Workspace, provision_runtime, remove_workspace};
use crate::runtime::Runtime;
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Knobs shared by every pipeline of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Deadlines come from here.
    pub settings: Settings,
    pub cleanup: CleanupPolicy,
    pub registry: FormatRegistry,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            settings: settings.clone(),
            cleanup: settings.cleanup,
            registry: FormatRegistry::default(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Deadline for runtime construction and each install step.
    fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.install_timeout_seconds)
    }

    fn execute_timeout(&self, spec: &ProviderSpec) -> Duration {
        Duration::from_secs(spec.effective_timeout(&self.settings))
    }
}

/// How a provider's pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// Output collected at `output`.
    Succeeded { output: PathBuf },
    /// A stage failed; later stages did not run.
    Failed { stage: Stage, error: String },
    /// Not selected for this run; nothing was created.
    Skipped { reason: String },
}

/// Result of one provider in a run.
#[derive(Debug, Clone)]
pub struct ProviderReport {
    pub name: String,
    pub run_id: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub outcome: ProviderOutcome,
    pub duration: Duration,
    pub workspace_removed: bool,
}

impl ProviderReport {
    pub fn skipped(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            run_id: None,
            work_dir: None,
            outcome: ProviderOutcome::Skipped {
                reason: reason.to_string(),
            },
            duration: Duration::ZERO,
            workspace_removed: false,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ProviderOutcome::Failed { .. })
    }

    /// One-word status for listings.
    pub fn status_label(&self) -> &'static str {
        match self.outcome {
            ProviderOutcome::Succeeded { .. } => "ok",
            ProviderOutcome::Failed { .. } => "failed",
            ProviderOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// Run every stage for one provider and apply the cleanup policy.
pub fn run_provider(
    layout: &BaseLayout,
    runtime: &dyn Runtime,
    spec: &ProviderSpec,
    options: &PipelineOptions,
    reporter: &dyn Reporter,
) -> ProviderReport {
    let started = Instant::now();

    let workspace = match Workspace::create(layout) {
        Ok(workspace) => workspace,
        Err(err) => {
            report_failure(spec, None, &err, reporter);
            return ProviderReport {
                name: spec.name.clone(),
                run_id: None,
                work_dir: None,
                outcome: failed(&err),
                duration: started.elapsed(),
                workspace_removed: false,
            };
        }
    };

    reporter.report(
        Event::new(EventAction::ProviderStarted)
            .with_provider(&spec.name)
            .with_run_id(&workspace.run_id)
            .with_details(json!({
                "runtime": runtime.label(),
                "script": spec.script,
                "url": spec.url,
                "dependencies": spec.requirements.len(),
            })),
    );

    let result = run_stages(&workspace, layout, runtime, spec, options, reporter);

    let outcome = match &result {
        Ok(output) => {
            reporter.report(
                Event::new(EventAction::ProviderSucceeded)
                    .with_provider(&spec.name)
                    .with_run_id(&workspace.run_id)
                    .with_details(json!({
                        "output": output.display().to_string(),
                        "duration_ms": started.elapsed().as_millis() as u64,
                    })),
            );
            ProviderOutcome::Succeeded {
                output: output.clone(),
            }
        }
        Err(err) => {
            report_failure(spec, Some(&workspace.run_id), err, reporter);
            failed(err)
        }
    };

    let workspace_removed =
        apply_cleanup(&workspace, spec, options.cleanup, result.is_ok(), reporter);

    ProviderReport {
        name: spec.name.clone(),
        run_id: Some(workspace.run_id.clone()),
        work_dir: Some(workspace.dir.clone()),
        outcome,
        duration: started.elapsed(),
        workspace_removed,
    }
}

fn run_stages(
    workspace: &Workspace,
    layout: &BaseLayout,
    runtime: &dyn Runtime,
    spec: &ProviderSpec,
    options: &PipelineOptions,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ProviderError> {
    let ctx = provision_runtime(
        workspace,
        runtime,
        &spec.name,
        options.install_timeout(),
        reporter,
    )?;

    install_dependencies(
        &ctx,
        runtime,
        &spec.name,
        &spec.requirements,
        options.install_timeout(),
        reporter,
    )?;

    materialize(&ctx, &spec.name, &spec.config, &options.registry, reporter)?;

    execute(
        &ctx,
        layout,
        runtime,
        spec,
        options.execute_timeout(spec),
        reporter,
    )
}

fn failed(err: &ProviderError) -> ProviderOutcome {
    ProviderOutcome::Failed {
        stage: err.stage(),
        error: err.to_string(),
    }
}

fn report_failure(
    spec: &ProviderSpec,
    run_id: Option<&str>,
    err: &ProviderError,
    reporter: &dyn Reporter,
) {
    let mut event = Event::new(EventAction::ProviderFailed)
        .with_provider(&spec.name)
        .with_details(json!({
            "stage": err.stage(),
            "error": err.to_string(),
        }));
    if let Some(run_id) = run_id {
        event = event.with_run_id(run_id);
    }
    reporter.report(event);
}

/// Remove the workspace if the policy asks for it. Returns whether it was removed.
fn apply_cleanup(
    workspace: &Workspace,
    spec: &ProviderSpec,
    policy: CleanupPolicy,
    succeeded: bool,
    reporter: &dyn Reporter,
) -> bool {
    if !policy.should_remove(succeeded) {
        return false;
    }

    match remove_workspace(&workspace.dir) {
        Ok(()) => {
            reporter.report(
                Event::new(EventAction::WorkspaceRemoved)
                    .with_provider(&spec.name)
                    .with_run_id(&workspace.run_id)
                    .with_details(json!({ "work_dir": workspace.dir.display().to_string() })),
            );
            true
        }
        Err(e) => {
            tracing::warn!(
                provider = %spec.name,
                run_id = %workspace.run_id,
                "failed to remove workspace '{}': {}",
                workspace.dir.display(),
                e
            );
            false
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{
        RecordingReporter, ShellRuntime, create_test_base, provider, write_script,
    };
    use serde_json::json;

    fn options(cleanup: CleanupPolicy) -> PipelineOptions {
        PipelineOptions::from_settings(&Settings::default()).with_cleanup(cleanup)
    }

    #[test]
    fn successful_pipeline_runs_every_stage_in_order() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "a.sh", "cat cfg.json > out.json\n");
        let mut spec = provider("A", "a.sh", "out.json");
        spec.requirements = vec!["requests".to_string()];
        spec.config = serde_json::from_value(json!({"cfg.json": {"k": 1}})).unwrap();
        let reporter = RecordingReporter::default();

        let report = run_provider(
            &layout,
            &ShellRuntime::default(),
            &spec,
            &options(CleanupPolicy::Retain),
            &reporter,
        );

        assert!(report.is_success(), "{:?}", report.outcome);
        assert_eq!(
            report.outcome,
            ProviderOutcome::Succeeded {
                output: layout.output_dir.join("A.json")
            }
        );
        let collected: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(layout.output_dir.join("A.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(collected, json!({"k": 1}));

        assert_eq!(
            reporter.for_provider("A"),
            vec![
                EventAction::ProviderStarted,
                EventAction::Provisioned,
                EventAction::DependenciesInstalled,
                EventAction::ConfigWritten,
                EventAction::Executed,
                EventAction::OutputCollected,
                EventAction::ProviderSucceeded,
            ]
        );
        assert!(report.work_dir.as_ref().unwrap().is_dir(), "retained by default");
        assert!(!report.workspace_removed);
    }

    #[test]
    fn install_failure_stops_before_execution() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "a.sh", "printf x > ran.txt\nprintf x > out.txt\n");
        let mut spec = provider("A", "a.sh", "out.txt");
        spec.requirements = vec!["fail-me".to_string()];
        let reporter = RecordingReporter::default();

        let report = run_provider(
            &layout,
            &ShellRuntime::default(),
            &spec,
            &options(CleanupPolicy::Retain),
            &reporter,
        );

        match &report.outcome {
            ProviderOutcome::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Install);
                assert!(error.contains("exit code 7"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let work_dir = report.work_dir.unwrap();
        assert!(!work_dir.join("ran.txt").exists());
        assert!(!layout.output_dir.join("A.txt").exists());
        assert_eq!(reporter.count(EventAction::ProviderFailed), 1);
        assert_eq!(reporter.count(EventAction::Executed), 0);
    }

    #[test]
    fn provision_failure_is_reported_with_stage() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "a.sh", "printf x > out.txt\n");

        let report = run_provider(
            &layout,
            &ShellRuntime {
                broken: true,
                ..Default::default()
            },
            &provider("A", "a.sh", "out.txt"),
            &options(CleanupPolicy::Retain),
            &RecordingReporter::default(),
        );

        assert!(matches!(
            report.outcome,
            ProviderOutcome::Failed {
                stage: Stage::Provision,
                ..
            }
        ));
        assert!(report.is_failure());
    }

    #[test]
    fn delete_on_success_removes_only_successful_workspaces() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "ok.sh", "printf x > out.txt\n");
        write_script(&layout, "bad.sh", "exit 1\n");
        let reporter = RecordingReporter::default();
        let opts = options(CleanupPolicy::DeleteOnSuccess);

        let ok = run_provider(
            &layout,
            &ShellRuntime::default(),
            &provider("ok", "ok.sh", "out.txt"),
            &opts,
            &reporter,
        );
        let bad = run_provider(
            &layout,
            &ShellRuntime::default(),
            &provider("bad", "bad.sh", "out.txt"),
            &opts,
            &reporter,
        );

        assert!(ok.workspace_removed);
        assert!(!ok.work_dir.unwrap().exists());
        assert!(layout.output_dir.join("ok.txt").exists(), "output survives cleanup");

        assert!(!bad.workspace_removed);
        assert!(bad.work_dir.unwrap().is_dir());
        assert_eq!(reporter.count(EventAction::WorkspaceRemoved), 1);
    }

    #[test]
    fn always_policy_removes_failed_workspaces() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "bad.sh", "exit 1\n");

        let report = run_provider(
            &layout,
            &ShellRuntime::default(),
            &provider("bad", "bad.sh", "out.txt"),
            &options(CleanupPolicy::Always),
            &RecordingReporter::default(),
        );

        assert!(report.is_failure());
        assert!(report.workspace_removed);
        assert!(!report.work_dir.unwrap().exists());
    }

    #[test]
    fn per_provider_timeout_overrides_settings() {
        let (_temp_dir, layout) = create_test_base();
        write_script(&layout, "slow.sh", "sleep 5\nprintf x > out.txt\n");
        let mut spec = provider("slow", "slow.sh", "out.txt");
        spec.timeout_seconds = Some(1);

        let report = run_provider(
            &layout,
            &ShellRuntime::default(),
            &spec,
            &options(CleanupPolicy::Retain),
            &RecordingReporter::default(),
        );

        match report.outcome {
            ProviderOutcome::Failed { stage, error } => {
                assert_eq!(stage, Stage::Execute);
                assert!(error.contains("1s"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn skipped_report_has_no_workspace() {
        let report = ProviderReport::skipped("A", "disabled");
        assert_eq!(report.status_label(), "skipped");
        assert!(report.work_dir.is_none());
        assert!(!report.is_failure());
    }
}
