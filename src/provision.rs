//! Environment provisioning.
//!
//! A provider run gets its own workspace at `<base>/temp/<run_id>` with a
//! fresh UUID v4 run id, and an isolated runtime instance is constructed
//! inside it. Nothing in a workspace is shared with another run.

use crate::context::BaseLayout;
use crate::error::{ProviderError, Stage, describe_status};
use crate::events::{Event, EventAction, Reporter};
use crate::process::run_step;
use crate::runtime::{Runtime, RuntimeHandle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory for captured step output inside a workspace.
const LOGS_DIR: &str = "logs";

/// A freshly created, exclusively owned workspace directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub run_id: String,
    pub dir: PathBuf,
}

impl Workspace {
    /// Create `<temp_dir>/<run_id>` with a new run id.
    pub fn create(layout: &BaseLayout) -> Result<Self, ProviderError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let dir = layout.workspace_path(&run_id);

        std::fs::create_dir_all(&dir).map_err(|e| {
            ProviderError::Provision(format!(
                "failed to create workspace '{}': {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self { run_id, dir })
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.dir.join(LOGS_DIR)
    }
}

/// Per-run execution context: the workspace plus its runtime instance.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: String,
    pub work_dir: PathBuf,
    pub runtime: RuntimeHandle,
}

impl ExecutionContext {
    /// Where step stdout/stderr logs are captured.
    pub fn logs_dir(&self) -> PathBuf {
        self.work_dir.join(LOGS_DIR)
    }
}

/// Construct the runtime instance inside an existing workspace.
///
/// Construction commands share the install deadline.
pub fn provision_runtime(
    workspace: &Workspace,
    runtime: &dyn Runtime,
    provider: &str,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<ExecutionContext, ProviderError> {
    runtime.prepare(&workspace.dir).map_err(|e| {
        ProviderError::Provision(format!("failed to prepare {} runtime: {}", runtime.label(), e))
    })?;

    let commands = runtime.create_commands(&workspace.dir);
    for (index, command) in commands.iter().enumerate() {
        let step = if commands.len() == 1 {
            "provision".to_string()
        } else {
            format!("provision-{}", index + 1)
        };

        let outcome = run_step(
            command,
            &workspace.dir,
            &workspace.logs_dir(),
            &step,
            timeout,
        )
        .map_err(|e| ProviderError::Provision(e.to_string()))?;

        if outcome.timed_out {
            return Err(ProviderError::Timeout {
                stage: Stage::Provision,
                seconds: timeout.as_secs(),
            });
        }
        if !outcome.is_success() {
            return Err(ProviderError::Provision(format!(
                "'{}' failed with {}\n{}",
                command.display(),
                describe_status(&outcome.exit_code),
                outcome.diagnostics()
            )));
        }
    }

    let handle = runtime.handle(&workspace.dir);
    runtime.verify(&handle).map_err(ProviderError::Provision)?;

    reporter.report(
        Event::new(EventAction::Provisioned)
            .with_provider(provider)
            .with_run_id(&workspace.run_id)
            .with_details(json!({
                "runtime": runtime.label(),
                "work_dir": workspace.dir.display().to_string(),
            })),
    );

    Ok(ExecutionContext {
        run_id: workspace.run_id.clone(),
        work_dir: workspace.dir.clone(),
        runtime: handle,
    })
}

/// Create a workspace under `layout` and provision `runtime` in it.
pub fn provision(
    layout: &BaseLayout,
    runtime: &dyn Runtime,
    provider: &str,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<ExecutionContext, ProviderError> {
    let workspace = Workspace::create(layout)?;
    provision_runtime(&workspace, runtime, provider, timeout, reporter)
}

/// Remove a workspace directory. Missing directories count as removed.
pub fn remove_workspace(dir: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
