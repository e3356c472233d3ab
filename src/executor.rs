//! Provider execution and output collection.
//!
//! Steps, sequential and without retries:
//!
//! 1. copy the provider script into the workspace
//! 2. run it with the isolated runtime, workspace as cwd, under a deadline
//! 3. locate the declared output inside the workspace
//! 4. copy it into the shared output directory as `<name><ext>`

use crate::context::BaseLayout;
use crate::declaration::ProviderSpec;
use crate::error::{ProviderError, Stage};
use crate::events::{Event, EventAction, Reporter};
use crate::fs::{atomic_copy, resolve_within};
use crate::process::run_step;
use crate::provision::ExecutionContext;
use crate::runtime::Runtime;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Run the provider script and collect its output.
///
/// Returns the path of the collected file in the shared output directory.
pub fn execute(
    ctx: &ExecutionContext,
    layout: &BaseLayout,
    runtime: &dyn Runtime,
    spec: &ProviderSpec,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ProviderError> {
    let script_name = copy_script(ctx, layout, &spec.script)?;
    run_script(ctx, runtime, spec, &script_name, timeout, reporter)?;
    collect_output(ctx, layout, spec, reporter)
}

/// Copy the script into the workspace root, returning its filename there.
fn copy_script(
    ctx: &ExecutionContext,
    layout: &BaseLayout,
    script: &str,
) -> Result<String, ProviderError> {
    let source = resolve_within(&layout.scripts_dir, script).ok_or_else(|| {
        ProviderError::ScriptUnavailable(format!(
            "script '{}' is not inside '{}'",
            script,
            layout.scripts_dir.display()
        ))
    })?;

    if !source.is_file() {
        return Err(ProviderError::ScriptUnavailable(format!(
            "script not found: {}",
            source.display()
        )));
    }

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ProviderError::ScriptUnavailable(format!("invalid script '{}'", script)))?;

    std::fs::copy(&source, ctx.work_dir.join(&file_name)).map_err(|e| {
        ProviderError::ScriptUnavailable(format!(
            "failed to copy script '{}' into workspace: {}",
            source.display(),
            e
        ))
    })?;

    Ok(file_name)
}

fn run_script(
    ctx: &ExecutionContext,
    runtime: &dyn Runtime,
    spec: &ProviderSpec,
    script_name: &str,
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<(), ProviderError> {
    let command = runtime.run_command(&ctx.runtime, script_name);

    let outcome = run_step(&command, &ctx.work_dir, &ctx.logs_dir(), "execute", timeout)
        .map_err(|e| ProviderError::ScriptUnavailable(e.to_string()))?;

    if outcome.timed_out {
        return Err(ProviderError::Timeout {
            stage: Stage::Execute,
            seconds: timeout.as_secs(),
        });
    }

    if !outcome.is_success() {
        return Err(ProviderError::Execution {
            status: outcome.exit_code,
            output: format!(
                "Logs: {}\n{}",
                outcome.stderr_path.display(),
                outcome.diagnostics()
            ),
        });
    }

    reporter.report(
        Event::new(EventAction::Executed)
            .with_provider(&spec.name)
            .with_run_id(&ctx.run_id)
            .with_details(json!({
                "script": script_name,
                "duration_ms": outcome.duration.as_millis() as u64,
            })),
    );

    Ok(())
}

fn collect_output(
    ctx: &ExecutionContext,
    layout: &BaseLayout,
    spec: &ProviderSpec,
    reporter: &dyn Reporter,
) -> Result<PathBuf, ProviderError> {
    let source = resolve_within(&ctx.work_dir, &spec.output)
        .ok_or_else(|| ProviderError::OutputPathEscapes(spec.output.clone()))?;

    if !source.is_file() {
        return Err(ProviderError::MissingOutput(spec.output.clone()));
    }

    let destination = layout.output_dir.join(spec.collected_filename());
    ensure_dir(&layout.output_dir)?;
    atomic_copy(&source, &destination).map_err(|e| ProviderError::Collect(e.to_string()))?;

    reporter.report(
        Event::new(EventAction::OutputCollected)
            .with_provider(&spec.name)
            .with_run_id(&ctx.run_id)
            .with_details(json!({
                "source": spec.output,
                "destination": destination.display().to_string(),
            })),
    );

    Ok(destination)
}

fn ensure_dir(dir: &Path) -> Result<(), ProviderError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        ProviderError::Collect(format!(
            "failed to create output directory '{}': {}",
            dir.display(),
            e
        ))
    })
}
