//! Dependency installation into an isolated runtime.
//!
//! The runtime's package tool is upgraded first, then the declared
//! dependencies are installed in one invocation, in declaration order.
//! Version resolution is left to the package tool; its failures surface as
//! [`ProviderError::DependencyInstall`] with the exit status and the tail of
//! its output.

use crate::error::{ProviderError, Stage};
use crate::events::{Event, EventAction, Reporter};
use crate::process::run_step;
use crate::provision::ExecutionContext;
use crate::runtime::{CommandSpec, Runtime};
use serde_json::json;
use std::time::Duration;

/// Upgrade the package tool and install `deps` into the context's runtime.
pub fn install_dependencies(
    ctx: &ExecutionContext,
    runtime: &dyn Runtime,
    provider: &str,
    deps: &[String],
    timeout: Duration,
    reporter: &dyn Reporter,
) -> Result<(), ProviderError> {
    if let Some(upgrade) = runtime.upgrade_command(&ctx.runtime) {
        run_install_step(ctx, &upgrade, "upgrade", timeout)?;
    }

    if let Some(install) = runtime.install_command(&ctx.runtime, deps) {
        run_install_step(ctx, &install, "install", timeout)?;
    }

    reporter.report(
        Event::new(EventAction::DependenciesInstalled)
            .with_provider(provider)
            .with_run_id(&ctx.run_id)
            .with_details(json!({ "dependencies": deps })),
    );

    Ok(())
}

fn run_install_step(
    ctx: &ExecutionContext,
    command: &CommandSpec,
    step: &str,
    timeout: Duration,
) -> Result<(), ProviderError> {
    let outcome = run_step(command, &ctx.work_dir, &ctx.logs_dir(), step, timeout).map_err(
        |e| ProviderError::DependencyInstall {
            status: None,
            output: e.to_string(),
        },
    )?;

    if outcome.timed_out {
        return Err(ProviderError::Timeout {
            stage: Stage::Install,
            seconds: timeout.as_secs(),
        });
    }

    if !outcome.is_success() {
        return Err(ProviderError::DependencyInstall {
            status: outcome.exit_code,
            output: format!("Command: {}\n{}", command.display(), outcome.diagnostics()),
        });
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::provision::provision;
    use crate::test_support::{RecordingReporter, ShellRuntime, create_test_base};

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn deps(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn upgrades_then_installs_in_declared_order() {
        let (_temp_dir, layout) = create_test_base();
        let reporter = RecordingReporter::default();
        let runtime = ShellRuntime::default();
        let ctx = provision(&layout, &runtime, "a", TIMEOUT, &reporter).unwrap();

        install_dependencies(
            &ctx,
            &runtime,
            "a",
            &deps(&["requests", "pyyaml", "bs4"]),
            TIMEOUT,
            &reporter,
        )
        .unwrap();

        let installed = std::fs::read_to_string(ctx.work_dir.join("installed.txt")).unwrap();
        assert_eq!(installed, "upgrade\nrequests\npyyaml\nbs4\n");
        assert_eq!(reporter.count(EventAction::DependenciesInstalled), 1);
    }

    #[test]
    fn empty_dependency_list_still_upgrades() {
        let (_temp_dir, layout) = create_test_base();
        let reporter = RecordingReporter::default();
        let runtime = ShellRuntime::default();
        let ctx = provision(&layout, &runtime, "a", TIMEOUT, &reporter).unwrap();

        install_dependencies(&ctx, &runtime, "a", &[], TIMEOUT, &reporter).unwrap();

        let installed = std::fs::read_to_string(ctx.work_dir.join("installed.txt")).unwrap();
        assert_eq!(installed, "upgrade\n");
        assert!(!ctx.logs_dir().join("install.stdout.log").exists());
    }

    #[test]
    fn install_failure_carries_status_and_output() {
        let (_temp_dir, layout) = create_test_base();
        let reporter = RecordingReporter::default();
        let runtime = ShellRuntime::default();
        let ctx = provision(&layout, &runtime, "a", TIMEOUT, &reporter).unwrap();

        let err = install_dependencies(
            &ctx,
            &runtime,
            "a",
            &deps(&["requests", "failing-pkg", "never"]),
            TIMEOUT,
            &reporter,
        )
        .unwrap_err();

        match &err {
            ProviderError::DependencyInstall { status, output } => {
                assert_eq!(*status, Some(7));
                assert!(output.contains("cannot install failing-pkg"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.stage(), Stage::Install);

        // Entries before the failing one were installed, later ones were not.
        let installed = std::fs::read_to_string(ctx.work_dir.join("installed.txt")).unwrap();
        assert_eq!(installed, "upgrade\nrequests\n");
        assert_eq!(reporter.count(EventAction::DependenciesInstalled), 0);
    }

    #[test]
    fn upgrade_failure_skips_install() {
        let (_temp_dir, layout) = create_test_base();
        let reporter = RecordingReporter::default();
        let runtime = ShellRuntime {
            fail_upgrade: true,
            ..Default::default()
        };
        let ctx = provision(&layout, &runtime, "a", TIMEOUT, &reporter).unwrap();

        let err = install_dependencies(
            &ctx,
            &runtime,
            "a",
            &deps(&["requests"]),
            TIMEOUT,
            &reporter,
        )
        .unwrap_err();

        match &err {
            ProviderError::DependencyInstall { status, output } => {
                assert_eq!(*status, Some(5));
                assert!(output.contains("package tool is broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.stage(), Stage::Install);
        assert!(!ctx.work_dir.join("installed.txt").exists());
        assert!(!ctx.logs_dir().join("install.stdout.log").exists());
        assert_eq!(reporter.count(EventAction::DependenciesInstalled), 0);
    }
}
