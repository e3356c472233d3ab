//! Implementation of `provrun python-providers` and `provrun node-providers`.

use super::Invocation;
use crate::cli::RunArgs;
use crate::coordinator::{RunRequest, RunSummary, run_providers};
use crate::declaration::{CleanupPolicy, ProviderKind};
use crate::error::{Result, RunError};
use crate::pipeline::ProviderOutcome;
use crate::runtime;

/// Run the selected providers of `kind` and print a summary.
///
/// Exits non-zero (via `ProvidersFailed`) when any provider failed, after
/// every selected provider has had its turn.
pub fn cmd_run(invocation: &Invocation, kind: ProviderKind, args: RunArgs) -> Result<()> {
    let request = build_request(kind, args)?;
    let runtime = runtime::for_kind(kind, &invocation.declarations.settings)?;

    let summary = run_providers(
        &invocation.layout,
        &invocation.declarations,
        &request,
        runtime.as_ref(),
        &invocation.reporter,
    )?;

    print_summary(&summary);
    summary.check()
}

fn build_request(kind: ProviderKind, args: RunArgs) -> Result<RunRequest> {
    let cleanup = match args.cleanup.as_deref() {
        None => None,
        Some(value) => Some(CleanupPolicy::from_str(value).ok_or_else(|| {
            RunError::UserError(format!(
                "invalid cleanup policy '{}' (expected retain, delete-on-success, or always)",
                value
            ))
        })?),
    };

    if args.jobs == Some(0) {
        return Err(RunError::UserError("--jobs must be at least 1".to_string()));
    }

    Ok(RunRequest {
        kind,
        force: args.force,
        only: args.only,
        jobs: args.jobs,
        cleanup,
    })
}

fn print_summary(summary: &RunSummary) {
    if summary.reports.is_empty() {
        println!("No {} providers declared.", summary.kind);
        return;
    }

    println!("{} providers", summary.kind);
    for report in &summary.reports {
        let detail = match &report.outcome {
            ProviderOutcome::Succeeded { output } => output.display().to_string(),
            ProviderOutcome::Failed { stage, error } => {
                let first_line = error.lines().next().unwrap_or_default();
                format!("{} stage: {}", stage, first_line)
            }
            ProviderOutcome::Skipped { reason } => reason.clone(),
        };
        println!(
            "  {:<24} {:<8} {:>7.1}s  {}",
            report.name,
            report.status_label(),
            report.duration.as_secs_f64(),
            detail
        );
    }
    println!(
        "{} succeeded, {} failed, {} skipped",
        summary.succeeded(),
        summary.failed(),
        summary.skipped()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_flags() {
        let args = RunArgs {
            force: true,
            only: vec!["a".to_string()],
            jobs: Some(2),
            cleanup: Some("always".to_string()),
        };

        let request = build_request(ProviderKind::Node, args).unwrap();

        assert_eq!(request.kind, ProviderKind::Node);
        assert!(request.force);
        assert_eq!(request.only, vec!["a"]);
        assert_eq!(request.jobs, Some(2));
        assert_eq!(request.cleanup, Some(CleanupPolicy::Always));
    }

    #[test]
    fn defaults_defer_to_settings() {
        let request = build_request(ProviderKind::Python, RunArgs::default()).unwrap();
        assert!(request.jobs.is_none());
        assert!(request.cleanup.is_none());
    }

    #[test]
    fn invalid_cleanup_is_user_error() {
        let args = RunArgs {
            cleanup: Some("sometimes".to_string()),
            ..Default::default()
        };

        let err = build_request(ProviderKind::Python, args).unwrap_err();
        assert!(matches!(err, RunError::UserError(_)));
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn zero_jobs_is_user_error() {
        let args = RunArgs {
            jobs: Some(0),
            ..Default::default()
        };
        assert!(build_request(ProviderKind::Python, args).is_err());
    }
}
