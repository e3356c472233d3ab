//! Run coordination: provider selection, concurrent pipelines, run summary.
//!
//! Selection happens first; providers that are not selected are reported as
//! skipped and nothing is created for them. Selected providers run through
//! [`run_provider`] on a thread pool of `jobs` workers (one by default, which
//! runs them strictly in declaration order). The summary keeps declaration
//! order regardless of completion order.

use crate::context::BaseLayout;
use crate::declaration::{
    CleanupPolicy, Declarations, ProviderKind, Selection, output_collisions,
};
use crate::error::{Result, RunError};
use crate::events::{Event, EventAction, Reporter};
use crate::merge::{MergeReport, run_merge};
use crate::pipeline::{PipelineOptions, ProviderReport, run_provider};
use crate::runtime::Runtime;
use rayon::prelude::*;
use serde_json::json;
use std::time::Instant;

/// What to run, as requested on the command line.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub kind: ProviderKind,
    /// Run disabled providers too.
    pub force: bool,
    /// Restrict the run to these provider names.
    pub only: Vec<String>,
    /// Overrides `settings.parallelism`.
    pub jobs: Option<usize>,
    /// Overrides `settings.cleanup`.
    pub cleanup: Option<CleanupPolicy>,
}

impl RunRequest {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            force: false,
            only: Vec::new(),
            jobs: None,
            cleanup: None,
        }
    }
}

/// Per-provider reports of one run, in declaration order.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kind: ProviderKind,
    pub reports: Vec<ProviderReport>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.reports.len() - self.succeeded() - self.failed()
    }

    /// `ProvidersFailed` if any selected provider failed.
    pub fn check(&self) -> Result<()> {
        let failed = self.failed();
        if failed > 0 {
            return Err(RunError::ProvidersFailed {
                failed,
                total: self.succeeded() + failed,
            });
        }
        Ok(())
    }
}

/// Run the selected providers of one kind.
///
/// Provider failures never make this return `Err`; they are in the summary.
pub fn run_providers(
    layout: &BaseLayout,
    declarations: &Declarations,
    request: &RunRequest,
    runtime: &dyn Runtime,
    reporter: &dyn Reporter,
) -> Result<RunSummary> {
    let settings = &declarations.settings;
    let (selected, skipped) = declarations.select(&Selection {
        kind: request.kind,
        force: request.force,
        only: request.only.clone(),
    })?;

    let jobs = request.jobs.unwrap_or(settings.parallelism);
    if jobs == 0 {
        return Err(RunError::UserError("--jobs must be at least 1".to_string()));
    }

    let mut options = PipelineOptions::from_settings(settings);
    if let Some(cleanup) = request.cleanup {
        options = options.with_cleanup(cleanup);
    }

    let started = Instant::now();
    reporter.report(Event::new(EventAction::RunStarted).with_details(json!({
        "kind": request.kind,
        "selected": selected.len(),
        "skipped": skipped.len(),
        "jobs": jobs,
        "cleanup": options.cleanup,
    })));

    for (filename, claimants) in output_collisions(&selected) {
        reporter.report(Event::new(EventAction::OutputCollision).with_details(json!({
            "output": filename,
            "providers": claimants,
        })));
    }

    for (spec, reason) in &skipped {
        reporter.report(
            Event::new(EventAction::ProviderSkipped)
                .with_provider(&spec.name)
                .with_details(json!({ "reason": reason })),
        );
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .thread_name(|i| format!("provider-{}", i))
        .build()
        .map_err(|e| RunError::UserError(format!("failed to start worker pool: {}", e)))?;

    let ran: Vec<ProviderReport> = pool.install(|| {
        selected
            .par_iter()
            .map(|spec| run_provider(layout, runtime, spec, &options, reporter))
            .collect()
    });

    // Merge run and skipped reports back into declaration order.
    let mut ran = ran.into_iter();
    let reports = declarations
        .providers(request.kind)
        .iter()
        .filter_map(|spec| {
            if let Some((_, reason)) = skipped.iter().find(|(s, _)| std::ptr::eq(*s, spec)) {
                Some(ProviderReport::skipped(&spec.name, reason))
            } else {
                ran.next()
            }
        })
        .collect();

    let summary = RunSummary {
        kind: request.kind,
        reports,
    };

    reporter.report(Event::new(EventAction::RunCompleted).with_details(json!({
        "kind": request.kind,
        "succeeded": summary.succeeded(),
        "failed": summary.failed(),
        "skipped": summary.skipped(),
        "duration_ms": started.elapsed().as_millis() as u64,
    })));

    Ok(summary)
}

/// Merge mode: run the full merge mapping once.
///
/// Entry failures are left in the reports; see [`crate::merge::check_reports`].
pub fn run_merge_stage(
    layout: &BaseLayout,
    declarations: &Declarations,
    reporter: &dyn Reporter,
) -> Result<Vec<MergeReport>> {
    run_merge(layout, &declarations.merge, reporter)
}
