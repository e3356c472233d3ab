//! Config materialization.
//!
//! Each declared config payload is encoded in the format its filename
//! extension selects and written into the workspace. Unsupported extensions
//! are reported and skipped. There is no rollback: when an entry fails,
//! files written before it stay in place.

mod registry;

pub use registry::{ConfigFormat, Encoder, FormatRegistry};

use crate::declaration::ConfigPayloads;
use crate::error::ProviderError;
use crate::events::{Event, EventAction, Reporter};
use crate::fs::{atomic_write, resolve_within};
use crate::provision::ExecutionContext;
use serde_json::json;

/// Files written and skipped by one materialization.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// Write every recognized payload into the context's workspace.
pub fn materialize(
    ctx: &ExecutionContext,
    provider: &str,
    payloads: &ConfigPayloads,
    registry: &FormatRegistry,
    reporter: &dyn Reporter,
) -> Result<MaterializeOutcome, ProviderError> {
    let mut outcome = MaterializeOutcome::default();

    for (filename, payload) in payloads {
        let Some(format) = registry.lookup(filename) else {
            reporter.report(
                Event::new(EventAction::ConfigSkipped)
                    .with_provider(provider)
                    .with_run_id(&ctx.run_id)
                    .with_details(json!({
                        "file": filename,
                        "reason": "unsupported config format",
                    })),
            );
            outcome.skipped.push(filename.clone());
            continue;
        };

        let target = resolve_within(&ctx.work_dir, filename).ok_or_else(|| {
            ProviderError::ConfigWrite {
                filename: filename.clone(),
                reason: "path escapes the isolated working directory".to_string(),
            }
        })?;

        let content = (format.encode)(payload).map_err(|reason| ProviderError::ConfigWrite {
            filename: filename.clone(),
            reason: format!("{} encoding failed: {}", format.tag, reason),
        })?;

        atomic_write(&target, content.as_bytes()).map_err(|e| ProviderError::ConfigWrite {
            filename: filename.clone(),
            reason: e.to_string(),
        })?;

        reporter.report(
            Event::new(EventAction::ConfigWritten)
                .with_provider(provider)
                .with_run_id(&ctx.run_id)
                .with_details(json!({ "file": filename, "format": format.tag })),
        );
        outcome.written.push(filename.clone());
    }

    Ok(outcome)
}
