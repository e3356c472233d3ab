//! Event reporting for provrun.
//!
//! Every stage transition and every failure becomes an [`Event`]. Components
//! receive a `&dyn Reporter` and hand it events instead of logging them, so
//! tests can record them and production can fan them out.
//!
//! The production reporter, [`EventJournal`], emits each event as a `tracing`
//! record and, when configured, appends it to an NDJSON journal (one JSON
//! object per line).
//!
//! # Event Format
//!
//! - `ts`: RFC3339 timestamp
//! - `action`: what happened (`provisioned`, `provider_failed`, ...)
//! - `actor`: the owner string (`user@HOST`)
//! - `provider`: provider name, for provider-scoped events
//! - `run_id`: workspace run id, once provisioned
//! - `details`: freeform object with action-specific details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Actions that can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// A provider run started for a kind
    RunStarted,
    /// Provider not selected (disabled or not requested)
    ProviderSkipped,
    /// Provider pipeline started
    ProviderStarted,
    /// Workspace and runtime created
    Provisioned,
    /// Package tool upgraded and dependencies installed
    DependenciesInstalled,
    /// One config file written
    ConfigWritten,
    /// Config file skipped: unsupported format
    ConfigSkipped,
    /// Provider script finished successfully
    Executed,
    /// Output copied to the shared output directory
    OutputCollected,
    /// Provider pipeline succeeded
    ProviderSucceeded,
    /// Provider pipeline failed
    ProviderFailed,
    /// Workspace removed by the cleanup policy
    WorkspaceRemoved,
    /// Two selected providers collect to the same filename
    OutputCollision,
    /// Provider run finished
    RunCompleted,
    /// Merge stage started
    MergeStarted,
    /// Merge input absent, skipped
    MergeInputMissing,
    /// Merged file written
    MergeWritten,
    /// Merge entry could not be produced
    MergeFailed,
    /// Merge stage finished
    MergeCompleted,
}

impl EventAction {
    /// Severity this action is logged at.
    pub fn level(&self) -> tracing::Level {
        match self {
            EventAction::ProviderFailed | EventAction::MergeFailed => tracing::Level::ERROR,
            EventAction::ConfigSkipped
            | EventAction::MergeInputMissing
            | EventAction::OutputCollision => tracing::Level::WARN,
            _ => tracing::Level::INFO,
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventAction::RunStarted => "run_started",
            EventAction::ProviderSkipped => "provider_skipped",
            EventAction::ProviderStarted => "provider_started",
            EventAction::Provisioned => "provisioned",
            EventAction::DependenciesInstalled => "dependencies_installed",
            EventAction::ConfigWritten => "config_written",
            EventAction::ConfigSkipped => "config_skipped",
            EventAction::Executed => "executed",
            EventAction::OutputCollected => "output_collected",
            EventAction::ProviderSucceeded => "provider_succeeded",
            EventAction::ProviderFailed => "provider_failed",
            EventAction::WorkspaceRemoved => "workspace_removed",
            EventAction::OutputCollision => "output_collision",
            EventAction::RunCompleted => "run_completed",
            EventAction::MergeStarted => "merge_started",
            EventAction::MergeInputMissing => "merge_input_missing",
            EventAction::MergeWritten => "merge_written",
            EventAction::MergeFailed => "merge_failed",
            EventAction::MergeCompleted => "merge_completed",
        };
        f.write_str(name)
    }
}

/// A reported event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that happened.
    pub action: EventAction,

    /// The actor running provrun (e.g., `user@HOST`).
    pub actor: String,

    /// Provider name for provider-scoped events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Workspace run id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event with the given action, timestamped now.
    pub fn new(action: EventAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: get_actor_string(),
            provider: None,
            run_id: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the provider name for this event.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Set the run id for this event.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Sink for events. Implementations must tolerate concurrent providers.
pub trait Reporter: Send + Sync {
    fn report(&self, event: Event);
}

/// Production reporter: tracing output plus an optional NDJSON journal.
#[derive(Debug, Default)]
pub struct EventJournal {
    journal: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl EventJournal {
    /// Reporter that only emits tracing records.
    pub fn tracing_only() -> Self {
        Self::default()
    }

    /// Reporter that also appends every event to `path`.
    pub fn with_journal(path: impl Into<PathBuf>) -> Self {
        Self {
            journal: Some(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    /// Journal path, if any.
    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_deref()
    }
}

impl Reporter for EventJournal {
    fn report(&self, event: Event) {
        log_event(&event);

        if let Some(path) = &self.journal {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(|poison| poison.into_inner());
            if let Err(e) = append_event(path, &event) {
                tracing::warn!(journal = %path.display(), error = %e, "failed to append event to journal");
            }
        }
    }
}

/// Emit an event as a tracing record at the action's level.
pub fn log_event(event: &Event) {
    let provider = event.provider.as_deref().unwrap_or("-");
    let run_id = event.run_id.as_deref().unwrap_or("-");
    let action = event.action;
    let details = &event.details;

    let level = action.level();
    if level == tracing::Level::ERROR {
        tracing::error!(%action, provider, run_id, %details, "{}", action);
    } else if level == tracing::Level::WARN {
        tracing::warn!(%action, provider, run_id, %details, "{}", action);
    } else {
        tracing::info!(%action, provider, run_id, %details, "{}", action);
    }
}

/// Get the actor string for event metadata.
fn get_actor_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}

/// Append an event as one NDJSON line, creating the file and its directory.
pub fn append_event(path: &Path, event: &Event) -> io::Result<()> {
    let json_line = event
        .to_ndjson_line()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json_line)?;
    file.sync_all()
}
