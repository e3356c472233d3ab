//! Error types for provrun.
//!
//! Two layers of errors exist:
//!
//! - [`ProviderError`] is scoped to a single provider pipeline. It is returned
//!   as a value, recorded in that provider's report, and never aborts the run.
//! - [`RunError`] is scoped to a whole invocation and maps to a process exit code.

use crate::exit_codes;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a provider was in when something happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Provision,
    Install,
    Materialize,
    Execute,
    Collect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Provision => write!(f, "provision"),
            Stage::Install => write!(f, "install"),
            Stage::Materialize => write!(f, "materialize"),
            Stage::Execute => write!(f, "execute"),
            Stage::Collect => write!(f, "collect"),
        }
    }
}

/// Failure of one provider's pipeline.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The isolated directory or runtime instance could not be created.
    #[error("failed to provision isolated environment: {0}")]
    Provision(String),

    /// The package tool upgrade or dependency install exited unsuccessfully.
    #[error("dependency installation failed with {}\n{output}", describe_status(.status))]
    DependencyInstall {
        status: Option<i32>,
        /// Tail of the tool's captured stdout/stderr.
        output: String,
    },

    /// A config payload could not be encoded or written.
    #[error("failed to write config file '{filename}': {reason}")]
    ConfigWrite { filename: String, reason: String },

    /// The provider script is missing or could not be copied into the workspace.
    #[error("provider script unavailable: {0}")]
    ScriptUnavailable(String),

    /// The script exited unsuccessfully.
    #[error("provider script failed with {}\n{output}", describe_status(.status))]
    Execution {
        status: Option<i32>,
        /// Log location and tail of the script's captured stdout/stderr.
        output: String,
    },

    /// An external step exceeded its deadline and was killed.
    #[error("{stage} step exceeded its deadline of {seconds}s and was killed")]
    Timeout { stage: Stage, seconds: u64 },

    /// The script succeeded but its declared output file does not exist.
    #[error("output file not found after execution: {0}")]
    MissingOutput(String),

    /// The declared output path resolves outside the isolated working directory.
    #[error("output path '{0}' escapes the isolated working directory")]
    OutputPathEscapes(String),

    /// The output file could not be copied into the shared output directory.
    #[error("failed to collect output: {0}")]
    Collect(String),
}

impl ProviderError {
    /// The pipeline stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            ProviderError::Provision(_) => Stage::Provision,
            ProviderError::DependencyInstall { .. } => Stage::Install,
            ProviderError::ConfigWrite { .. } => Stage::Materialize,
            ProviderError::ScriptUnavailable(_) | ProviderError::Execution { .. } => Stage::Execute,
            ProviderError::Timeout { stage, .. } => *stage,
            ProviderError::MissingOutput(_)
            | ProviderError::OutputPathEscapes(_)
            | ProviderError::Collect(_) => Stage::Collect,
        }
    }
}

/// Render an optional exit code for messages.
pub fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn entries_word(count: &usize) -> &'static str {
    if *count == 1 { "entry" } else { "entries" }
}

/// Invocation-level error, mapped to an exit code by `main`.
#[derive(Error, Debug)]
pub enum RunError {
    /// The declaration file is missing, unreadable, or invalid.
    #[error("{0}")]
    Declarations(String),

    /// Bad arguments or settings.
    #[error("{0}")]
    UserError(String),

    /// The shared output directory does not exist, so nothing can be merged.
    #[error("merge unavailable: output directory '{}' does not exist", .0.display())]
    MergeUnavailable(PathBuf),

    /// The run completed but some providers failed.
    #[error("{failed} of {total} provider(s) failed")]
    ProvidersFailed { failed: usize, total: usize },

    /// The merge stage completed but some entries could not be written.
    #[error("{failed} merge {} failed", entries_word(.failed))]
    MergeFailed { failed: usize },
}

impl RunError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Declarations(_) | RunError::UserError(_) => exit_codes::USER_ERROR,
            RunError::ProvidersFailed { .. } => exit_codes::PROVIDER_FAILURE,
            RunError::MergeUnavailable(_) | RunError::MergeFailed { .. } => {
                exit_codes::MERGE_FAILURE
            }
        }
    }
}

/// Result type alias for invocation-level operations.
pub type Result<T> = std::result::Result<T, RunError>;
