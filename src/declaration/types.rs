//! Declaration enums, settings, and default values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Runtime kind a provider list is declared under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Python script run inside a private virtualenv.
    Python,
    /// Node script run against a private `node_modules` prefix.
    Node,
}

impl ProviderKind {
    /// Key of this kind's provider list in the declaration file.
    pub fn declaration_key(&self) -> &'static str {
        match self {
            ProviderKind::Python => "python",
            ProviderKind::Node => "node",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.declaration_key())
    }
}

/// What happens to a provider's isolated workspace after its pipeline ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Keep every workspace for post-hoc inspection.
    #[default]
    Retain,
    /// Delete workspaces of successful providers, keep failed ones.
    DeleteOnSuccess,
    /// Delete every workspace once its pipeline ends.
    Always,
}

impl CleanupPolicy {
    /// Parse a cleanup policy from a string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "retain" => Some(Self::Retain),
            "delete-on-success" => Some(Self::DeleteOnSuccess),
            "always" => Some(Self::Always),
            _ => None,
        }
    }

    /// Whether a workspace should be removed given the pipeline outcome.
    pub fn should_remove(&self, succeeded: bool) -> bool {
        match self {
            CleanupPolicy::Retain => false,
            CleanupPolicy::DeleteOnSuccess => succeeded,
            CleanupPolicy::Always => true,
        }
    }
}

/// Orchestrator settings, declared under `settings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // =========================================================================
    // Layout
    // =========================================================================
    /// Directory holding provider scripts, relative to the base directory.
    #[serde(default = "default_scripts_dir")]
    pub scripts_dir: String,

    /// Shared output directory, relative to the base directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Parent of per-run workspaces, relative to the base directory.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: String,

    // =========================================================================
    // Toolchains
    // =========================================================================
    /// Interpreter used to create virtualenvs (shell-words parsed, e.g. `py -3`).
    #[serde(default = "default_python_interpreter")]
    pub python_interpreter: String,

    /// Node executable.
    #[serde(default = "default_node_binary")]
    pub node_binary: String,

    /// npm executable.
    #[serde(default = "default_npm_binary")]
    pub npm_binary: String,

    // =========================================================================
    // Deadlines
    // =========================================================================
    /// Deadline for each runtime-construction, upgrade, and install step.
    #[serde(default = "default_install_timeout_seconds")]
    pub install_timeout_seconds: u64,

    /// Deadline for script execution (a provider may override it).
    #[serde(default = "default_execute_timeout_seconds")]
    pub execute_timeout_seconds: u64,

    // =========================================================================
    // Run behavior
    // =========================================================================
    /// Maximum providers processed concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Workspace cleanup policy.
    #[serde(default)]
    pub cleanup: CleanupPolicy,

    /// NDJSON event journal path, relative to the base directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scripts_dir: default_scripts_dir(),
            output_dir: default_output_dir(),
            temp_dir: default_temp_dir(),
            python_interpreter: default_python_interpreter(),
            node_binary: default_node_binary(),
            npm_binary: default_npm_binary(),
            install_timeout_seconds: default_install_timeout_seconds(),
            execute_timeout_seconds: default_execute_timeout_seconds(),
            parallelism: default_parallelism(),
            cleanup: CleanupPolicy::default(),
            journal: None,
            extra: BTreeMap::new(),
        }
    }
}

// Default value functions for serde
pub(crate) fn default_scripts_dir() -> String {
    "scripts/provider".to_string()
}
pub(crate) fn default_output_dir() -> String {
    "config".to_string()
}
pub(crate) fn default_temp_dir() -> String {
    "temp".to_string()
}
pub(crate) fn default_python_interpreter() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}
pub(crate) fn default_node_binary() -> String {
    "node".to_string()
}
pub(crate) fn default_npm_binary() -> String {
    "npm".to_string()
}
pub(crate) fn default_install_timeout_seconds() -> u64 {
    900
}
pub(crate) fn default_execute_timeout_seconds() -> u64 {
    600
}
pub(crate) fn default_parallelism() -> usize {
    1
}
pub(crate) fn default_true() -> bool {
    true
}
