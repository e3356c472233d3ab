//! Declaration structs.

use super::types::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Config payloads keyed by filename, in declaration order.
pub type ConfigPayloads = IndexMap<String, Value>;

/// Merge mapping: output filename to ordered input filenames.
pub type MergeSpec = IndexMap<String, Vec<String>>;

/// The declaration file.
///
/// ```json
/// {
///   "python": [
///     { "name": "freeproxy", "script": "freeproxy.py",
///       "requirements": ["requests", "pyyaml"],
///       "config": { "config.yml": { "country": "US" } },
///       "output": "v2ray.txt", "url": "https://example.org", "enable": true }
///   ],
///   "node": [],
///   "merge": { "all.txt": ["freeproxy.txt", "other.txt"] },
///   "settings": { "parallelism": 2, "cleanup": "delete-on-success" }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Declarations {
    /// Providers run inside a Python virtualenv.
    pub python: Vec<ProviderSpec>,

    /// Providers run with Node against a private prefix.
    pub node: Vec<ProviderSpec>,

    /// Merge mapping for the merge stage.
    pub merge: MergeSpec,

    /// Orchestrator settings.
    pub settings: Settings,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One declared provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Unique identifier; also the stem of the collected output filename.
    pub name: String,

    /// Script filename, resolved against the scripts directory.
    pub script: String,

    /// Dependencies installed into the isolated runtime, in order.
    #[serde(default, alias = "dependencies", skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,

    /// Config files to materialize in the workspace, keyed by filename.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub config: ConfigPayloads,

    /// Path of the result file, relative to the workspace.
    pub output: String,

    /// Informational source URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Disabled providers only run when forced.
    #[serde(default = "default_true", alias = "enabled")]
    pub enable: bool,

    /// Execution deadline override in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Unknown fields preserved for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ProviderSpec {
    /// Extension of the declared output path, including the leading dot.
    ///
    /// Empty when the output has no extension.
    pub fn output_extension(&self) -> String {
        std::path::Path::new(&self.output)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Filename under which the output is collected: `<name><ext>`.
    pub fn collected_filename(&self) -> String {
        format!("{}{}", self.name, self.output_extension())
    }

    /// Effective execution deadline for this provider.
    pub fn effective_timeout(&self, settings: &Settings) -> u64 {
        self.timeout_seconds
            .unwrap_or(settings.execute_timeout_seconds)
    }
}
