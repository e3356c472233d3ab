//! Provider declarations for provrun.
//!
//! This module defines the declaration file (`config.json` by default) that
//! lists providers per runtime kind, the merge mapping, and optional
//! orchestrator settings. Unknown fields are preserved for forward
//! compatibility, omitted fields take defaults, and values are validated
//! after parsing.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::{ConfigPayloads, Declarations, MergeSpec, ProviderSpec};
pub use operations::{Selection, output_collisions};
pub use types::{CleanupPolicy, ProviderKind, Settings};
