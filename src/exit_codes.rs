//! Exit code constants for the provrun CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, missing or invalid declarations)
//! - 2: One or more providers failed (the run still completed)
//! - 3: Merge stage unavailable or a merge entry failed

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, missing or unparseable declaration file.
pub const USER_ERROR: i32 = 1;

/// At least one selected provider failed during its pipeline.
pub const PROVIDER_FAILURE: i32 = 2;

/// Merge could not run (no shared output directory) or an entry failed.
pub const MERGE_FAILURE: i32 = 3;
