//! Filesystem utilities for provrun.
//!
//! Atomic writes keep the shared output directory free of half-written files
//! (the merge stage and downstream consumers read it directly), and the
//! sandbox helpers resolve declared relative paths inside a workspace.

pub mod atomic;
pub mod sandbox;

pub use atomic::{atomic_copy, atomic_write};
pub use sandbox::resolve_within;
