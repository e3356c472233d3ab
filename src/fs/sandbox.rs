//! Lexical path confinement.
//!
//! Declared paths (provider outputs, config filenames, merge targets) are
//! resolved against a root directory without touching the filesystem. A path
//! that is absolute, carries a drive prefix, or climbs above the root with
//! `..` is rejected.

use std::path::{Component, Path, PathBuf};

/// Resolve `relative` inside `root`.
///
/// Returns `None` when the path is absolute, escapes `root`, or normalizes to
/// `root` itself (a file path is always expected).
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let mut normalized = PathBuf::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if normalized.as_os_str().is_empty() {
        return None;
    }

    Some(root.join(normalized))
}
