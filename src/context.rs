//! Base directory layout resolution.
//!
//! Every path provrun reads or writes hangs off a single base directory:
//!
//! ```text
//! <base>/
//!   config.json              declarations (default location)
//!   scripts/provider/        provider scripts
//!   temp/<run_id>/           per-provider isolated workspaces
//!   config/                  shared output directory (collected + merged files)
//! ```
//!
//! Directory names below the base are configurable through [`Settings`].

use crate::declaration::Settings;
use crate::error::{Result, RunError};
use std::env;
use std::path::{Path, PathBuf};

/// Default declaration filename relative to the base directory.
pub const DEFAULT_DECLARATIONS_FILE: &str = "config.json";

/// Resolved absolute paths for one invocation.
#[derive(Debug, Clone)]
pub struct BaseLayout {
    /// Absolute base directory.
    pub base_dir: PathBuf,

    /// Directory holding provider scripts.
    pub scripts_dir: PathBuf,

    /// Parent of all per-run workspaces.
    pub temp_dir: PathBuf,

    /// Shared output directory.
    pub output_dir: PathBuf,
}

impl BaseLayout {
    /// Build a layout from a base directory and the declared settings.
    pub fn new<P: AsRef<Path>>(base_dir: P, settings: &Settings) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            scripts_dir: base_dir.join(&settings.scripts_dir),
            temp_dir: base_dir.join(&settings.temp_dir),
            output_dir: base_dir.join(&settings.output_dir),
            base_dir,
        }
    }

    /// Workspace directory for a run id.
    pub fn workspace_path(&self, run_id: &str) -> PathBuf {
        self.temp_dir.join(run_id)
    }

    /// Path to a provider script by filename.
    pub fn script_path(&self, script: &str) -> PathBuf {
        self.scripts_dir.join(script)
    }
}

/// Resolve the base directory: an explicit `--base-dir`, or the current directory.
pub fn resolve_base_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let cwd = env::current_dir().map_err(|e| {
        RunError::UserError(format!("failed to get current working directory: {}", e))
    })?;

    let base = match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => cwd.join(path),
        None => cwd,
    };

    if !base.is_dir() {
        return Err(RunError::UserError(format!(
            "base directory '{}' does not exist or is not a directory",
            base.display()
        )));
    }

    Ok(base)
}

/// Resolve the declaration file path: an explicit `--declarations`, or
/// `<base>/config.json`.
pub fn resolve_declarations_path(base_dir: &Path, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => base_dir.join(path),
        None => base_dir.join(DEFAULT_DECLARATIONS_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_uses_default_directory_names() {
        let layout = BaseLayout::new("/base", &Settings::default());

        assert_eq!(layout.scripts_dir, PathBuf::from("/base/scripts/provider"));
        assert_eq!(layout.temp_dir, PathBuf::from("/base/temp"));
        assert_eq!(layout.output_dir, PathBuf::from("/base/config"));
        assert_eq!(
            layout.workspace_path("abc"),
            PathBuf::from("/base/temp/abc")
        );
        assert_eq!(
            layout.script_path("freeproxy.py"),
            PathBuf::from("/base/scripts/provider/freeproxy.py")
        );
    }

    #[test]
    fn layout_honours_custom_settings() {
        let settings = Settings {
            scripts_dir: "providers".to_string(),
            output_dir: "out".to_string(),
            temp_dir: "work".to_string(),
            ..Default::default()
        };
        let layout = BaseLayout::new("/base", &settings);

        assert_eq!(layout.scripts_dir, PathBuf::from("/base/providers"));
        assert_eq!(layout.output_dir, PathBuf::from("/base/out"));
        assert_eq!(layout.temp_dir, PathBuf::from("/base/work"));
    }

    #[test]
    fn explicit_base_dir_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let err = resolve_base_dir(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("does not exist"));

        let base = resolve_base_dir(Some(temp_dir.path())).unwrap();
        assert_eq!(base, temp_dir.path());
    }

    #[test]
    fn declarations_path_defaults_to_config_json() {
        let base = Path::new("/base");
        assert_eq!(
            resolve_declarations_path(base, None),
            PathBuf::from("/base/config.json")
        );
        assert_eq!(
            resolve_declarations_path(base, Some(Path::new("decl.yaml"))),
            PathBuf::from("/base/decl.yaml")
        );
        assert_eq!(
            resolve_declarations_path(base, Some(Path::new("/etc/decl.json"))),
            PathBuf::from("/etc/decl.json")
        );
    }
}
