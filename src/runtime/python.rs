//! Python virtualenv runtime.

use super::{CommandSpec, Runtime, RuntimeHandle};
use std::path::{Path, PathBuf};

/// Directory of the virtualenv inside a workspace.
const VENV_DIR: &str = "venv";

/// Runs providers inside a fresh `venv` per workspace.
#[derive(Debug, Clone)]
pub struct PythonVenv {
    /// Base interpreter command used to create the virtualenv.
    interpreter: Vec<String>,
}

impl PythonVenv {
    pub fn new(interpreter: Vec<String>) -> Self {
        Self { interpreter }
    }

    fn venv_python(venv: &Path) -> PathBuf {
        if cfg!(windows) {
            venv.join("Scripts").join("python.exe")
        } else {
            venv.join("bin").join("python")
        }
    }

    fn venv_command(handle: &RuntimeHandle) -> CommandSpec {
        CommandSpec::new(handle.interpreter.to_string_lossy())
    }
}

impl Runtime for PythonVenv {
    fn label(&self) -> &'static str {
        "python"
    }

    fn create_commands(&self, workspace: &Path) -> Vec<CommandSpec> {
        let mut words = self.interpreter.iter();
        let program = words.next().map(String::as_str).unwrap_or("python3");

        vec![
            CommandSpec::new(program)
                .args(words)
                .args(["-m", "venv"])
                .arg(workspace.join(VENV_DIR)),
        ]
    }

    fn handle(&self, workspace: &Path) -> RuntimeHandle {
        let root = workspace.join(VENV_DIR);
        RuntimeHandle {
            workspace: workspace.to_path_buf(),
            interpreter: Self::venv_python(&root),
            root,
        }
    }

    fn verify(&self, handle: &RuntimeHandle) -> Result<(), String> {
        if handle.interpreter.exists() {
            Ok(())
        } else {
            Err(format!(
                "virtualenv interpreter not found at '{}'",
                handle.interpreter.display()
            ))
        }
    }

    fn upgrade_command(&self, handle: &RuntimeHandle) -> Option<CommandSpec> {
        Some(Self::venv_command(handle).args(["-m", "pip", "install", "--upgrade", "pip"]))
    }

    fn install_command(&self, handle: &RuntimeHandle, deps: &[String]) -> Option<CommandSpec> {
        if deps.is_empty() {
            return None;
        }
        Some(
            Self::venv_command(handle)
                .args(["-m", "pip", "install"])
                .args(deps),
        )
    }

    fn run_command(&self, handle: &RuntimeHandle, script: &str) -> CommandSpec {
        Self::venv_command(handle).arg(script)
    }
}
