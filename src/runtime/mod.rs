//! Isolated runtimes.
//!
//! A [`Runtime`] knows how to build a private interpreter/dependency
//! environment inside a workspace and which commands upgrade its package tool,
//! install dependencies, and run a script. It only describes commands; the
//! provisioner, installer and executor run them through [`crate::process`]
//! with deadlines and captured output.

mod node;
mod python;

pub use node::NodePrefix;
pub use python::PythonVenv;

use crate::declaration::{ProviderKind, Settings};
use crate::error::{Result, RunError};
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A program plus arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Shell-quoted rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(|a| a.as_str()));
        shell_words::join(words)
    }

    /// Build a `std::process::Command` for this spec.
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// Handle on a constructed runtime instance inside a workspace.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    /// Workspace the runtime lives in.
    pub workspace: PathBuf,

    /// Runtime-owned directory (virtualenv, `node_modules`, ...).
    pub root: PathBuf,

    /// Executable that runs provider scripts.
    pub interpreter: PathBuf,
}

/// Describes how to build and drive one kind of isolated runtime.
pub trait Runtime: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Write any files the runtime needs before its construction commands run.
    fn prepare(&self, _workspace: &Path) -> io::Result<()> {
        Ok(())
    }

    /// Commands that construct the runtime instance inside `workspace`.
    fn create_commands(&self, workspace: &Path) -> Vec<CommandSpec>;

    /// Handle for the runtime instance inside `workspace`.
    fn handle(&self, workspace: &Path) -> RuntimeHandle;

    /// Check that construction produced a usable instance.
    fn verify(&self, _handle: &RuntimeHandle) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Command upgrading the runtime's package tool, if the runtime has one to upgrade.
    fn upgrade_command(&self, handle: &RuntimeHandle) -> Option<CommandSpec>;

    /// Command installing `deps` in order. `None` when `deps` is empty.
    fn install_command(&self, handle: &RuntimeHandle, deps: &[String]) -> Option<CommandSpec>;

    /// Command running `script` (a filename inside the workspace).
    fn run_command(&self, handle: &RuntimeHandle, script: &str) -> CommandSpec;
}

/// Build the runtime for a provider kind from settings.
pub fn for_kind(kind: ProviderKind, settings: &Settings) -> Result<Box<dyn Runtime>> {
    match kind {
        ProviderKind::Python => {
            let interpreter = shell_words::split(&settings.python_interpreter).map_err(|e| {
                RunError::UserError(format!(
                    "failed to parse settings.python_interpreter '{}': {}",
                    settings.python_interpreter, e
                ))
            })?;
            if interpreter.is_empty() {
                return Err(RunError::UserError(
                    "settings.python_interpreter is empty".to_string(),
                ));
            }
            Ok(Box::new(PythonVenv::new(interpreter)))
        }
        ProviderKind::Node => Ok(Box::new(NodePrefix::new(
            settings.node_binary.clone(),
            settings.npm_binary.clone(),
        ))),
    }
}
