use crate::context::BaseLayout;
use crate::declaration::{ProviderSpec, Settings};
use crate::events::{Event, EventAction, Reporter};
use crate::runtime::{CommandSpec, Runtime, RuntimeHandle};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

/// Reporter that keeps every event in memory.
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn actions(&self) -> Vec<EventAction> {
        self.events().iter().map(|e| e.action).collect()
    }

    pub(crate) fn count(&self, action: EventAction) -> usize {
        self.events().iter().filter(|e| e.action == action).count()
    }

    pub(crate) fn for_provider(&self, name: &str) -> Vec<EventAction> {
        self.events()
            .iter()
            .filter(|e| e.provider.as_deref() == Some(name))
            .map(|e| e.action)
            .collect()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

/// `sh`-driven runtime for tests.
///
/// - the package-tool upgrade appends `upgrade` to `installed.txt`, or exits
///   5 when `fail_upgrade` is set
/// - each dependency is appended to `installed.txt` in order; a dependency
///   starting with `fail` makes the install exit 7
/// - scripts run with `sh <script>`
#[derive(Default)]
pub(crate) struct ShellRuntime {
    /// Make runtime construction fail.
    pub(crate) broken: bool,
    /// Make the package-tool upgrade fail.
    pub(crate) fail_upgrade: bool,
}

impl Runtime for ShellRuntime {
    fn label(&self) -> &'static str {
        "sh"
    }

    fn create_commands(&self, _workspace: &Path) -> Vec<CommandSpec> {
        if self.broken {
            vec![CommandSpec::new("sh").args(["-c", "echo 'toolchain missing' >&2; exit 127"])]
        } else {
            vec![CommandSpec::new("sh").args(["-c", "mkdir -p shenv"])]
        }
    }

    fn handle(&self, workspace: &Path) -> RuntimeHandle {
        RuntimeHandle {
            workspace: workspace.to_path_buf(),
            root: workspace.join("shenv"),
            interpreter: "sh".into(),
        }
    }

    fn upgrade_command(&self, _handle: &RuntimeHandle) -> Option<CommandSpec> {
        let script = if self.fail_upgrade {
            "echo 'package tool is broken' >&2; exit 5"
        } else {
            "echo upgrade >> installed.txt"
        };
        Some(CommandSpec::new("sh").args(["-c", script]))
    }

    fn install_command(&self, _handle: &RuntimeHandle, deps: &[String]) -> Option<CommandSpec> {
        if deps.is_empty() {
            return None;
        }
        let script = r#"for d in "$@"; do
  case "$d" in fail*) echo "cannot install $d" >&2; exit 7;; esac
  echo "$d" >> installed.txt
done"#;
        Some(
            CommandSpec::new("sh")
                .args(["-c", script, "install"])
                .args(deps),
        )
    }

    fn run_command(&self, _handle: &RuntimeHandle, script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg(script)
    }
}

/// Temporary base directory with the default layout and a scripts directory.
pub(crate) fn create_test_base() -> (TempDir, BaseLayout) {
    let temp_dir = TempDir::new().unwrap();
    let layout = BaseLayout::new(temp_dir.path(), &Settings::default());
    std::fs::create_dir_all(&layout.scripts_dir).unwrap();
    (temp_dir, layout)
}

/// Write a provider script into the layout's scripts directory.
pub(crate) fn write_script(layout: &BaseLayout, name: &str, body: &str) {
    std::fs::write(layout.script_path(name), body).unwrap();
}

/// Minimal enabled provider.
pub(crate) fn provider(name: &str, script: &str, output: &str) -> ProviderSpec {
    ProviderSpec {
        name: name.to_string(),
        script: script.to_string(),
        requirements: Vec::new(),
        config: Default::default(),
        output: output.to_string(),
        url: None,
        enable: true,
        timeout_seconds: None,
        extra: BTreeMap::new(),
    }
}
