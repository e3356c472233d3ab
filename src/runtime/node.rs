//! Node runtime with a private `node_modules` prefix per workspace.
//!
//! The workspace gets its own `package.json`, so `npm install --prefix`
//! lands packages in `<workspace>/node_modules` and `require` from the copied
//! script resolves them there. The package tool is upgraded by installing a
//! current npm into that prefix; dependency installs then run with the
//! prefix's npm, leaving the toolchain's global npm untouched.

use super::{CommandSpec, Runtime, RuntimeHandle};
use std::io;
use std::path::{Path, PathBuf};

/// npm entry point inside a prefix, run with `node`.
const PREFIX_NPM_CLI: [&str; 4] = ["node_modules", "npm", "bin", "npm-cli.js"];

/// Flags shared by every npm install into the prefix. Packages are saved into
/// the throwaway workspace manifest so later installs do not prune them.
const INSTALL_FLAGS: [&str; 3] = ["install", "--no-audit", "--no-fund"];

/// Runs providers with `node` against a per-workspace prefix.
#[derive(Debug, Clone)]
pub struct NodePrefix {
    node: String,
    npm: String,
}

impl NodePrefix {
    pub fn new(node: String, npm: String) -> Self {
        Self { node, npm }
    }

    fn prefix_npm_cli(workspace: &Path) -> PathBuf {
        PREFIX_NPM_CLI
            .iter()
            .fold(workspace.to_path_buf(), |path, part| path.join(part))
    }
}

impl Runtime for NodePrefix {
    fn label(&self) -> &'static str {
        "node"
    }

    fn prepare(&self, workspace: &Path) -> io::Result<()> {
        let manifest = serde_json::json!({
            "name": "provrun-workspace",
            "private": true,
        });
        let content = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        crate::fs::atomic_write(workspace.join("package.json"), &content)
    }

    fn create_commands(&self, _workspace: &Path) -> Vec<CommandSpec> {
        // Fails fast when the toolchain is missing.
        vec![CommandSpec::new(&self.node).arg("--version")]
    }

    fn handle(&self, workspace: &Path) -> RuntimeHandle {
        RuntimeHandle {
            workspace: workspace.to_path_buf(),
            root: workspace.join("node_modules"),
            interpreter: self.node.clone().into(),
        }
    }

    fn upgrade_command(&self, handle: &RuntimeHandle) -> Option<CommandSpec> {
        Some(
            CommandSpec::new(&self.npm)
                .args(INSTALL_FLAGS)
                .arg("--prefix")
                .arg(&handle.workspace)
                .arg("npm"),
        )
    }

    fn install_command(&self, handle: &RuntimeHandle, deps: &[String]) -> Option<CommandSpec> {
        if deps.is_empty() {
            return None;
        }
        Some(
            CommandSpec::new(&self.node)
                .arg(Self::prefix_npm_cli(&handle.workspace))
                .args(INSTALL_FLAGS)
                .arg("--prefix")
                .arg(&handle.workspace)
                .args(deps),
        )
    }

    fn run_command(&self, _handle: &RuntimeHandle, script: &str) -> CommandSpec {
        CommandSpec::new(&self.node).arg(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn runtime() -> NodePrefix {
        NodePrefix::new("node".to_string(), "npm".to_string())
    }

    #[test]
    fn prepare_writes_private_manifest() {
        let temp_dir = TempDir::new().unwrap();
        runtime().prepare(temp_dir.path()).unwrap();

        let content = std::fs::read_to_string(temp_dir.path().join("package.json")).unwrap();
        let manifest: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(manifest["private"], true);
    }

    #[test]
    fn create_checks_toolchain() {
        let commands = runtime().create_commands(Path::new("/ws"));
        assert_eq!(commands, vec![CommandSpec::new("node").arg("--version")]);
    }

    #[test]
    fn upgrade_installs_npm_into_prefix() {
        let rt = runtime();
        let handle = rt.handle(Path::new("/ws"));

        let upgrade = rt.upgrade_command(&handle).unwrap();

        assert_eq!(upgrade.program, "npm");
        assert_eq!(upgrade.args[0], "install");
        assert!(upgrade.args.windows(2).any(|w| w == ["--prefix", "/ws"]));
        assert_eq!(upgrade.args.last().map(String::as_str), Some("npm"));
    }

    #[test]
    fn installs_into_workspace_prefix_with_prefix_npm() {
        let rt = runtime();
        let handle = rt.handle(Path::new("/ws"));
        assert_eq!(handle.root, PathBuf::from("/ws/node_modules"));

        let deps = vec!["cheerio".to_string(), "axios@1".to_string()];
        let install = rt.install_command(&handle, &deps).unwrap();
        assert_eq!(install.program, "node");
        assert_eq!(install.args[0], "/ws/node_modules/npm/bin/npm-cli.js");
        assert_eq!(install.args[1], "install");
        assert!(install.args.windows(2).any(|w| w == ["--prefix", "/ws"]));
        assert!(!install.args.contains(&"--no-save".to_string()));
        assert_eq!(install.args[install.args.len() - 2..], ["cheerio", "axios@1"]);
        assert!(rt.install_command(&handle, &[]).is_none());
    }

    #[test]
    fn runs_script_with_node() {
        let rt = runtime();
        let handle = rt.handle(Path::new("/ws"));
        assert_eq!(
            rt.run_command(&handle, "scrape.js"),
            CommandSpec::new("node").arg("scrape.js")
        );
    }
}
