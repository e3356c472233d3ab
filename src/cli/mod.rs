//! CLI argument parsing for provrun.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Provrun: run declared provider scripts in isolated environments and
/// collect their outputs.
///
/// Everything lives under one base directory:
/// - declarations in `config.json`
/// - provider scripts in `scripts/provider/`
/// - per-run workspaces in `temp/<run_id>/`
/// - collected and merged outputs in `config/`
#[derive(Parser, Debug)]
#[command(name = "provrun")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Base directory (defaults to the current directory).
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Declaration file (defaults to `<base>/config.json`).
    #[arg(long, global = true)]
    pub declarations: Option<PathBuf>,

    /// Log format: text or json.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: String,

    /// Append events as NDJSON to this file (relative to the base directory).
    #[arg(long, global = true)]
    pub journal: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for provrun.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the declared Python providers.
    ///
    /// Each provider gets a private virtualenv, its requirements, its config
    /// files, and one execution of its script. The output is collected into
    /// the shared output directory as `<name><ext>`.
    PythonProviders(RunArgs),

    /// Run the declared Node providers.
    ///
    /// Like `python-providers`, with a private `node_modules` prefix per
    /// provider.
    NodeProviders(RunArgs),

    /// Merge collected outputs according to the `merge` mapping.
    Merge,

    /// List declared providers and whether they would run.
    List(ListArgs),
}

/// Arguments for the provider run commands.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Run disabled providers too.
    #[arg(long)]
    pub force: bool,

    /// Only run the named provider (repeatable).
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Number of providers to run concurrently (overrides settings.parallelism).
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Workspace cleanup policy: retain, delete-on-success, or always.
    #[arg(long)]
    pub cleanup: Option<String>,
}

/// Arguments for the `list` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only list providers of this kind: python or node.
    #[arg(long)]
    pub kind: Option<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
