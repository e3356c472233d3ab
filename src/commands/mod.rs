//! Command implementations for provrun.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the per-invocation state every command starts from.

mod list;
mod merge;
mod run;

use crate::cli::{Cli, Command};
use crate::context::{BaseLayout, resolve_base_dir, resolve_declarations_path};
use crate::declaration::{Declarations, ProviderKind};
use crate::error::Result;
use crate::events::EventJournal;
use std::path::PathBuf;

/// Everything a command needs, resolved from global flags.
pub struct Invocation {
    pub layout: BaseLayout,
    pub declarations: Declarations,
    pub reporter: EventJournal,
}

impl Invocation {
    /// Resolve the base directory, load and validate declarations, and set up
    /// the event journal.
    pub fn open(cli: &Cli) -> Result<Self> {
        let base_dir = resolve_base_dir(cli.base_dir.as_deref())?;
        let declarations_path = resolve_declarations_path(&base_dir, cli.declarations.as_deref());
        let declarations = Declarations::load(&declarations_path)?;

        let journal: Option<PathBuf> = cli
            .journal
            .clone()
            .or_else(|| declarations.settings.journal.as_ref().map(PathBuf::from))
            .map(|path| base_dir.join(path));
        let reporter = match journal {
            Some(path) => EventJournal::with_journal(path),
            None => EventJournal::tracing_only(),
        };

        let layout = BaseLayout::new(&base_dir, &declarations.settings);

        Ok(Self {
            layout,
            declarations,
            reporter,
        })
    }
}

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let invocation = Invocation::open(&cli)?;

    match cli.command {
        Command::PythonProviders(args) => run::cmd_run(&invocation, ProviderKind::Python, args),
        Command::NodeProviders(args) => run::cmd_run(&invocation, ProviderKind::Node, args),
        Command::Merge => merge::cmd_merge(&invocation),
        Command::List(args) => list::cmd_list(&invocation, args),
    }
}
