//! Implementation of `provrun list`.
//!
//! Shows each declared provider, whether a plain run would select it, its
//! script availability, and the filename its output is collected under.

use super::Invocation;
use crate::cli::ListArgs;
use crate::context::BaseLayout;
use crate::declaration::{Declarations, ProviderKind, ProviderSpec};
use crate::error::{Result, RunError};

pub fn cmd_list(invocation: &Invocation, args: ListArgs) -> Result<()> {
    let kinds = match args.kind.as_deref() {
        None => vec![ProviderKind::Python, ProviderKind::Node],
        Some("python") => vec![ProviderKind::Python],
        Some("node") => vec![ProviderKind::Node],
        Some(other) => {
            return Err(RunError::UserError(format!(
                "unknown provider kind '{}' (expected python or node)",
                other
            )));
        }
    };

    for line in render(&invocation.layout, &invocation.declarations, &kinds) {
        println!("{}", line);
    }
    Ok(())
}

fn render(layout: &BaseLayout, declarations: &Declarations, kinds: &[ProviderKind]) -> Vec<String> {
    let mut lines = Vec::new();

    for kind in kinds {
        let providers = declarations.providers(*kind);
        lines.push(format!("{} ({})", kind, providers.len()));
        for provider in providers {
            lines.push(row(layout, provider));
        }
    }

    if !declarations.merge.is_empty() {
        lines.push(format!("merge ({})", declarations.merge.len()));
        for (output, inputs) in &declarations.merge {
            lines.push(format!("  {:<24} <- {}", output, inputs.join(", ")));
        }
    }

    lines
}

fn row(layout: &BaseLayout, provider: &ProviderSpec) -> String {
    let status = if provider.enable { "enabled" } else { "disabled" };
    let script = if layout.script_path(&provider.script).is_file() {
        provider.script.clone()
    } else {
        format!("{} (missing)", provider.script)
    };
    format!(
        "  {:<24} {:<8} {:<24} -> {}",
        provider.name,
        status,
        script,
        provider.collected_filename()
    )
}
