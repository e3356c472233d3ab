//! Declaration loading, validation, and provider selection.

use super::model::{Declarations, ProviderSpec};
use super::types::ProviderKind;
use crate::error::{Result, RunError};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Which providers a run should process.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Provider list to draw from.
    pub kind: ProviderKind,

    /// Run disabled providers too.
    pub force: bool,

    /// Restrict to these provider names (empty means all).
    pub only: Vec<String>,
}

impl Declarations {
    /// Load declarations from a JSON or YAML file.
    ///
    /// The format follows the extension: `.yaml`/`.yml` are parsed as YAML,
    /// everything else as JSON.
    ///
    /// # Returns
    ///
    /// * `Ok(Declarations)` - Successfully loaded and validated declarations
    /// * `Err(RunError::Declarations)` - Missing file, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RunError::Declarations(format!(
                "declaration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RunError::Declarations(format!(
                "failed to read declaration file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        }
    }

    /// Parse declarations from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let declarations: Declarations = serde_json::from_str(json).map_err(|e| {
            RunError::Declarations(format!("failed to parse declarations JSON: {}", e))
        })?;

        declarations.validate()?;
        Ok(declarations)
    }

    /// Parse declarations from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let declarations: Declarations = serde_yaml::from_str(yaml).map_err(|e| {
            RunError::Declarations(format!("failed to parse declarations YAML: {}", e))
        })?;

        declarations.validate()?;
        Ok(declarations)
    }

    /// Validate declared values.
    ///
    /// Validation rules:
    /// - provider `name`, `script` and `output` must be non-empty
    /// - provider names must be plain filenames and unique within a kind
    /// - `parallelism` and both timeouts must be positive
    /// - merge output filenames must be non-empty
    pub fn validate(&self) -> Result<()> {
        for kind in [ProviderKind::Python, ProviderKind::Node] {
            let mut seen = HashSet::new();
            for provider in self.providers(kind) {
                validate_provider(kind, provider)?;
                if !seen.insert(provider.name.as_str()) {
                    return Err(RunError::Declarations(format!(
                        "declaration validation failed: duplicate {} provider name '{}'",
                        kind, provider.name
                    )));
                }
            }
        }

        let settings = &self.settings;
        if settings.parallelism == 0 {
            return Err(RunError::Declarations(
                "declaration validation failed: settings.parallelism must be greater than 0"
                    .to_string(),
            ));
        }
        if settings.install_timeout_seconds == 0 || settings.execute_timeout_seconds == 0 {
            return Err(RunError::Declarations(
                "declaration validation failed: timeouts must be greater than 0".to_string(),
            ));
        }

        if self.merge.keys().any(|k| k.trim().is_empty()) {
            return Err(RunError::Declarations(
                "declaration validation failed: merge output filenames must be non-empty"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Providers declared for a runtime kind, in declaration order.
    pub fn providers(&self, kind: ProviderKind) -> &[ProviderSpec] {
        match kind {
            ProviderKind::Python => &self.python,
            ProviderKind::Node => &self.node,
        }
    }

    /// Split a kind's providers into the ones to run and the ones to skip.
    ///
    /// A provider runs when it is enabled or the selection forces it, and, if
    /// `only` is non-empty, its name is listed. Skipped providers carry the
    /// reason. Names in `only` that match no provider are a user error.
    pub fn select(
        &self,
        selection: &Selection,
    ) -> Result<(Vec<&ProviderSpec>, Vec<(&ProviderSpec, &'static str)>)> {
        let providers = self.providers(selection.kind);

        for name in &selection.only {
            if !providers.iter().any(|p| &p.name == name) {
                return Err(RunError::UserError(format!(
                    "no {} provider named '{}' is declared",
                    selection.kind, name
                )));
            }
        }

        let mut selected = Vec::new();
        let mut skipped = Vec::new();
        for provider in providers {
            if !selection.only.is_empty() && !selection.only.contains(&provider.name) {
                skipped.push((provider, "not requested"));
            } else if !provider.enable && !selection.force {
                skipped.push((provider, "disabled"));
            } else {
                selected.push(provider);
            }
        }

        Ok((selected, skipped))
    }
}

/// Collected filenames claimed by more than one provider, with their claimants.
pub fn output_collisions(providers: &[&ProviderSpec]) -> BTreeMap<String, Vec<String>> {
    let mut claims: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for provider in providers {
        claims
            .entry(provider.collected_filename())
            .or_default()
            .push(provider.name.clone());
    }
    claims.retain(|_, names| names.len() > 1);
    claims
}

fn validate_provider(kind: ProviderKind, provider: &ProviderSpec) -> Result<()> {
    let fail = |msg: String| {
        Err(RunError::Declarations(format!(
            "declaration validation failed: {} provider '{}': {}",
            kind, provider.name, msg
        )))
    };

    if provider.name.trim().is_empty() {
        return fail("name must be non-empty".to_string());
    }
    if provider.name.contains(['/', '\\']) || provider.name == "." || provider.name == ".." {
        return fail("name must be a plain filename stem".to_string());
    }
    if provider.script.trim().is_empty() {
        return fail("script must be non-empty".to_string());
    }
    if provider.output.trim().is_empty() {
        return fail("output must be non-empty".to_string());
    }
    if provider.timeout_seconds == Some(0) {
        return fail("timeout_seconds must be greater than 0".to_string());
    }

    Ok(())
}
