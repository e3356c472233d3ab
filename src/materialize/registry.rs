//! Extension-to-encoder registry for config payloads.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Encodes a structured payload into file content.
pub type Encoder = fn(&Value) -> Result<String, String>;

/// A serialization format a config file can be written in.
#[derive(Debug, Clone, Copy)]
pub struct ConfigFormat {
    /// Short format name (`json`, `yaml`, `toml`).
    pub tag: &'static str,
    pub encode: Encoder,
}

/// Maps lowercase file extensions (without the dot) to formats.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, ConfigFormat>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtin_formats()
    }
}

impl FormatRegistry {
    /// A registry with no formats.
    pub fn empty() -> Self {
        Self {
            formats: HashMap::new(),
        }
    }

    /// JSON, YAML and TOML.
    pub fn with_builtin_formats() -> Self {
        let mut registry = Self::empty();
        registry.register(&["json"], JSON);
        registry.register(&["yaml", "yml"], YAML);
        registry.register(&["toml"], TOML);
        registry
    }

    /// Register `format` under each extension, replacing earlier registrations.
    pub fn register(&mut self, extensions: &[&str], format: ConfigFormat) {
        for ext in extensions {
            self.formats
                .insert(ext.trim_start_matches('.').to_lowercase(), format);
        }
    }

    /// Format for a filename, chosen by its extension (case-insensitive).
    pub fn lookup(&self, filename: &str) -> Option<&ConfigFormat> {
        let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
        self.formats.get(&ext)
    }
}

pub const JSON: ConfigFormat = ConfigFormat {
    tag: "json",
    encode: encode_json,
};

pub const YAML: ConfigFormat = ConfigFormat {
    tag: "yaml",
    encode: encode_yaml,
};

pub const TOML: ConfigFormat = ConfigFormat {
    tag: "toml",
    encode: encode_toml,
};

/// Pretty JSON with four-space indentation and a trailing newline.
fn encode_json(value: &Value) -> Result<String, String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| e.to_string())?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| e.to_string())
}

fn encode_yaml(value: &Value) -> Result<String, String> {
    serde_yaml::to_string(value).map_err(|e| e.to_string())
}

/// TOML documents must be tables; `null` has no TOML representation.
fn encode_toml(value: &Value) -> Result<String, String> {
    if !value.is_object() {
        return Err("TOML documents must be tables".to_string());
    }
    toml::to_string(value).map_err(|e| e.to_string())
}
