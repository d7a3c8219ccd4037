//! Document formats understood by the loader.
//!
//! The format layer only turns bytes into a deserialized record; it knows
//! nothing about rules. Semantic checks live in `validation.rs`.

use std::fmt;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::ParseError;

/// Serialization format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Toml,
    Json,
    Yaml,
}

impl Format {
    /// Pick a format from the file extension. Unknown or missing extensions
    /// fall back to TOML.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => Format::Json,
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Toml,
        }
    }

    /// Deserialize a document into a fresh `T`.
    pub fn parse<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, ParseError> {
        match self {
            Format::Toml => {
                let text = std::str::from_utf8(bytes)?;
                Ok(toml::from_str(text)?)
            }
            Format::Json => Ok(serde_json::from_slice(bytes)?),
            Format::Yaml => Ok(serde_yaml::from_slice(bytes)?),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Toml => "TOML",
            Format::Json => "JSON",
            Format::Yaml => "YAML",
        };
        f.write_str(name)
    }
}
