//! Configuration loading from disk.
//!
//! # Data Flow
//! ```text
//! path → fs::read        (ConfigError::Io)
//!      → Format::parse   (ConfigError::Parse, no validation attempted)
//!      → Validator       (ConfigError::Validation)
//!      → T
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::ConfigError;
use crate::format::Format;
use crate::record::Inspect;
use crate::rules::RuleRegistry;
use crate::validation::Validator;

/// Reads, parses and validates config files.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    validator: Validator,
    format: Option<Format>,
}

impl Loader {
    /// A loader using the shared global rule registry and inferring the
    /// format from each file's extension.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<RuleRegistry>) -> Self {
        Self {
            validator: Validator::with_registry(registry),
            format: None,
        }
    }

    /// Always parse as `format`, regardless of file extension.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Load and validate the config file at `path`.
    pub fn load<T>(&self, path: &Path) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Inspect,
    {
        tracing::debug!(path = %path.display(), "Loading config file");

        let bytes = fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let format = self.format.unwrap_or_else(|| Format::from_path(path));

        let config = self.decode(&bytes, format)?;
        tracing::info!(path = %path.display(), format = %format, "Config loaded");
        Ok(config)
    }

    /// Load `path` into `target`. On any failure `target` is left untouched.
    pub fn load_into<T>(&self, target: &mut T, path: &Path) -> Result<(), ConfigError>
    where
        T: DeserializeOwned + Inspect,
    {
        *target = self.load(path)?;
        Ok(())
    }

    /// Parse and validate a document held in memory.
    pub fn load_str<T>(&self, text: &str, format: Format) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Inspect,
    {
        self.decode(text.as_bytes(), format)
    }

    fn decode<T>(&self, bytes: &[u8], format: Format) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Inspect,
    {
        let config: T = format
            .parse(bytes)
            .map_err(|source| ConfigError::Parse { format, source })?;

        if let Err(err) = self.validator.validate(&config) {
            if let Some(errors) = err.validation_errors() {
                tracing::warn!(errors = errors.len(), "Config rejected by validation");
            }
            return Err(err);
        }
        Ok(config)
    }
}

/// Load and validate `path` with a default [`Loader`].
pub fn load<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Inspect,
{
    Loader::new().load(path.as_ref())
}

/// Load `path` into `target` with a default [`Loader`].
pub fn load_into<T>(target: &mut T, path: impl AsRef<Path>) -> Result<(), ConfigError>
where
    T: DeserializeOwned + Inspect,
{
    Loader::new().load_into(target, path.as_ref())
}
