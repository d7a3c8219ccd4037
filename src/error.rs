//! Error types for loading, validating and watching configuration.
//!
//! # Design Decisions
//! - IO and parse failures abort a load immediately
//! - Validation failures are collected exhaustively into [`ValidationErrors`]
//! - Rule-level failures are a closed enum so callers can match on the kind

use std::fmt;
use std::path::PathBuf;

use crate::format::Format;
use crate::record::ValueKind;

/// Top-level error returned by the loader, validator and watcher.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is malformed for its format.
    #[error("failed to parse {format} config: {source}")]
    Parse {
        format: Format,
        #[source]
        source: ParseError,
    },

    /// Caller misuse, e.g. validating a value that is not a record.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// One or more fields violate their rules.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// The change-notification backend refused the watch.
    #[error("failed to watch {}: {source}", .path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

impl ConfigError {
    /// The validation failures, if this is a validation error.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            ConfigError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Document decoding failure, per format.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Why a single rule rejected a field (or could not be applied to it).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("field is required")]
    MissingRequiredValue,

    #[error("value {value} is below minimum {min}")]
    BelowMinimum { value: f64, min: f64 },

    #[error("value {value} is above maximum {max}")]
    AboveMaximum { value: f64, max: f64 },

    #[error("length {actual} != {expected}")]
    LengthMismatch { actual: usize, expected: usize },

    #[error("value {value:?} does not match any of the options: {options:?}")]
    NotInAllowedSet { value: String, options: Vec<String> },

    #[error("value {value:?} does not match pattern {pattern:?}")]
    PatternMismatch { value: String, pattern: String },

    #[error("{rule} rule is not supported for {kind}")]
    UnsupportedKind { rule: String, kind: ValueKind },

    #[error("unknown validation rule {name:?}")]
    UnknownRule { name: String },

    #[error("invalid {rule} parameter {param:?}: {reason}")]
    InvalidParameter {
        rule: String,
        param: String,
        reason: String,
    },

    /// Free-form failure reported by a user-registered rule.
    #[error("{0}")]
    Custom(String),
}

impl Violation {
    /// Shorthand used by rule factories.
    pub fn invalid_parameter(
        rule: impl Into<String>,
        param: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Violation::InvalidParameter {
            rule: rule.into(),
            param: param.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unsupported(rule: impl Into<String>, kind: ValueKind) -> Self {
        Violation::UnsupportedKind {
            rule: rule.into(),
            kind,
        }
    }
}

/// A rule failure attached to the field it was raised on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("validation failed on {field:?}: {violation}")]
pub struct ValidationError {
    /// Dotted path of the field, e.g. `server.port` or `backends[0].name`.
    pub field: String,
    pub violation: Violation,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, violation: Violation) -> Self {
        Self {
            field: field.into(),
            violation,
        }
    }

    pub fn message(&self) -> String {
        self.violation.to_string()
    }
}

/// Every failure found in one validation pass, in traversal order.
///
/// Never empty: a pass without failures yields `Ok(())` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Wrap a list of failures, or `None` if there are none.
    pub fn from_vec(errors: Vec<ValidationError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Failures raised on exactly this field path.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.0.iter().filter(move |e| e.field == field)
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
