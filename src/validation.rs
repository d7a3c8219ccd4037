//! Rule-driven record validation.
//!
//! # Responsibilities
//! - Walk a record's fields in declaration order
//! - Resolve and run every rule expression attached to a field
//! - Descend into nested records, optional values, collections and references
//! - Aggregate every failure into one [`ValidationErrors`]
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Records nested by value are always descended; references are descended
//!   once per identity, which terminates on cyclic graphs
//! - Field paths are dotted (`server.tls.cert`) with `[i]` / `[key]` for
//!   collection items

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{ConfigError, ValidationError, ValidationErrors};
use crate::record::{FieldDescriptor, FieldValue, Inspect, Record};
use crate::rules::RuleRegistry;

/// Validates records against the rules of a [`RuleRegistry`].
#[derive(Debug, Clone)]
pub struct Validator {
    registry: Arc<RuleRegistry>,
}

impl Validator {
    /// A validator backed by the shared global registry.
    pub fn new() -> Self {
        Self::with_registry(RuleRegistry::global())
    }

    pub fn with_registry(registry: Arc<RuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Validate `target`, which must be a record or a reference to one.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidArgument`] if `target` is not a record
    /// - [`ConfigError::Validation`] with every failure found at any depth
    pub fn validate(&self, target: &dyn Inspect) -> Result<(), ConfigError> {
        self.registry.seed_builtins();

        let mut walk = Walk {
            registry: &self.registry,
            visited: HashSet::new(),
            errors: Vec::new(),
        };

        let root = target.inspect();
        match root.present() {
            Some(FieldValue::Record(record)) => {
                walk.visited.insert(address_of(*record));
                walk.record(*record, "");
            }
            Some(FieldValue::Reference(reference)) => {
                walk.visited.insert(reference.identity());
                reference
                    .target()
                    .with_record(&mut |record| walk.record(record, ""));
            }
            Some(other) => {
                return Err(ConfigError::InvalidArgument(format!(
                    "expected a record to validate, got {}",
                    other.kind()
                )))
            }
            None => {
                return Err(ConfigError::InvalidArgument(
                    "expected a record to validate, got None".to_string(),
                ))
            }
        }

        match ValidationErrors::from_vec(walk.errors) {
            None => Ok(()),
            Some(errors) => Err(ConfigError::Validation(errors)),
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate `target` with the shared global registry.
pub fn validate(target: &dyn Inspect) -> Result<(), ConfigError> {
    Validator::new().validate(target)
}

/// State of one validation pass.
struct Walk<'r> {
    registry: &'r RuleRegistry,
    visited: HashSet<usize>,
    errors: Vec<ValidationError>,
}

impl Walk<'_> {
    fn record(&mut self, record: &dyn Record, prefix: &str) {
        for field in record.fields() {
            let path = join(prefix, field.name);
            self.apply_rules(&field, &path);
            self.descend(&field.value, &path);
        }
    }

    fn apply_rules(&mut self, field: &FieldDescriptor<'_>, path: &str) {
        for expression in field.expressions() {
            let outcome = self
                .registry
                .resolve(expression)
                .and_then(|rule| rule.validate(field));

            if let Err(violation) = outcome {
                self.errors.push(ValidationError::new(path, violation));
            }
        }
    }

    fn descend(&mut self, value: &FieldValue<'_>, path: &str) {
        match value {
            FieldValue::Record(record) => self.record(*record, path),
            FieldValue::Reference(reference) => {
                if self.visited.insert(reference.identity()) {
                    reference
                        .target()
                        .with_record(&mut |record| self.record(record, path));
                }
            }
            FieldValue::Optional(Some(inner)) => self.descend(inner, path),
            FieldValue::Sequence(items) => items.for_each_item(&mut |i, item| {
                self.descend(&item.inspect(), &format!("{path}[{i}]"));
            }),
            FieldValue::Mapping(entries) => entries.for_each_entry(&mut |key, value| {
                self.descend(&value.inspect(), &format!("{path}[{key}]"));
            }),
            _ => {}
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn address_of(record: &dyn Record) -> usize {
    record as *const dyn Record as *const () as usize
}
