//! Validation rules and the registry that constructs them.
//!
//! # Data Flow
//! ```text
//! field tag "required,min=1,max=65535"
//!     → split on ','                      (validation.rs)
//!     → RuleRegistry::resolve("min=1")    (registry.rs)
//!         → name "min", param "1"
//!         → factory("1") → Box<dyn Rule>  (builtin.rs or user factory)
//!     → rule.validate(field)              → Ok / Violation
//! ```
//!
//! # Design Decisions
//! - Rules are constructed per field occurrence and hold only their parameters
//! - Factories reject malformed parameters up front (`InvalidParameter`)
//! - Applying a rule to a kind it does not understand is a violation, never a panic

pub mod builtin;
pub mod registry;

use std::fmt;

use crate::error::Violation;
use crate::record::FieldDescriptor;

pub use registry::{register_rule, RuleFactory, RuleRegistry};

/// A named, parameterized predicate over one field.
pub trait Rule: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Check the field's current value.
    fn validate(&self, field: &FieldDescriptor<'_>) -> Result<(), Violation>;
}
