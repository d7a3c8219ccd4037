//! Typed configuration loading with rule-based validation and hot reload.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON/YAML)
//!     → loader.rs (read & parse)
//!     → validation.rs (rule checks from #[validate("...")] tags)
//!     → T (validated, immutable)
//!
//! On change (watcher.rs):
//!     notify event → debounce → loader.rs → validation.rs
//!     → atomic swap of Arc<T> → on_change callback
//! ```
//!
//! # Example
//! ```rust,no_run
//! use ruleconf::Record;
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize, Record)]
//! struct ServerConfig {
//!     #[validate("required,min=1,max=65535")]
//!     port: u16,
//!     #[validate("oneof=dev|prod|test")]
//!     env: String,
//! }
//!
//! let config: ServerConfig = ruleconf::load("config.toml")?;
//! println!("listening on {}", config.port);
//! # Ok::<(), ruleconf::ConfigError>(())
//! ```

// Lets `#[derive(Record)]` expand to `::ruleconf::...` inside this crate too.
extern crate self as ruleconf;

pub mod error;
pub mod format;
pub mod loader;
pub mod record;
pub mod rules;
pub mod validation;
pub mod watcher;

pub use error::{ConfigError, ParseError, ValidationError, ValidationErrors, Violation};
pub use format::Format;
pub use loader::{load, load_into, Loader};
pub use record::{
    FieldDescriptor, FieldValue, Inspect, MappingView, Record, Reference, Referent, SequenceView,
    ValueKind,
};
pub use rules::{register_rule, Rule, RuleFactory, RuleRegistry};
pub use validation::{validate, Validator};
pub use watcher::{watch, WatchOptions, Watcher, WatcherState};

/// `#[derive(Record)]` shares its name with the trait it implements.
pub use ruleconf_derive::Record;
