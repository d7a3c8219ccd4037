//! Rule registry: rule name → factory.
//!
//! # Responsibilities
//! - Map rule names to factories, last registration wins
//! - Seed the built-in rules exactly once per registry
//! - Resolve `name` / `name=param` expressions into rule instances
//!
//! # Design Decisions
//! - Registries are explicit values; [`RuleRegistry::global`] is an opt-in
//!   process-lifetime instance shared by the default loader
//! - Factories run outside the registry lock, so a factory may itself
//!   consult the registry

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Once, OnceLock, PoisonError, RwLock};

use super::builtin;
use super::Rule;
use crate::error::Violation;

/// Builds a rule from the text after `=` (empty when there is none).
pub type RuleFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Rule>, Violation> + Send + Sync>;

/// Thread-safe mapping from rule name to [`RuleFactory`].
pub struct RuleRegistry {
    factories: RwLock<HashMap<String, RuleFactory>>,
    seeded: Once,
}

impl RuleRegistry {
    /// An empty registry. Built-ins are added by [`seed_builtins`](Self::seed_builtins).
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            seeded: Once::new(),
        }
    }

    /// A registry with the built-in rules already installed.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.seed_builtins();
        registry
    }

    /// The shared process-lifetime registry.
    pub fn global() -> Arc<RuleRegistry> {
        static GLOBAL: OnceLock<Arc<RuleRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(RuleRegistry::with_builtins()))
            .clone()
    }

    /// Install or replace the factory for `name`.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Rule>, Violation> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(rule = %name, "Registering validation rule");
        self.write().insert(name, Arc::new(factory));
    }

    /// Install `required`, `min`, `max`, `len`, `oneof` and `pattern`.
    ///
    /// Runs once per registry no matter how many callers race on it. A name
    /// the caller registered before seeding keeps the caller's factory.
    pub fn seed_builtins(&self) {
        self.seeded.call_once(|| {
            let builtins: [(&str, RuleFactory); 6] = [
                ("required", Arc::new(builtin::required) as RuleFactory),
                ("min", Arc::new(builtin::min) as RuleFactory),
                ("max", Arc::new(builtin::max) as RuleFactory),
                ("len", Arc::new(builtin::len) as RuleFactory),
                ("oneof", Arc::new(builtin::oneof) as RuleFactory),
                ("pattern", Arc::new(builtin::pattern) as RuleFactory),
            ];

            let mut factories = self.write();
            for (name, factory) in builtins {
                factories.entry(name.to_string()).or_insert(factory);
            }
        });
    }

    /// Build the rule for one expression such as `"required"` or `"min=5"`.
    ///
    /// # Errors
    ///
    /// [`Violation::UnknownRule`] when the name is not registered,
    /// [`Violation::InvalidParameter`] when the factory rejects the parameter.
    pub fn resolve(&self, expression: &str) -> Result<Box<dyn Rule>, Violation> {
        let (name, param) = match expression.split_once('=') {
            Some((name, param)) => (name.trim(), param.trim()),
            None => (expression.trim(), ""),
        };

        let factory = self
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Violation::UnknownRule {
                name: name.to_string(),
            })?;

        factory(param).map_err(|err| match err {
            err @ Violation::InvalidParameter { .. } => err,
            other => Violation::invalid_parameter(name, param, other),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Registered rule names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, RuleFactory>> {
        self.factories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, RuleFactory>> {
        self.factories.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.names())
            .finish()
    }
}

/// Register a rule in the shared [`RuleRegistry::global`] instance.
pub fn register_rule<F>(name: impl Into<String>, factory: F)
where
    F: Fn(&str) -> Result<Box<dyn Rule>, Violation> + Send + Sync + 'static,
{
    RuleRegistry::global().register(name, factory)
}
