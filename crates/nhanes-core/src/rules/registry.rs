//! Rule code registry.
//!
//! Rules are registered as modules, each exporting factories under named
//! entry points. Lookup mirrors how rule code is referenced from the
//! catalog: module name equals the rule name, and the entry point is a
//! fixed export name (`rule` by default).

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use super::builtin;
use super::contract::Transformation;
use crate::error::LoadError;

/// Builds a fresh rule instance.
pub type RuleFactory = fn() -> Arc<dyn Transformation>;

#[derive(Default)]
struct RuleModule {
    exports: BTreeMap<String, RuleFactory>,
}

/// Registry of rule modules indexed by module name.
///
/// Lookup is exact (rule names are case sensitive).
#[derive(Default)]
pub struct RuleRegistry {
    modules: BTreeMap<String, RuleModule>,
}

impl RuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` as `entry_point` of `module`, replacing any
    /// previous export with the same name.
    pub fn register(&mut self, module: &str, entry_point: &str, factory: RuleFactory) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .exports
            .insert(entry_point.to_string(), factory);
    }

    /// Registers a module with only the default `rule` entry point.
    pub fn register_rule(&mut self, module: &str, factory: RuleFactory) {
        self.register(module, "rule", factory);
    }

    /// Resolves and instantiates a rule.
    pub fn resolve(
        &self,
        module: &str,
        entry_point: &str,
    ) -> Result<Arc<dyn Transformation>, LoadError> {
        let found = self
            .modules
            .get(module)
            .ok_or_else(|| LoadError::ModuleNotFound {
                module: module.to_string(),
            })?;
        let factory = found
            .exports
            .get(entry_point)
            .ok_or_else(|| LoadError::ClassNotFound {
                module: module.to_string(),
                entry_point: entry_point.to_string(),
            })?;
        Ok(factory())
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Registered module names, sorted.
    pub fn modules(&self) -> impl Iterator<Item = &str> + '_ {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

static BUILTIN_REGISTRY: OnceLock<RuleRegistry> = OnceLock::new();

/// Returns the registry of rules shipped with the crate.
///
/// The registry is cached on first access.
pub fn builtin_registry() -> &'static RuleRegistry {
    BUILTIN_REGISTRY.get_or_init(build_builtin_registry)
}

/// Builds a registry containing the shipped rules.
pub fn build_builtin_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.register_rule("double_age", builtin::double_age::factory);
    registry.register_rule("copy_variable", builtin::copy_variable::factory);
    registry.register_rule("pd_by_drug", builtin::pd_by_drug::factory);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_shipped_rules() {
        let registry = builtin_registry();
        let modules: Vec<_> = registry.modules().collect();
        assert_eq!(modules, vec!["copy_variable", "double_age", "pd_by_drug"]);
        assert!(registry.resolve("double_age", "rule").is_ok());
    }

    #[test]
    fn unknown_module_and_entry_point_are_distinct_errors() {
        let registry = builtin_registry();
        assert!(matches!(
            registry.resolve("nope", "rule"),
            Err(LoadError::ModuleNotFound { .. })
        ));
        assert!(matches!(
            registry.resolve("double_age", "Rule"),
            Err(LoadError::ClassNotFound { .. })
        ));
    }
}
