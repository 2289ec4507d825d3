//! Named lookup of packing strategies

use crate::strategy::{ModularPacker, PackingStrategy, SimplePacker};
use fragments_core::{FragmentsError, FragmentsResult};
use std::collections::BTreeMap;
use std::fmt;

/// Builds a fresh strategy instance
pub type StrategyConstructor = Box<dyn Fn() -> Box<dyn PackingStrategy> + Send + Sync>;

/// Registry of packing strategies, passed explicitly to the packer
#[derive(Default)]
pub struct PackerRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl PackerRegistry {
    /// Registry with no strategies
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `modular` and `simple` strategies
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("modular", || Box::new(ModularPacker::default()));
        registry.register("simple", || Box::new(SimplePacker));
        registry
    }

    /// Register a strategy, replacing any previous one with the same name
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn PackingStrategy> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// Build the strategy registered under `name`
    pub fn create(&self, name: &str) -> FragmentsResult<Box<dyn PackingStrategy>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| FragmentsError::UnknownStrategy(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl fmt::Debug for PackerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackerRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterChain;

    #[test]
    fn test_default_strategies() {
        let registry = PackerRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["modular", "simple"]);
        assert_eq!(registry.create("modular").unwrap().name(), "modular");
        assert_eq!(registry.create("simple").unwrap().name(), "simple");
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = PackerRegistry::with_defaults();
        let result = registry.create("optimal");
        assert!(matches!(result, Err(FragmentsError::UnknownStrategy(name)) if name == "optimal"));
    }

    #[test]
    fn test_register_custom_chain() {
        let mut registry = PackerRegistry::new();
        assert!(!registry.contains("memory-only"));

        registry.register("memory-only", || {
            let mut chain = FilterChain::with_defaults();
            chain.remove("AvoidSameFragment");
            Box::new(ModularPacker::new(chain))
        });
        assert!(registry.contains("memory-only"));
        assert!(registry.create("memory-only").is_ok());
    }
}
