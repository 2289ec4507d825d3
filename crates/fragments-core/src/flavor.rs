//! Machine size classes

use crate::{FragmentsError, FragmentsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A machine size class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flavor {
    /// Flavor identifier (e.g., "2")
    pub id: String,
    /// Display name (e.g., "m1.small")
    pub name: String,
    /// Memory capacity in MB
    pub memory_mb: u64,
    /// Number of virtual CPUs
    pub cpus: u32,
}

/// Flavor overlay as written in configuration, keyed by flavor id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlavorSpec {
    pub name: String,
    pub memory_mb: u64,
    pub cpus: u32,
}

/// Lookup table from flavor id to [`Flavor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlavorTable {
    flavors: BTreeMap<String, Flavor>,
}

const BUILTIN_FLAVORS: [(&str, &str, u64, u32); 5] = [
    ("1", "m1.tiny", 512, 1),
    ("2", "m1.small", 2048, 1),
    ("3", "m1.medium", 4096, 2),
    ("4", "m1.large", 8192, 4),
    ("5", "m1.xlarge", 16_384, 8),
];

impl FlavorTable {
    /// The five built-in flavors
    pub fn builtin() -> Self {
        let flavors = BUILTIN_FLAVORS
            .iter()
            .map(|(id, name, memory_mb, cpus)| {
                (
                    id.to_string(),
                    Flavor {
                        id: id.to_string(),
                        name: name.to_string(),
                        memory_mb: *memory_mb,
                        cpus: *cpus,
                    },
                )
            })
            .collect();
        Self { flavors }
    }

    /// Built-in flavors overlaid with configured extras. Extras replace
    /// built-ins that share an id.
    pub fn with_overrides(extra: &BTreeMap<String, FlavorSpec>) -> Self {
        let mut table = Self::builtin();
        for (id, spec) in extra {
            table.insert(Flavor {
                id: id.clone(),
                name: spec.name.clone(),
                memory_mb: spec.memory_mb,
                cpus: spec.cpus,
            });
        }
        table
    }

    pub fn insert(&mut self, flavor: Flavor) {
        self.flavors.insert(flavor.id.clone(), flavor);
    }

    /// Resolve a flavor id, failing on ids the table does not know
    pub fn resolve(&self, id: &str) -> FragmentsResult<&Flavor> {
        self.flavors
            .get(id)
            .ok_or_else(|| FragmentsError::UnknownFlavor(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.flavors.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flavor> {
        self.flavors.values()
    }
}

impl Default for FlavorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_flavors() {
        let table = FlavorTable::builtin();
        assert_eq!(table.iter().count(), 5);

        let tiny = table.resolve("1").unwrap();
        assert_eq!(tiny.name, "m1.tiny");
        assert_eq!(tiny.memory_mb, 512);
        assert_eq!(tiny.cpus, 1);

        let xlarge = table.resolve("5").unwrap();
        assert_eq!(xlarge.memory_mb, 16384);
        assert_eq!(xlarge.cpus, 8);
    }

    #[test]
    fn test_unknown_flavor() {
        let table = FlavorTable::builtin();
        let result = table.resolve("42");
        assert!(matches!(result, Err(FragmentsError::UnknownFlavor(id)) if id == "42"));
    }

    #[test]
    fn test_overrides_extend_and_replace() {
        let mut extra = BTreeMap::new();
        extra.insert(
            "6".to_string(),
            FlavorSpec {
                name: "m1.huge".to_string(),
                memory_mb: 32768,
                cpus: 16,
            },
        );
        extra.insert(
            "2".to_string(),
            FlavorSpec {
                name: "m1.small-plus".to_string(),
                memory_mb: 3072,
                cpus: 2,
            },
        );

        let table = FlavorTable::with_overrides(&extra);
        assert_eq!(table.resolve("6").unwrap().memory_mb, 32768);
        assert_eq!(table.resolve("2").unwrap().name, "m1.small-plus");
        assert_eq!(table.resolve("1").unwrap().name, "m1.tiny");
    }
}
