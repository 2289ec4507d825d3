//! Configuration types for fragments

use crate::flavor::{FlavorSpec, FlavorTable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentsConfig {
    /// Cluster configuration
    pub cluster: ClusterConfig,
    /// Packer configuration
    pub packer: PackerConfig,
    /// Extra flavors overlaid on the built-in table, keyed by flavor id
    pub flavors: BTreeMap<String, FlavorSpec>,
}

impl FragmentsConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::FragmentsError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::FragmentsError::Config(format!("Failed to read config file: {}", e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, crate::FragmentsError> {
        toml::from_str(content)
            .map_err(|e| crate::FragmentsError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Flavor table with the configured extras applied
    pub fn flavor_table(&self) -> FlavorTable {
        FlavorTable::with_overrides(&self.flavors)
    }
}

/// Cluster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Base name for machine names (`<name>-<ordinal>`)
    pub name: String,
    /// Packing strategy to use
    pub packer: String,
    /// Domain used for machine FQDNs
    pub domain_name: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: "fragments".to_string(),
            packer: "modular".to_string(),
            domain_name: "local".to_string(),
        }
    }
}

/// Packer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackerConfig {
    /// Flavor for fragments that do not pin one
    pub default_flavor: String,
    /// Emit a debug event for every filter application and placement
    pub enable_debugging: bool,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            default_flavor: "2".to_string(),
            enable_debugging: false,
        }
    }
}
