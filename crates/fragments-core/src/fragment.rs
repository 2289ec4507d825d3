//! Fragment type definitions
//!
//! A fragment is one unit of work together with the constraints that decide
//! which machine it may land on. Fragments are created once from declarative
//! input and never change afterwards.

use crate::record::{self, Record};
use crate::{FragmentsError, FragmentsResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Unordered set of opaque labels used by the placement filters
pub type TagSet = BTreeSet<String>;

/// Opaque string-keyed configuration payload
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Environment used when a fragment does not name one
pub const DEFAULT_ENVIRONMENT: &str = "_default";

/// One unit of work and its placement constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique name, used by other fragments to depend on this one
    pub name: String,
    /// Cookbook the fragment was declared in
    #[serde(default)]
    pub cookbook_name: Option<String>,
    /// Recipe the fragment was declared in
    #[serde(default)]
    pub recipe_name: Option<String>,
    /// Roles and recipes contributed to the hosting machine
    #[serde(default)]
    pub run_list: Vec<String>,
    /// Node attributes forwarded to provisioning
    #[serde(default)]
    pub attributes: Attributes,
    /// Memory cost in MB of one instance
    #[serde(default)]
    pub memory_weight: u64,
    /// Names of fragments that must exist alongside this one
    #[serde(default)]
    pub required_fragments: BTreeSet<String>,
    /// Apply to every machine instead of placing selectively
    #[serde(default)]
    pub every_node: bool,
    /// Number of instances to place (ignored for every-node fragments)
    #[serde(default = "default_cardinality")]
    pub cardinality: u32,
    /// Cookbook source overrides for the dependency manager
    #[serde(default)]
    pub berkshelf: Attributes,
    /// Extra hostnames to register for the hosting machine
    #[serde(default)]
    pub host_aliases: Vec<String>,
    /// Files to transfer after provisioning: local path -> remote path
    #[serde(default)]
    pub machine_files: BTreeMap<String, String>,
    /// Commands to run after provisioning
    #[serde(default)]
    pub machine_commands: Vec<String>,
    /// Driver-specific machine options
    #[serde(default)]
    pub machine_options: Attributes,
    /// Tags given to the hosting machine
    #[serde(default)]
    pub tags: TagSet,
    /// Tags the hosting machine must not carry
    #[serde(default)]
    pub avoid_tags: TagSet,
    /// Tags the packer should try to co-locate with
    #[serde(default)]
    pub group_with_tags: TagSet,
    /// Exclusive grouping tags, fixed by a machine's founding fragment
    #[serde(default)]
    pub only_group_with_tags: TagSet,
    /// Pinned flavor, or `None` for the configured default
    #[serde(default)]
    pub flavor_id: Option<String>,
    /// Deployment environment
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_cardinality() -> u32 {
    1
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

impl Fragment {
    /// Create a fragment with default values
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cookbook_name: None,
            recipe_name: None,
            run_list: Vec::new(),
            attributes: Attributes::new(),
            memory_weight: 0,
            required_fragments: BTreeSet::new(),
            every_node: false,
            cardinality: default_cardinality(),
            berkshelf: Attributes::new(),
            host_aliases: Vec::new(),
            machine_files: BTreeMap::new(),
            machine_commands: Vec::new(),
            machine_options: Attributes::new(),
            tags: TagSet::new(),
            avoid_tags: TagSet::new(),
            group_with_tags: TagSet::new(),
            only_group_with_tags: TagSet::new(),
            flavor_id: None,
            environment: default_environment(),
        }
    }

    /// Check the record invariants
    pub fn validate(&self) -> FragmentsResult<()> {
        if self.name.is_empty() {
            return Err(FragmentsError::InvalidFragment(
                "fragment name must not be empty".to_string(),
            ));
        }
        if !self.every_node && self.cardinality == 0 {
            return Err(FragmentsError::InvalidFragment(format!(
                "{}: cardinality must be at least 1",
                self.name
            )));
        }
        Ok(())
    }

    /// Flavor id to use, falling back to `default` when none is pinned
    pub fn flavor_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.flavor_id.as_deref().unwrap_or(default)
    }

    /// Number of instances the packer places selectively
    pub fn instances(&self) -> u32 {
        if self.every_node {
            0
        } else {
            self.cardinality
        }
    }

    /// Serialize into a flat string-keyed record
    pub fn to_record(&self) -> FragmentsResult<Record> {
        record::to_record(self)
    }

    /// Rebuild a fragment from a record produced by [`Fragment::to_record`]
    pub fn from_record(record: &Record) -> FragmentsResult<Self> {
        record::from_record(record)
    }
}

/// TOML fragment file layout: a `[[fragment]]` array
#[derive(Debug, Default, Serialize, Deserialize)]
struct FragmentFile {
    #[serde(rename = "fragment", default)]
    fragments: Vec<Fragment>,
}

/// Parse fragment records from a JSON array
pub fn fragments_from_json(content: &str) -> FragmentsResult<Vec<Fragment>> {
    Ok(serde_json::from_str(content)?)
}

/// Parse fragment records from a TOML document of `[[fragment]]` tables
pub fn fragments_from_toml(content: &str) -> FragmentsResult<Vec<Fragment>> {
    let file: FragmentFile = toml::from_str(content)?;
    Ok(file.fragments)
}
