//! Persisted pack plans and machine reports
//!
//! A plan captures the result of a pack so that provisioning can happen in
//! a later, separate invocation.

use crate::fragment::Fragment;
use crate::machine::Machine;
use crate::{Flavor, FragmentsResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of one pack run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackPlan {
    /// Unique identifier for the plan
    pub id: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Base name for machine names
    pub basename: String,
    /// Strategy that produced the plan
    pub packer: String,
    /// Packed machines, in ordinal order
    pub machines: Vec<Machine>,
    /// Every placed fragment instance
    pub fragments: Vec<Fragment>,
}

impl PackPlan {
    /// Create a new plan
    pub fn new(
        basename: String,
        packer: String,
        machines: Vec<Machine>,
        fragments: Vec<Fragment>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            basename,
            packer,
            machines,
            fragments,
        }
    }

    pub fn to_json(&self) -> FragmentsResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> FragmentsResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Reports for every machine in the plan
    pub fn machine_info(&self, domain: &str) -> Vec<MachineInfo> {
        self.machines
            .iter()
            .map(|m| MachineInfo::new(m, &self.basename, domain))
            .collect()
    }
}

/// What the provisioning side needs to know about one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub name: String,
    pub fqdn: String,
    pub environment: String,
    pub flavor: Flavor,
    pub memory_used_percent: u64,
    pub roles: Vec<String>,
    pub recipes: Vec<String>,
    pub host_aliases: Vec<String>,
    /// Names of placed fragments, in run order
    pub fragments: Vec<String>,
}

impl MachineInfo {
    pub fn new(machine: &Machine, basename: &str, domain: &str) -> Self {
        let name = machine.name(basename);
        Self {
            fqdn: format!("{}.{}", name, domain),
            environment: machine.environment().to_string(),
            flavor: machine.flavor().clone(),
            memory_used_percent: machine.memory_used_percent(),
            roles: machine.roles(),
            recipes: machine.recipes(),
            host_aliases: machine.host_aliases(basename),
            fragments: machine.fragments().iter().map(|f| f.name.clone()).collect(),
            name,
        }
    }
}
