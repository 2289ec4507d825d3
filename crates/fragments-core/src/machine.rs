//! Machine: a bin of fixed memory capacity accumulating placed fragments

use crate::fragment::{Fragment, TagSet};
use crate::record::{self, Record};
use crate::{Flavor, FragmentsError, FragmentsResult};
use serde::{Deserialize, Serialize};

/// Run list prefixes that mark an entry as a role rather than a recipe
pub const ROLE_PREFIXES: [&str; 5] = ["r_", "p_", "base_", "os_", "os-"];

/// Whether a run list entry names a role
pub fn is_role(entry: &str) -> bool {
    ROLE_PREFIXES.iter().any(|prefix| entry.starts_with(prefix))
}

/// One virtual machine that will eventually be provisioned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    ordinal: u32,
    flavor: Flavor,
    memory_used: u64,
    /// Memory held back for every-node fragments that are prepended later
    #[serde(default)]
    reserved_memory: u64,
    tags: TagSet,
    only_group_with_tags: TagSet,
    environment: String,
    run_list: Vec<String>,
    host_aliases: Vec<String>,
    fragments: Vec<Fragment>,
}

impl Machine {
    /// Create a machine seeded from its founding fragment
    pub fn new(
        ordinal: u32,
        flavor: Flavor,
        fragment: &Fragment,
        reserved_memory: u64,
    ) -> FragmentsResult<Self> {
        let required = fragment.memory_weight.saturating_add(reserved_memory);
        if required > flavor.memory_mb {
            return Err(FragmentsError::CapacityExceeded {
                ordinal,
                required,
                capacity: flavor.memory_mb,
            });
        }

        let mut machine = Self {
            ordinal,
            flavor,
            memory_used: fragment.memory_weight,
            reserved_memory,
            tags: fragment.tags.clone(),
            only_group_with_tags: fragment.only_group_with_tags.clone(),
            environment: fragment.environment.clone(),
            run_list: Vec::new(),
            host_aliases: Vec::new(),
            fragments: vec![fragment.clone()],
        };
        merge_unique(&mut machine.run_list, &fragment.run_list);
        merge_unique(&mut machine.host_aliases, &fragment.host_aliases);
        Ok(machine)
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Machine name: `<basename>-<ordinal>`
    pub fn name(&self, basename: &str) -> String {
        format!("{}-{}", basename, self.ordinal)
    }

    pub fn flavor(&self) -> &Flavor {
        &self.flavor
    }

    pub fn flavor_id(&self) -> &str {
        &self.flavor.id
    }

    /// Memory capacity in MB
    pub fn capacity(&self) -> u64 {
        self.flavor.memory_mb
    }

    pub fn cpus(&self) -> u32 {
        self.flavor.cpus
    }

    pub fn memory_used(&self) -> u64 {
        self.memory_used
    }

    pub fn reserved_memory(&self) -> u64 {
        self.reserved_memory
    }

    /// Memory still free for selectively placed fragments
    pub fn memory_available(&self) -> u64 {
        self.capacity()
            .saturating_sub(self.memory_used)
            .saturating_sub(self.reserved_memory)
    }

    /// Whether a fragment of `weight` MB still fits
    pub fn fits(&self, weight: u64) -> bool {
        weight <= self.memory_available()
    }

    /// Percentage of capacity in use, truncated
    pub fn memory_used_percent(&self) -> u64 {
        if self.capacity() == 0 {
            return 0;
        }
        (u128::from(self.memory_used) * 100 / u128::from(self.capacity())) as u64
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    /// Avoid-tags declared by any fragment already placed here
    pub fn placed_avoid_tags(&self) -> impl Iterator<Item = &String> {
        self.fragments.iter().flat_map(|f| f.avoid_tags.iter())
    }

    pub fn only_group_with_tags(&self) -> &TagSet {
        &self.only_group_with_tags
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn run_list(&self) -> &[String] {
        &self.run_list
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Whether a fragment with this name is already placed here
    pub fn contains(&self, name: &str) -> bool {
        self.fragments.iter().any(|f| f.name == name)
    }

    /// Run list entries that are roles
    pub fn roles(&self) -> Vec<String> {
        self.run_list
            .iter()
            .filter(|entry| is_role(entry))
            .cloned()
            .collect()
    }

    /// Run list entries that are recipes
    pub fn recipes(&self) -> Vec<String> {
        self.run_list
            .iter()
            .filter(|entry| !is_role(entry))
            .cloned()
            .collect()
    }

    /// Host aliases of every placed fragment, followed by the machine's own name
    pub fn host_aliases(&self, basename: &str) -> Vec<String> {
        let mut aliases = self.host_aliases.clone();
        merge_unique(&mut aliases, &[self.name(basename)]);
        aliases
    }

    /// Place a fragment at the end of the run list.
    ///
    /// Fails without modifying the machine when the environments differ or
    /// when the fragment would overflow the machine.
    pub fn append(&mut self, fragment: &Fragment) -> FragmentsResult<()> {
        if fragment.environment != self.environment {
            return Err(FragmentsError::InvalidFragment(format!(
                "{}: environment '{}' does not match machine {} environment '{}'",
                fragment.name, fragment.environment, self.ordinal, self.environment
            )));
        }
        if !self.fits(fragment.memory_weight) {
            return Err(FragmentsError::CapacityExceeded {
                ordinal: self.ordinal,
                required: self
                    .memory_used
                    .saturating_add(self.reserved_memory)
                    .saturating_add(fragment.memory_weight),
                capacity: self.capacity(),
            });
        }

        self.memory_used += fragment.memory_weight;
        self.tags.extend(fragment.tags.iter().cloned());
        merge_unique(&mut self.host_aliases, &fragment.host_aliases);
        merge_unique(&mut self.run_list, &fragment.run_list);
        self.fragments.push(fragment.clone());
        Ok(())
    }

    /// Place every-node fragments ahead of everything already on the
    /// machine. Their weight is taken out of the reservation first.
    pub fn prepend(&mut self, fragments: &[Fragment]) -> FragmentsResult<()> {
        let weight = fragments
            .iter()
            .fold(0u64, |sum, f| sum.saturating_add(f.memory_weight));
        let required = self.memory_used.saturating_add(weight);
        if required > self.capacity() {
            return Err(FragmentsError::CapacityExceeded {
                ordinal: self.ordinal,
                required,
                capacity: self.capacity(),
            });
        }

        self.memory_used = required;
        self.reserved_memory = self.reserved_memory.saturating_sub(weight);

        let mut run_list = Vec::new();
        for fragment in fragments {
            merge_unique(&mut run_list, &fragment.run_list);
            merge_unique(&mut self.host_aliases, &fragment.host_aliases);
            self.tags.extend(fragment.tags.iter().cloned());
        }
        merge_unique(&mut run_list, &self.run_list);
        self.run_list = run_list;

        self.fragments.splice(0..0, fragments.iter().cloned());
        Ok(())
    }

    /// Serialize into a flat string-keyed record
    pub fn to_record(&self) -> FragmentsResult<Record> {
        record::to_record(self)
    }

    /// Rebuild a machine from a record produced by [`Machine::to_record`]
    pub fn from_record(record: &Record) -> FragmentsResult<Self> {
        record::from_record(record)
    }
}

/// Append entries not already present, keeping first-seen order
fn merge_unique(target: &mut Vec<String>, entries: &[String]) {
    for entry in entries {
        if !target.contains(entry) {
            target.push(entry.clone());
        }
    }
}
