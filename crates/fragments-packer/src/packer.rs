//! Packer: drives a full packing run
//!
//! A run places every selectively placed fragment instance first, in
//! declaration order, and then prepends the every-node fragments to each
//! machine that exists. The order is what keeps the result reproducible.

use fragments_core::{
    FlavorTable, Fragment, FragmentsConfig, FragmentsError, FragmentsResult, Machine, MachineInfo,
    PackPlan,
};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::dependency::{self, DependencyGraph};
use crate::observer::{NoopObserver, PackObserver, TracingObserver};
use crate::registry::PackerRegistry;
use crate::strategy::{PackingStrategy, PlacementContext};

/// Packer owns the machines of one run
pub struct Packer {
    /// Base name for machine names
    basename: String,
    /// Domain used for machine FQDNs
    domain_name: String,
    /// Flavor for fragments that do not pin one
    default_flavor: String,
    /// Resolved flavor table
    flavors: FlavorTable,
    /// Placement strategy
    strategy: Box<dyn PackingStrategy>,
    /// Observation hooks
    observer: Box<dyn PackObserver>,
    /// Packed machines, in ordinal order
    machines: Vec<Machine>,
    /// Every placed fragment instance
    fragments: Vec<Fragment>,
}

impl Packer {
    /// Create a packer for the strategy named in `config`
    pub fn new(config: &FragmentsConfig, registry: &PackerRegistry) -> FragmentsResult<Self> {
        let strategy = registry.create(&config.cluster.packer)?;
        let flavors = config.flavor_table();
        flavors.resolve(&config.packer.default_flavor)?;

        let observer: Box<dyn PackObserver> = if config.packer.enable_debugging {
            Box::new(TracingObserver)
        } else {
            Box::new(NoopObserver)
        };

        info!(
            basename = %config.cluster.name,
            packer = strategy.name(),
            default_flavor = %config.packer.default_flavor,
            "Packer initialized"
        );

        Ok(Self {
            basename: config.cluster.name.clone(),
            domain_name: config.cluster.domain_name.clone(),
            default_flavor: config.packer.default_flavor.clone(),
            flavors,
            strategy,
            observer,
            machines: Vec::new(),
            fragments: Vec::new(),
        })
    }

    /// Resume a packer from a persisted plan without packing again
    pub fn from_plan(
        plan: PackPlan,
        config: &FragmentsConfig,
        registry: &PackerRegistry,
    ) -> FragmentsResult<Self> {
        let mut config = config.clone();
        config.cluster.name = plan.basename;
        config.cluster.packer = plan.packer;

        let mut packer = Self::new(&config, registry)?;
        packer.machines = plan.machines;
        packer.fragments = plan.fragments;

        info!(
            machines = packer.machines.len(),
            fragments = packer.fragments.len(),
            "Packer restored from plan"
        );
        Ok(packer)
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Box<dyn PackObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Pack fragments into machines.
    ///
    /// All input is validated before the first machine is created, and
    /// nothing is kept unless the whole run succeeds.
    pub fn pack(&mut self, fragments: &[Fragment]) -> FragmentsResult<()> {
        if !self.machines.is_empty() || !self.fragments.is_empty() {
            return Err(FragmentsError::Config(
                "packer already holds a packed result".to_string(),
            ));
        }

        let fragments = self.prepare(fragments)?;
        let (every_node, selective): (Vec<Fragment>, Vec<Fragment>) =
            fragments.iter().cloned().partition(|f| f.every_node);
        let reserved_memory = every_node
            .iter()
            .fold(0u64, |sum, f| sum.saturating_add(f.memory_weight));

        info!(
            packer = self.strategy.name(),
            selective = selective.len(),
            every_node = every_node.len(),
            reserved_memory = reserved_memory,
            "Packing fragments"
        );

        self.observer.packing_started(&fragments);

        let mut machines = Vec::new();
        let mut placed = Vec::new();
        {
            let mut ctx = PlacementContext {
                flavors: &self.flavors,
                default_flavor: &self.default_flavor,
                reserved_memory,
                observer: self.observer.as_mut(),
            };

            for fragment in &selective {
                for instance in 0..fragment.instances() {
                    ctx.observer.beginning_to_pack_fragment(fragment, instance);
                    self.strategy
                        .place_fragment(fragment, &mut machines, &mut ctx)?;
                    placed.push(fragment.clone());
                }
            }
        }

        for machine in &mut machines {
            warn_avoided_every_node_tags(machine, &every_node);
            machine.prepend(&every_node)?;
        }
        placed.extend(every_node);

        self.observer.packing_finished(&machines);

        info!(
            machines = machines.len(),
            instances = placed.len(),
            "Packing finished"
        );

        self.machines = machines;
        self.fragments = placed;
        Ok(())
    }

    /// Validate input records and fill in the default flavor
    fn prepare(&self, fragments: &[Fragment]) -> FragmentsResult<Vec<Fragment>> {
        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(fragments.len());

        for fragment in fragments {
            fragment.validate()?;
            if !seen.insert(fragment.name.as_str()) {
                return Err(FragmentsError::DuplicateFragmentName(fragment.name.clone()));
            }

            let mut fragment = fragment.clone();
            let flavor_id = fragment.flavor_or(&self.default_flavor).to_string();
            self.flavors.resolve(&flavor_id)?;
            fragment.flavor_id = Some(flavor_id);
            prepared.push(fragment);
        }

        dependency::validate_dependencies(&prepared)?;
        debug!(fragments = prepared.len(), "Fragments validated");
        Ok(prepared)
    }

    /// Check the dependencies of every fragment placed so far
    pub fn verify_dependencies(&self) -> FragmentsResult<()> {
        dependency::validate_dependencies(&self.fragments)?;
        info!(fragments = self.fragments.len(), "Verified fragment dependencies");
        Ok(())
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        dependency::dependency_graph(&self.fragments)
    }

    /// Edge list (fragment, dependency)
    pub fn dependency_graph_export(&self) -> Vec<(String, String)> {
        dependency::dependency_edges(&self.dependency_graph())
    }

    pub fn dependency_graph_dot(&self) -> String {
        dependency::dependency_graph_dot(&self.dependency_graph())
    }

    /// Recipes of every machine
    pub fn recipes(&self) -> Vec<String> {
        self.machines.iter().flat_map(|m| m.recipes()).collect()
    }

    /// Roles of every machine
    pub fn roles(&self) -> Vec<String> {
        self.machines.iter().flat_map(|m| m.roles()).collect()
    }

    /// One hostname per machine
    pub fn hostnames(&self) -> Vec<String> {
        self.machines.iter().map(|m| m.name(&self.basename)).collect()
    }

    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Provisioning report for every machine
    pub fn machine_info(&self) -> Vec<MachineInfo> {
        self.machines
            .iter()
            .map(|m| MachineInfo::new(m, &self.basename, &self.domain_name))
            .collect()
    }

    /// Snapshot of the packed result for a later apply phase
    pub fn plan(&self) -> PackPlan {
        PackPlan::new(
            self.basename.clone(),
            self.strategy.name().to_string(),
            self.machines.clone(),
            self.fragments.clone(),
        )
    }
}

/// Every-node fragments skip the filters; report tags they bring onto a
/// machine that hosts a fragment avoiding them
fn warn_avoided_every_node_tags(machine: &Machine, every_node: &[Fragment]) {
    for fragment in every_node {
        for tag in fragment
            .tags
            .iter()
            .filter(|tag| machine.placed_avoid_tags().any(|avoided| avoided == *tag))
        {
            warn!(
                machine = machine.ordinal(),
                fragment = %fragment.name,
                tag = %tag,
                "Every-node fragment adds a tag avoided on this machine"
            );
        }
    }
}
