//! Observation hooks invoked while packing
//!
//! Observers never influence placement; the hooks that hand a value back
//! must return what they were given (or an equivalent substitute).

use crate::filter::FilterStage;
use fragments_core::{Fragment, Machine};
use tracing::debug;

/// Probes called by the packer at each step of a run
pub trait PackObserver: Send {
    /// Called once before any fragment is placed
    fn packing_started(&mut self, _fragments: &[Fragment]) {}

    /// Called once after every fragment has been placed
    fn packing_finished(&mut self, _machines: &[Machine]) {}

    /// Called before one instance of a fragment is placed
    fn beginning_to_pack_fragment(&mut self, _fragment: &Fragment, _instance: u32) {}

    /// Called after a filter stage ran; must return the candidate list
    fn applied_filter<'m>(
        &mut self,
        _fragment: &Fragment,
        _stage: &FilterStage,
        machines: Vec<&'m Machine>,
    ) -> Vec<&'m Machine> {
        machines
    }

    /// Called when a new machine is needed; must return the machine
    fn created_machine(&mut self, machine: Machine) -> Machine {
        machine
    }

    /// Called once a fragment instance has landed on a machine
    fn placed_fragment(&mut self, _fragment: &Fragment, _machine: &Machine) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PackObserver for NoopObserver {}

/// Observer that emits a debug event for every probe
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PackObserver for TracingObserver {
    fn packing_started(&mut self, fragments: &[Fragment]) {
        debug!(fragments = fragments.len(), "Packing started");
    }

    fn packing_finished(&mut self, machines: &[Machine]) {
        debug!(machines = machines.len(), "Packing finished");
    }

    fn beginning_to_pack_fragment(&mut self, fragment: &Fragment, instance: u32) {
        debug!(
            fragment = %fragment.name,
            instance = instance,
            memory_weight = fragment.memory_weight,
            "Packing fragment"
        );
    }

    fn applied_filter<'m>(
        &mut self,
        fragment: &Fragment,
        stage: &FilterStage,
        machines: Vec<&'m Machine>,
    ) -> Vec<&'m Machine> {
        let candidates: Vec<u32> = machines.iter().map(|m| m.ordinal()).collect();
        debug!(
            fragment = %fragment.name,
            filter = stage.name(),
            precedence = stage.precedence(),
            candidates = ?candidates,
            "Applied filter"
        );
        machines
    }

    fn created_machine(&mut self, machine: Machine) -> Machine {
        debug!(
            machine = machine.ordinal(),
            flavor = %machine.flavor_id(),
            environment = %machine.environment(),
            "Created machine"
        );
        machine
    }

    fn placed_fragment(&mut self, fragment: &Fragment, machine: &Machine) {
        debug!(
            fragment = %fragment.name,
            machine = machine.ordinal(),
            memory_used = machine.memory_used(),
            capacity = machine.capacity(),
            "Placed fragment"
        );
    }
}
