//! Packing strategies: how one fragment instance finds its machine

use crate::filter::{self, FilterChain};
use crate::observer::PackObserver;
use fragments_core::{FlavorTable, Fragment, FragmentsResult, Machine};
use tracing::debug;

/// Shared state a strategy needs while placing fragments
pub struct PlacementContext<'a> {
    /// Flavor table used to size new machines
    pub flavors: &'a FlavorTable,
    /// Flavor for fragments that do not pin one
    pub default_flavor: &'a str,
    /// Memory every new machine holds back for every-node fragments
    pub reserved_memory: u64,
    /// Observation hooks
    pub observer: &'a mut dyn PackObserver,
}

impl PlacementContext<'_> {
    /// Create a machine seeded from `fragment` and add it to `machines`.
    ///
    /// Returns the index of the new machine.
    pub fn create_machine(
        &mut self,
        machines: &mut Vec<Machine>,
        fragment: &Fragment,
    ) -> FragmentsResult<usize> {
        let ordinal = machines.len() as u32;
        let flavor = self
            .flavors
            .resolve(fragment.flavor_or(self.default_flavor))?
            .clone();
        let machine = Machine::new(ordinal, flavor, fragment, self.reserved_memory)?;
        let machine = self.observer.created_machine(machine);

        debug!(
            fragment = %fragment.name,
            machine = ordinal,
            flavor = %machine.flavor_id(),
            "Created machine"
        );

        machines.push(machine);
        Ok(machines.len() - 1)
    }

    /// Append `fragment` to the machine at `index` and report the placement
    pub fn append_to(
        &mut self,
        machines: &mut [Machine],
        index: usize,
        fragment: &Fragment,
    ) -> FragmentsResult<usize> {
        let machine = &mut machines[index];
        machine.append(fragment)?;
        debug!(
            fragment = %fragment.name,
            machine = machine.ordinal(),
            memory_used = machine.memory_used(),
            "Placed fragment"
        );
        self.observer.placed_fragment(fragment, machine);
        Ok(index)
    }
}

/// Strategy for placing fragment instances onto machines
pub trait PackingStrategy: Send {
    /// Name the strategy is registered under
    fn name(&self) -> &'static str;

    /// Place one fragment instance, creating a machine if none is suitable.
    ///
    /// Returns the index of the machine hosting the instance.
    fn place_fragment(
        &self,
        fragment: &Fragment,
        machines: &mut Vec<Machine>,
        ctx: &mut PlacementContext<'_>,
    ) -> FragmentsResult<usize>;
}

/// Places each instance on the first machine left by a filter chain
#[derive(Debug, Clone)]
pub struct ModularPacker {
    chain: FilterChain,
}

impl ModularPacker {
    pub fn new(chain: FilterChain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }
}

impl Default for ModularPacker {
    fn default() -> Self {
        Self::new(FilterChain::with_defaults())
    }
}

impl PackingStrategy for ModularPacker {
    fn name(&self) -> &'static str {
        "modular"
    }

    fn place_fragment(
        &self,
        fragment: &Fragment,
        machines: &mut Vec<Machine>,
        ctx: &mut PlacementContext<'_>,
    ) -> FragmentsResult<usize> {
        let chosen = {
            let observer = &mut *ctx.observer;
            let candidates = self.chain.apply(fragment, machines.iter().collect(), |stage, ms| {
                observer.applied_filter(fragment, stage, ms)
            });
            candidates.first().map(|m| m.ordinal())
        };

        let index = chosen.and_then(|ordinal| machines.iter().position(|m| m.ordinal() == ordinal));
        match index {
            Some(index) => ctx.append_to(machines, index, fragment),
            None => {
                let index = ctx.create_machine(machines, fragment)?;
                ctx.observer.placed_fragment(fragment, &machines[index]);
                Ok(index)
            }
        }
    }
}

/// First-fit: the first machine, in creation order, with room for the
/// fragment that does not already host it. Environment, flavor, exclusive
/// groups and avoid-tags are honored as in the filter chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplePacker;

impl PackingStrategy for SimplePacker {
    fn name(&self) -> &'static str {
        "simple"
    }

    fn place_fragment(
        &self,
        fragment: &Fragment,
        machines: &mut Vec<Machine>,
        ctx: &mut PlacementContext<'_>,
    ) -> FragmentsResult<usize> {
        let flavor_id = fragment.flavor_or(ctx.default_flavor);
        let chosen = {
            let candidates: Vec<&Machine> = machines
                .iter()
                .filter(|m| {
                    !m.contains(&fragment.name)
                        && m.fits(fragment.memory_weight)
                        && m.environment() == fragment.environment
                        && m.flavor_id() == flavor_id
                })
                .collect();
            let candidates = filter::only_group_with_tags(fragment, candidates);
            filter::avoid_tags(fragment, candidates)
                .first()
                .map(|m| m.ordinal())
        };
        let index = chosen.and_then(|ordinal| machines.iter().position(|m| m.ordinal() == ordinal));

        match index {
            Some(index) => ctx.append_to(machines, index, fragment),
            None => {
                let index = ctx.create_machine(machines, fragment)?;
                ctx.observer.placed_fragment(fragment, &machines[index]);
                Ok(index)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;

    fn fragment(name: &str, weight: u64) -> Fragment {
        let mut fragment = Fragment::new(name);
        fragment.memory_weight = weight;
        fragment
    }

    fn place_all(strategy: &dyn PackingStrategy, fragments: &[Fragment]) -> Vec<Machine> {
        let flavors = FlavorTable::builtin();
        let mut observer = NoopObserver;
        let mut ctx = PlacementContext {
            flavors: &flavors,
            default_flavor: "2",
            reserved_memory: 0,
            observer: &mut observer,
        };
        let mut machines = Vec::new();
        for fragment in fragments {
            for _ in 0..fragment.instances() {
                strategy
                    .place_fragment(fragment, &mut machines, &mut ctx)
                    .unwrap();
            }
        }
        machines
    }

    #[test]
    fn test_modular_reuses_machine() {
        let mut a = fragment("a", 100);
        a.flavor_id = Some("2".to_string());
        let mut b = fragment("b", 50);
        b.flavor_id = Some("2".to_string());

        let machines = place_all(&ModularPacker::default(), &[a, b]);
        assert_eq!(machines.len(), 1);
        assert_eq!(machines[0].memory_used(), 150);
    }

    #[test]
    fn test_modular_spreads_cardinality() {
        let mut web = fragment("web", 100);
        web.flavor_id = Some("2".to_string());
        web.cardinality = 3;

        let machines = place_all(&ModularPacker::default(), &[web]);
        assert_eq!(machines.len(), 3);
        assert!(machines.iter().all(|m| m.fragments().len() == 1));
    }

    #[test]
    fn test_simple_first_fit() {
        let big = fragment("big", 1800);
        let small = fragment("small", 200);
        let medium = fragment("medium", 300);

        let machines = place_all(&SimplePacker, &[big, medium, small]);
        assert_eq!(machines.len(), 2);
        assert_eq!(machines[0].fragments().len(), 2);
        assert_eq!(machines[0].memory_used(), 2000);
        assert_eq!(machines[1].memory_used(), 300);
    }

    #[test]
    fn test_simple_respects_environment_and_flavor() {
        let a = fragment("a", 10);
        let mut b = fragment("b", 10);
        b.environment = "production".to_string();
        let mut c = fragment("c", 10);
        c.flavor_id = Some("3".to_string());

        let machines = place_all(&SimplePacker, &[a, b, c]);
        assert_eq!(machines.len(), 3);
        assert_eq!(machines[2].flavor_id(), "3");
    }

    #[test]
    fn test_simple_respects_avoid_tags() {
        let mut gpu = fragment("trainer", 10);
        gpu.tags.insert("gpu".to_string());
        let mut web = fragment("web", 10);
        web.avoid_tags.insert("gpu".to_string());

        let machines = place_all(&SimplePacker, &[gpu, web]);
        assert_eq!(machines.len(), 2);
        assert!(!machines[1].tags().contains("gpu"));
    }

    #[test]
    fn test_oversized_fragment_fails() {
        let flavors = FlavorTable::builtin();
        let mut observer = NoopObserver;
        let mut ctx = PlacementContext {
            flavors: &flavors,
            default_flavor: "1",
            reserved_memory: 0,
            observer: &mut observer,
        };
        let mut machines = Vec::new();
        let result = ModularPacker::default().place_fragment(
            &fragment("huge", 1024),
            &mut machines,
            &mut ctx,
        );
        assert!(result.is_err());
        assert!(machines.is_empty());
    }
}
