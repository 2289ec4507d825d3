//! Ordered filter chain narrowing candidate machines for one fragment
//!
//! Each stage is a pure function over the candidate list. Stages run in
//! descending precedence; stages with equal precedence keep registration
//! order.

use fragments_core::{Fragment, Machine};
use std::fmt;

/// A filter or sort over candidate machines
pub type FilterFn = for<'m> fn(&Fragment, Vec<&'m Machine>) -> Vec<&'m Machine>;

/// One named stage of the filter chain
#[derive(Clone)]
pub struct FilterStage {
    name: String,
    precedence: i32,
    apply: FilterFn,
}

impl FilterStage {
    pub fn new(name: impl Into<String>, precedence: i32, apply: FilterFn) -> Self {
        Self {
            name: name.into(),
            precedence,
            apply,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn precedence(&self) -> i32 {
        self.precedence
    }

    pub fn apply<'m>(&self, fragment: &Fragment, machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
        (self.apply)(fragment, machines)
    }
}

impl fmt::Debug for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterStage")
            .field("name", &self.name)
            .field("precedence", &self.precedence)
            .finish()
    }
}

/// Stages kept in application order
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    stages: Vec<FilterStage>,
}

impl FilterChain {
    /// Chain with no stages; every machine is a candidate
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    /// Chain with the built-in stages
    pub fn with_defaults() -> Self {
        let mut chain = Self::empty();
        chain.register(FilterStage::new("MemoryUsed", 10, memory_used));
        chain.register(FilterStage::new("MemorySuitable", 5, memory_suitable));
        chain.register(FilterStage::new("AvoidTags", 10, avoid_tags));
        chain.register(FilterStage::new("OnlyGroupWithTags", 10, only_group_with_tags));
        chain.register(FilterStage::new("GroupWithTags", 10, group_with_tags));
        chain.register(FilterStage::new("AssignToFlavor", 10, assign_to_flavor));
        chain.register(FilterStage::new("AvoidSameFragment", 10, avoid_same_fragment));
        chain.register(FilterStage::new("ChooseEnvironment", 10, choose_environment));
        chain
    }

    /// Add a stage, keeping the chain sorted by descending precedence
    pub fn register(&mut self, stage: FilterStage) {
        let position = self
            .stages
            .iter()
            .position(|s| s.precedence < stage.precedence)
            .unwrap_or(self.stages.len());
        self.stages.insert(position, stage);
    }

    /// Remove a stage by name, returning whether it was present
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.stages.len();
        self.stages.retain(|s| s.name != name);
        self.stages.len() != before
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    /// Run every stage, reporting each application through `on_applied`.
    ///
    /// Stops as soon as a stage leaves no candidates.
    pub fn apply<'m, F>(
        &self,
        fragment: &Fragment,
        machines: Vec<&'m Machine>,
        mut on_applied: F,
    ) -> Vec<&'m Machine>
    where
        F: FnMut(&FilterStage, Vec<&'m Machine>) -> Vec<&'m Machine>,
    {
        let mut candidates = machines;
        for stage in &self.stages {
            if candidates.is_empty() {
                break;
            }
            candidates = stage.apply(fragment, candidates);
            candidates = on_applied(stage, candidates);
        }
        candidates
    }
}

/// Least-loaded machines first
pub fn memory_used<'m>(_fragment: &Fragment, mut machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
    machines.sort_by_key(|m| m.memory_used());
    machines
}

/// Machines with room for the fragment
pub fn memory_suitable<'m>(fragment: &Fragment, machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| m.fits(fragment.memory_weight))
        .collect()
}

/// Machines whose tags avoid the fragment's avoid-tags, and whose placed
/// fragments do not avoid the fragment's tags
pub fn avoid_tags<'m>(fragment: &Fragment, machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| m.tags().is_disjoint(&fragment.avoid_tags))
        .filter(|m| !m.placed_avoid_tags().any(|t| fragment.tags.contains(t)))
        .collect()
}

/// Machines whose exclusive group matches the fragment's exactly
pub fn only_group_with_tags<'m>(
    fragment: &Fragment,
    machines: Vec<&'m Machine>,
) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| *m.only_group_with_tags() == fragment.only_group_with_tags)
        .collect()
}

/// Machines sharing a tag with the fragment's group-with tags first
pub fn group_with_tags<'m>(fragment: &Fragment, mut machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
    machines.sort_by_key(|m| m.tags().is_disjoint(&fragment.group_with_tags));
    machines
}

/// Machines of the fragment's flavor
pub fn assign_to_flavor<'m>(fragment: &Fragment, machines: Vec<&'m Machine>) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| fragment.flavor_id.as_deref() == Some(m.flavor_id()))
        .collect()
}

/// Machines not already hosting an instance of the fragment
pub fn avoid_same_fragment<'m>(
    fragment: &Fragment,
    machines: Vec<&'m Machine>,
) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| !m.contains(&fragment.name))
        .collect()
}

/// Machines in the fragment's environment
pub fn choose_environment<'m>(
    fragment: &Fragment,
    machines: Vec<&'m Machine>,
) -> Vec<&'m Machine> {
    machines
        .into_iter()
        .filter(|m| m.environment() == fragment.environment)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragments_core::FlavorTable;

    fn fragment(name: &str, weight: u64) -> Fragment {
        let mut fragment = Fragment::new(name);
        fragment.memory_weight = weight;
        fragment.flavor_id = Some("2".to_string());
        fragment
    }

    fn machine(ordinal: u32, founder: &Fragment) -> Machine {
        let flavor = FlavorTable::builtin()
            .resolve(founder.flavor_id.as_deref().unwrap_or("2"))
            .unwrap()
            .clone();
        Machine::new(ordinal, flavor, founder, 0).unwrap()
    }

    fn ordinals(machines: &[&Machine]) -> Vec<u32> {
        machines.iter().map(|m| m.ordinal()).collect()
    }

    #[test]
    fn test_default_order() {
        let chain = FilterChain::with_defaults();
        let names: Vec<&str> = chain.stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "MemoryUsed",
                "AvoidTags",
                "OnlyGroupWithTags",
                "GroupWithTags",
                "AssignToFlavor",
                "AvoidSameFragment",
                "ChooseEnvironment",
                "MemorySuitable",
            ]
        );
    }

    #[test]
    fn test_register_respects_precedence_and_ties() {
        let mut chain = FilterChain::empty();
        chain.register(FilterStage::new("low", 1, memory_used));
        chain.register(FilterStage::new("high-a", 20, memory_used));
        chain.register(FilterStage::new("mid", 10, memory_used));
        chain.register(FilterStage::new("high-b", 20, memory_used));

        let names: Vec<&str> = chain.stages().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["high-a", "high-b", "mid", "low"]);

        assert!(chain.remove("mid"));
        assert!(!chain.remove("mid"));
        assert_eq!(chain.stages().len(), 3);
    }

    #[test]
    fn test_memory_used_sorts_ascending() {
        let m0 = machine(0, &fragment("a", 900));
        let m1 = machine(1, &fragment("b", 100));
        let m2 = machine(2, &fragment("c", 500));

        let sorted = memory_used(&fragment("x", 0), vec![&m0, &m1, &m2]);
        assert_eq!(ordinals(&sorted), vec![1, 2, 0]);
    }

    #[test]
    fn test_memory_suitable() {
        let m0 = machine(0, &fragment("a", 1500));
        let m1 = machine(1, &fragment("b", 1000));

        let kept = memory_suitable(&fragment("x", 1048), vec![&m0, &m1]);
        assert_eq!(ordinals(&kept), vec![1]);
    }

    #[test]
    fn test_avoid_tags_is_symmetric() {
        let mut gpu = fragment("gpu", 10);
        gpu.tags.insert("gpu".to_string());
        let m0 = machine(0, &gpu);

        let mut picky = fragment("picky", 10);
        picky.avoid_tags.insert("gpu".to_string());
        let m1 = machine(1, &picky);

        let mut avoids_gpu = fragment("x", 10);
        avoids_gpu.avoid_tags.insert("gpu".to_string());
        assert_eq!(ordinals(&avoid_tags(&avoids_gpu, vec![&m0, &m1])), vec![1]);

        let mut is_gpu = fragment("y", 10);
        is_gpu.tags.insert("gpu".to_string());
        assert_eq!(ordinals(&avoid_tags(&is_gpu, vec![&m0, &m1])), vec![0]);
    }

    #[test]
    fn test_only_group_with_tags() {
        let plain = machine(0, &fragment("a", 10));
        let mut grouped_founder = fragment("b", 10);
        grouped_founder.only_group_with_tags.insert("db".to_string());
        let grouped = machine(1, &grouped_founder);

        assert_eq!(
            ordinals(&only_group_with_tags(&fragment("x", 10), vec![&plain, &grouped])),
            vec![0]
        );

        let mut member = fragment("y", 10);
        member.only_group_with_tags.insert("db".to_string());
        assert_eq!(
            ordinals(&only_group_with_tags(&member, vec![&plain, &grouped])),
            vec![1]
        );

        member.only_group_with_tags.insert("cache".to_string());
        assert!(only_group_with_tags(&member, vec![&plain, &grouped]).is_empty());
    }

    #[test]
    fn test_group_with_tags_is_stable() {
        let m0 = machine(0, &fragment("a", 10));
        let mut web = fragment("b", 10);
        web.tags.insert("web".to_string());
        let m1 = machine(1, &web);
        let m2 = machine(2, &fragment("c", 10));
        let m3 = machine(3, &web);

        let mut wants_web = fragment("x", 10);
        wants_web.group_with_tags.insert("web".to_string());
        let sorted = group_with_tags(&wants_web, vec![&m0, &m1, &m2, &m3]);
        assert_eq!(ordinals(&sorted), vec![1, 3, 0, 2]);

        let unchanged = group_with_tags(&fragment("y", 10), vec![&m2, &m0, &m1]);
        assert_eq!(ordinals(&unchanged), vec![2, 0, 1]);
    }

    #[test]
    fn test_assign_to_flavor() {
        let small = machine(0, &fragment("a", 10));
        let mut medium_founder = fragment("b", 10);
        medium_founder.flavor_id = Some("3".to_string());
        let medium = machine(1, &medium_founder);

        let mut wants_medium = fragment("x", 10);
        wants_medium.flavor_id = Some("3".to_string());
        assert_eq!(ordinals(&assign_to_flavor(&wants_medium, vec![&small, &medium])), vec![1]);
    }

    #[test]
    fn test_avoid_same_fragment() {
        let m0 = machine(0, &fragment("web", 10));
        let m1 = machine(1, &fragment("db", 10));
        assert_eq!(ordinals(&avoid_same_fragment(&fragment("web", 10), vec![&m0, &m1])), vec![1]);
    }

    #[test]
    fn test_choose_environment() {
        let m0 = machine(0, &fragment("a", 10));
        let mut prod_founder = fragment("b", 10);
        prod_founder.environment = "production".to_string();
        let m1 = machine(1, &prod_founder);

        let mut prod = fragment("x", 10);
        prod.environment = "production".to_string();
        assert_eq!(ordinals(&choose_environment(&prod, vec![&m0, &m1])), vec![1]);
    }

    #[test]
    fn test_chain_short_circuits_on_empty() {
        let m0 = machine(0, &fragment("web", 10));
        let chain = FilterChain::with_defaults();

        let mut applied = Vec::new();
        let result = chain.apply(&fragment("web", 10), vec![&m0], |stage, machines| {
            applied.push(stage.name().to_string());
            machines
        });

        assert!(result.is_empty());
        assert_eq!(applied.last().map(String::as_str), Some("AvoidSameFragment"));
        assert!(!applied.contains(&"MemorySuitable".to_string()));
    }

    #[test]
    fn test_chain_prefers_least_loaded() {
        let m0 = machine(0, &fragment("a", 1200));
        let m1 = machine(1, &fragment("b", 300));
        let chain = FilterChain::with_defaults();

        let result = chain.apply(&fragment("x", 100), vec![&m0, &m1], |_, machines| machines);
        assert_eq!(ordinals(&result), vec![1, 0]);
    }
}
