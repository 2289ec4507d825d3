//! Dependency validation over declared fragments
//!
//! A required fragment has to be declared somewhere, not placed on the same
//! machine, and requirements must not form a cycle.

use fragments_core::{Fragment, FragmentsError, FragmentsResult, MissingDependencies};
use petgraph::algo::{astar, kosaraju_scc, toposort};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, BTreeSet};

/// Fragment name -> names of the fragments it requires
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

/// Build the dependency graph for a set of fragments.
///
/// Instances of the same fragment collapse into one node.
pub fn dependency_graph(fragments: &[Fragment]) -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    for fragment in fragments {
        graph
            .entry(fragment.name.clone())
            .or_default()
            .extend(fragment.required_fragments.iter().cloned());
    }
    graph
}

/// Every fragment whose requirements name an undeclared fragment
pub fn missing_dependencies(graph: &DependencyGraph) -> MissingDependencies {
    let missing = graph
        .iter()
        .filter_map(|(name, required)| {
            let absent: Vec<String> = required
                .iter()
                .filter(|dep| !graph.contains_key(*dep))
                .cloned()
                .collect();
            (!absent.is_empty()).then(|| (name.clone(), absent))
        })
        .collect();
    MissingDependencies(missing)
}

/// Graph form used by the traversals: nodes are fragment names, edges point
/// from a fragment to each fragment it requires. Nodes are added in name
/// order, so node indices sort the same way names do.
fn to_digraph(graph: &DependencyGraph) -> DiGraph<&str, &'static str> {
    let mut names: BTreeSet<&str> = graph.keys().map(String::as_str).collect();
    names.extend(graph.values().flatten().map(String::as_str));

    let mut digraph = DiGraph::with_capacity(names.len(), 0);
    let indices: BTreeMap<&str, NodeIndex> = names
        .into_iter()
        .map(|name| (name, digraph.add_node(name)))
        .collect();

    for (name, required) in graph {
        for dep in required {
            digraph.add_edge(indices[name.as_str()], indices[dep.as_str()], "requires");
        }
    }
    digraph
}

/// First dependency cycle found, as a closed path (`a -> b -> a`).
///
/// The reported cycle is the one through the smallest fragment name that
/// lies on any cycle, following the shortest way back to it.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<String>> {
    let digraph = to_digraph(graph);
    if toposort(&digraph, None).is_ok() {
        return None;
    }

    let (start, members) = kosaraju_scc(&digraph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || digraph.contains_edge(scc[0], scc[0]))
        .filter_map(|scc| {
            let members: BTreeSet<NodeIndex> = scc.into_iter().collect();
            members.first().copied().map(|start| (start, members))
        })
        .min_by_key(|(start, _)| *start)?;

    let path = if digraph.contains_edge(start, start) {
        vec![start]
    } else {
        digraph
            .neighbors(start)
            .filter(|next| members.contains(next))
            .filter_map(|next| {
                astar(&digraph, next, |n| n == start, |_| 1usize, |_| 0usize)
            })
            .min()
            .map(|(_, path)| path)?
    };

    let mut cycle = vec![digraph[start].to_string()];
    cycle.extend(path.into_iter().map(|n| digraph[n].to_string()));
    Some(cycle)
}

/// Fail when any requirement is undeclared or the requirements form a cycle
pub fn validate_dependencies(fragments: &[Fragment]) -> FragmentsResult<()> {
    let graph = dependency_graph(fragments);

    let missing = missing_dependencies(&graph);
    if !missing.is_empty() {
        return Err(FragmentsError::MissingDependencies(missing));
    }

    if let Some(cycle) = find_cycle(&graph) {
        return Err(FragmentsError::DependencyCycle(cycle));
    }

    Ok(())
}

/// Edge list (fragment, dependency) for visualization tooling
pub fn dependency_edges(graph: &DependencyGraph) -> Vec<(String, String)> {
    graph
        .iter()
        .flat_map(|(name, deps)| deps.iter().map(move |dep| (name.clone(), dep.clone())))
        .collect()
}

/// Graphviz DOT rendering of the graph
pub fn dependency_graph_dot(graph: &DependencyGraph) -> String {
    let digraph = to_digraph(graph);
    format!("{}", Dot::with_config(&digraph, &[Config::EdgeNoLabel]))
}
