//! Cycle detection.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap as HashMap, FxHashSet};

use super::graph::DependencyGraph;
use crate::module_id::ModuleId;

/// Upper bound on search steps spent ordering one component.
const ORDER_BUDGET: usize = 10_000;

impl DependencyGraph {
    /// Every strongly connected component with more than one module, plus
    /// modules that import themselves.
    ///
    /// Each cycle starts at its smallest id and lists members in import
    /// order, so every member imports the next and the last imports the
    /// first. Components with no single loop through all members (or too
    /// large to search) fall back to depth-first order from the smallest id.
    /// Cycles are sorted by their members. Cycles are legal; this only
    /// reports them.
    pub fn detect_cycles(&self) -> Vec<Vec<ModuleId>> {
        let nodes = self.nodes();
        let mut graph: DiGraph<ModuleId, ()> = DiGraph::with_capacity(nodes.len(), 0);
        let mut index: HashMap<ModuleId, NodeIndex> = HashMap::default();

        for node in &nodes {
            index.insert(node.id.clone(), graph.add_node(node.id.clone()));
        }
        for node in &nodes {
            let from = index[&node.id];
            for target in node.targets() {
                if let Some(&to) = index.get(&target) {
                    graph.update_edge(from, to, ());
                }
            }
        }

        let mut cycles: Vec<Vec<ModuleId>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                order_component(&graph, &scc)
                    .into_iter()
                    .map(|ix| graph[ix].clone())
                    .collect()
            })
            .collect();
        cycles.sort();
        cycles
    }
}

/// Successors of `node` inside the component, smallest id first.
fn successors(
    graph: &DiGraph<ModuleId, ()>,
    members: &FxHashSet<NodeIndex>,
    node: NodeIndex,
) -> Vec<NodeIndex> {
    let mut next: Vec<NodeIndex> = graph
        .neighbors(node)
        .filter(|n| members.contains(n))
        .collect();
    next.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
    next.dedup();
    next
}

fn order_component(graph: &DiGraph<ModuleId, ()>, scc: &[NodeIndex]) -> Vec<NodeIndex> {
    let members: FxHashSet<NodeIndex> = scc.iter().copied().collect();
    let Some(&start) = scc.iter().min_by(|a, b| graph[**a].cmp(&graph[**b])) else {
        return Vec::new();
    };
    if scc.len() == 1 {
        return vec![start];
    }

    let mut path = vec![start];
    let mut visited: FxHashSet<NodeIndex> = FxHashSet::from_iter([start]);
    let mut budget = ORDER_BUDGET;
    if close_loop(graph, &members, start, &mut path, &mut visited, &mut budget) {
        return path;
    }

    // depth-first order; consecutive members are not guaranteed to import each other
    let mut order = Vec::with_capacity(scc.len());
    let mut seen: FxHashSet<NodeIndex> = FxHashSet::default();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if !seen.insert(node) {
            continue;
        }
        order.push(node);
        stack.extend(successors(graph, &members, node).into_iter().rev());
    }
    order
}

/// Extend `path` to a loop through every member that returns to `start`.
fn close_loop(
    graph: &DiGraph<ModuleId, ()>,
    members: &FxHashSet<NodeIndex>,
    start: NodeIndex,
    path: &mut Vec<NodeIndex>,
    visited: &mut FxHashSet<NodeIndex>,
    budget: &mut usize,
) -> bool {
    let Some(&last) = path.last() else {
        return false;
    };
    let next = successors(graph, members, last);
    if path.len() == members.len() {
        return next.contains(&start);
    }
    for candidate in next {
        if visited.contains(&candidate) {
            continue;
        }
        if *budget == 0 {
            return false;
        }
        *budget -= 1;

        path.push(candidate);
        visited.insert(candidate);
        if close_loop(graph, members, start, path, visited, budget) {
            return true;
        }
        path.pop();
        visited.remove(&candidate);
    }
    false
}
