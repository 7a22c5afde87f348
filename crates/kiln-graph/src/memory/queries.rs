//! Read-only queries on DependencyGraph.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::graph::DependencyGraph;
use crate::edge::GraphEdge;
use crate::error::GraphError;
use crate::module::GraphNode;
use crate::module_id::ModuleId;
use crate::resolver::ResolvedModule;

impl DependencyGraph {
    pub fn node(&self, id: &ModuleId) -> Option<Arc<GraphNode>> {
        self.inner.read().nodes.get(id).cloned()
    }

    /// Look a module up by path (absolute, or relative to the root).
    pub fn node_by_path(&self, path: &str) -> Option<Arc<GraphNode>> {
        let (absolute, _) = self.locate(path);
        let inner = self.inner.read();
        inner
            .by_path
            .get(&absolute)
            .and_then(|id| inner.nodes.get(id))
            .cloned()
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.inner.read().nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All nodes sorted by id.
    pub fn nodes(&self) -> Vec<Arc<GraphNode>> {
        let mut nodes: Vec<_> = self.inner.read().nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub fn entry_points(&self) -> Vec<ModuleId> {
        self.inner.read().entries.iter().cloned().collect()
    }

    /// Distinct dependencies of a module in source order.
    pub fn dependencies(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.node(id).map(|node| node.targets()).unwrap_or_default()
    }

    pub fn edges_of(&self, id: &ModuleId) -> Vec<GraphEdge> {
        self.node(id).map(|node| node.edges.clone()).unwrap_or_default()
    }

    /// Modules that import `id`, sorted.
    pub fn reverse_edges(&self, id: &ModuleId) -> Vec<ModuleId> {
        self.inner
            .read()
            .reverse
            .get(id)
            .map(|importers| importers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Edge targets that have been resolved but not loaded yet, sorted by path.
    pub fn unloaded_targets(&self) -> Vec<ResolvedModule> {
        let inner = self.inner.read();
        let mut pending: BTreeSet<(String, ModuleId)> = BTreeSet::new();
        for node in inner.nodes.values() {
            for edge in &node.edges {
                if !inner.nodes.contains_key(&edge.to) {
                    if let Some(resolved) = inner.known.get(&edge.to) {
                        pending.insert((resolved.path.clone(), edge.to.clone()));
                    }
                }
            }
        }
        pending
            .into_iter()
            .filter_map(|(_, id)| inner.known.get(&id).cloned())
            .collect()
    }

    /// Every loaded module reachable from `roots`, following all edge kinds.
    pub fn reachable_from(&self, roots: &[ModuleId]) -> BTreeSet<ModuleId> {
        let inner = self.inner.read();
        let mut seen = BTreeSet::new();
        let mut stack: Vec<ModuleId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            let Some(node) = inner.nodes.get(&id) else {
                continue;
            };
            if !seen.insert(id) {
                continue;
            }
            for edge in &node.edges {
                if !seen.contains(&edge.to) {
                    stack.push(edge.to.clone());
                }
            }
        }
        seen
    }

    /// Check that every edge points at a loaded module.
    ///
    /// Run once construction has quiesced; edges to modules that are still
    /// being loaded are expected before that.
    pub fn validate(&self) -> Result<(), GraphError> {
        for node in self.nodes() {
            for edge in &node.edges {
                if !self.contains(&edge.to) {
                    return Err(GraphError::DanglingEdge {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        specifier: edge.specifier.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Order stylesheet edges for emission using the graph's cascade layers.
    pub fn resolve_css_precedence(&self, edges: &[GraphEdge]) -> Vec<GraphEdge> {
        self.css.order(edges)
    }
}
