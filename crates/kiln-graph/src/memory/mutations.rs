//! Mutation methods for DependencyGraph.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::graph::DependencyGraph;
use crate::edge::{EdgeMetadata, EdgeSpec, GraphEdge};
use crate::error::{GraphError, ResolutionFailure};
use crate::module::{GraphNode, ModuleKind};
use crate::module_id::ModuleId;
use crate::path::relative_to_root;
use crate::resolver::ResolvedModule;

impl DependencyGraph {
    /// Insert a module or replace its edges.
    ///
    /// Every specifier goes through the resolver again, so a file that
    /// appeared or vanished since the last update changes the target. The
    /// reverse index is only touched for targets that changed. When any edge
    /// cannot be resolved the call fails with every failure and the graph is
    /// not modified.
    pub fn add_or_update_node(
        &self,
        path: &str,
        kind: ModuleKind,
        edges: Vec<EdgeSpec>,
    ) -> Result<ModuleId, GraphError> {
        let (absolute, relative) = self.locate(path);
        let id = ModuleId::new(kind, &relative);

        let mut failures = Vec::new();
        let mut resolved_edges = Vec::with_capacity(edges.len());
        let mut specifier_map = BTreeMap::new();
        let mut discovered: Vec<(ModuleId, ResolvedModule)> = Vec::new();

        for spec in edges {
            let Some(resolved) = self.resolver.resolve(&spec.specifier, &absolute) else {
                failures.push(ResolutionFailure {
                    importer: relative.clone(),
                    specifier: spec.specifier,
                });
                continue;
            };
            let target_relative = relative_to_root(&self.root, &resolved.path);
            let target = ModuleId::new(resolved.kind, &target_relative);
            discovered.push((target.clone(), resolved));

            specifier_map.insert(spec.specifier.clone(), target.clone());
            resolved_edges.push(GraphEdge {
                from: id.clone(),
                to: target,
                kind: spec.kind,
                specifier: spec.specifier,
                metadata: spec.precedence.map(|precedence| EdgeMetadata { precedence }),
            });
        }

        if !failures.is_empty() {
            failures.sort();
            failures.dedup();
            return Err(GraphError::Unresolved(failures));
        }

        let mut inner = self.inner.write();

        let previous: BTreeSet<ModuleId> = inner
            .nodes
            .get(&id)
            .map(|node| node.targets().into_iter().collect())
            .unwrap_or_default();
        let current: BTreeSet<ModuleId> = resolved_edges.iter().map(|e| e.to.clone()).collect();

        for target in previous.difference(&current) {
            if let Some(importers) = inner.reverse.get_mut(target) {
                importers.remove(&id);
                if importers.is_empty() {
                    inner.reverse.remove(target);
                }
            }
        }
        for target in current.difference(&previous) {
            inner
                .reverse
                .entry(target.clone())
                .or_default()
                .insert(id.clone());
        }
        for (target, resolved) in discovered {
            inner.known.insert(target, resolved);
        }
        if previous != current {
            tracing::trace!(module = %relative, targets = current.len(), "edges rewired");
        }

        let is_entry = inner.entries.contains(&id);
        inner.by_path.insert(absolute.clone(), id.clone());
        inner.known.insert(
            id.clone(),
            ResolvedModule {
                path: absolute.clone(),
                kind,
            },
        );
        inner.nodes.insert(
            id.clone(),
            Arc::new(GraphNode {
                id: id.clone(),
                path: absolute,
                relative_path: relative,
                kind,
                edges: resolved_edges,
                specifier_map,
                is_entry,
            }),
        );

        Ok(id)
    }

    /// Mark a loaded module as an entry point.
    pub fn mark_entry(&self, id: &ModuleId) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::ModuleNotFound(id.clone()))?;
        inner.entries.insert(id.clone());
        if !node.is_entry {
            let mut node = (*node).clone();
            node.is_entry = true;
            inner.nodes.insert(id.clone(), Arc::new(node));
        }
        Ok(())
    }

    /// Drop a module, for example after its file was deleted.
    ///
    /// Importers keep their edges to it, so the graph reports them as
    /// dangling until they are rescanned.
    pub fn remove_node(&self, id: &ModuleId) -> Option<Arc<GraphNode>> {
        let mut inner = self.inner.write();
        let node = inner.nodes.remove(id)?;
        for target in node.targets() {
            if let Some(importers) = inner.reverse.get_mut(&target) {
                importers.remove(id);
                if importers.is_empty() {
                    inner.reverse.remove(&target);
                }
            }
        }
        inner.by_path.remove(&node.path);
        inner.entries.remove(id);
        tracing::debug!(module = %node.relative_path, "module removed");
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::edge::EdgeSpec;
    use crate::error::GraphError;
    use crate::memory::DependencyGraph;
    use crate::module::ModuleKind;
    use crate::resolver::RuntimeResolver;
    use crate::runtime::MemoryRuntime;

    fn graph() -> DependencyGraph {
        let runtime = MemoryRuntime::new("/p")
            .with_file("/p/main.js", "")
            .with_file("/p/a.js", "")
            .with_file("/p/b.js", "");
        DependencyGraph::new("/p", Arc::new(RuntimeResolver::new(Arc::new(runtime), "/p")))
    }

    #[test]
    fn test_unresolved_leaves_graph_untouched() {
        let graph = graph();
        let err = graph
            .add_or_update_node(
                "/p/main.js",
                ModuleKind::File,
                vec![
                    EdgeSpec::static_import("./a"),
                    EdgeSpec::static_import("./missing"),
                    EdgeSpec::static_import("lodash"),
                ],
            )
            .unwrap_err();

        match err {
            GraphError::Unresolved(failures) => {
                let specs: Vec<_> = failures.iter().map(|f| f.specifier.as_str()).collect();
                assert_eq!(specs, ["./missing", "lodash"]);
                assert_eq!(failures[0].importer, "main.js");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(graph.is_empty());
    }

    #[test]
    fn test_update_rewires_reverse_edges() {
        let graph = graph();
        let main = graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![EdgeSpec::static_import("./a")])
            .unwrap();
        let a = graph.id_for("/p/a.js", ModuleKind::File);
        let b = graph.id_for("/p/b.js", ModuleKind::File);
        assert_eq!(graph.reverse_edges(&a), vec![main.clone()]);

        graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![EdgeSpec::static_import("./b")])
            .unwrap();
        assert!(graph.reverse_edges(&a).is_empty());
        assert_eq!(graph.reverse_edges(&b), vec![main]);
    }

    #[test]
    fn test_update_resolves_specifiers_again() {
        let runtime = Arc::new(MemoryRuntime::new("/p").with_file("/p/main.js", "").with_file("/p/util.js", ""));
        let graph = DependencyGraph::new("/p", Arc::new(RuntimeResolver::new(runtime.clone(), "/p")));

        let main = graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![EdgeSpec::static_import("./util")])
            .unwrap();
        let util_js = graph
            .add_or_update_node("/p/util.js", ModuleKind::File, vec![])
            .unwrap();
        assert_eq!(graph.node(&main).unwrap().specifier_map["./util"], util_js);

        // the old target stays in the graph; only the file system changed
        runtime.remove("/p/util.js");
        runtime.insert("/p/util.ts", "");
        graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![EdgeSpec::static_import("./util")])
            .unwrap();

        let util_ts = graph.id_for("/p/util.ts", ModuleKind::File);
        assert_ne!(util_ts, util_js);
        assert_eq!(graph.node(&main).unwrap().specifier_map["./util"], util_ts);
        assert_eq!(graph.reverse_edges(&util_ts), vec![main]);
        assert!(graph.reverse_edges(&util_js).is_empty());
    }

    #[test]
    fn test_entry_flag_survives_update() {
        let graph = graph();
        let main = graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![])
            .unwrap();
        graph.mark_entry(&main).unwrap();
        graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![])
            .unwrap();
        assert!(graph.node(&main).unwrap().is_entry);
        assert_eq!(graph.entry_points(), vec![main]);
    }

    #[test]
    fn test_remove_node_leaves_dangling_importer() {
        let graph = graph();
        graph
            .add_or_update_node("/p/main.js", ModuleKind::File, vec![EdgeSpec::static_import("./a")])
            .unwrap();
        let a = graph
            .add_or_update_node("/p/a.js", ModuleKind::File, vec![])
            .unwrap();
        assert!(graph.validate().is_ok());

        graph.remove_node(&a);
        assert!(matches!(graph.validate(), Err(GraphError::DanglingEdge { .. })));
        assert_eq!(graph.reverse_edges(&a).len(), 1);
    }
}
