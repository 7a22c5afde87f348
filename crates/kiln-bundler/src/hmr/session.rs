use std::collections::BTreeSet;

use kiln_graph::{DependencyGraph, ModuleId, analyze_exports, is_self_accepting};

use super::{HmrBatch, HmrEngine, ModuleChange};
use crate::context::BuildContext;
use crate::diagnostics::Diagnostic;
use crate::pipeline::{BuildOptions, LoadedModule, construct_graph, refresh_module};
use crate::Result;

/// Long-lived state of a development server.
///
/// Holds the dependency graph of the last load and the [`HmrEngine`] primed
/// with every module's export shape. File-change events go through
/// [`handle_changes`](Self::handle_changes), which updates the graph in place
/// and returns the decisions for the batch.
#[derive(Debug)]
pub struct DevSession {
    options: BuildOptions,
    graph: DependencyGraph,
    engine: HmrEngine,
    diagnostics: Vec<Diagnostic>,
}

impl DevSession {
    /// Load the graph and record the initial shape of every module.
    pub async fn start(options: BuildOptions, ctx: &BuildContext) -> Result<Self> {
        options.validate()?;
        let loaded = construct_graph(&options, ctx).await?;

        let mut engine = HmrEngine::new();
        for module in loaded.modules.values() {
            prime_module(&mut engine, &loaded.graph, module);
        }

        tracing::info!(
            modules = loaded.graph.len(),
            failed = loaded.failed.len(),
            "dev session started"
        );
        Ok(Self {
            options,
            graph: loaded.graph,
            engine,
            diagnostics: loaded.diagnostics,
        })
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn engine(&self) -> &HmrEngine {
        &self.engine
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Diagnostics from the initial load and the most recent batch.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Decide a batch of changed paths.
    ///
    /// Paths may be absolute or relative to the root. Paths that are not in
    /// the graph are ignored; a batch that touches no known module is empty.
    pub async fn handle_changes<P: AsRef<str>>(
        &mut self,
        paths: &[P],
        ctx: &BuildContext,
    ) -> Result<HmrBatch> {
        self.diagnostics.clear();
        let mut changes: Vec<ModuleChange> = Vec::with_capacity(paths.len());

        for path in paths {
            let Some(node) = self.graph.node_by_path(path.as_ref()) else {
                tracing::debug!(path = path.as_ref(), "change outside the graph");
                continue;
            };

            let refresh =
                refresh_module(&self.options, &self.graph, ctx, &node.path, node.kind).await?;
            let source = if refresh.failed { None } else { refresh.source };
            self.diagnostics.extend(refresh.diagnostics);

            for (id, module) in &refresh.loaded {
                prime_module(&mut self.engine, &self.graph, module);
                // targets that were already known have no edge back yet
                for target in self.graph.dependencies(id) {
                    self.engine
                        .ensure_node(&self.graph, &target)
                        .importers
                        .insert(id.clone());
                }
            }
            if !refresh.loaded.is_empty() {
                tracing::debug!(
                    module = %node.relative_path,
                    loaded = refresh.loaded.len(),
                    "new imports loaded"
                );
            }

            let imported: BTreeSet<ModuleId> =
                self.graph.dependencies(&node.id).into_iter().collect();
            for target in &imported {
                self.engine.ensure_node(&self.graph, target);
            }
            self.engine.ensure_node(&self.graph, &node.id);
            self.engine.sync_imports(&node.id, imported);

            changes.push(ModuleChange {
                id: node.id.clone(),
                path: node.relative_path.clone(),
                kind: node.kind,
                source,
            });
        }

        let batch = self.engine.decide_batch(&self.graph, &changes, ctx);
        if let Some(decision) = batch.decision() {
            tracing::info!(changes = changes.len(), decision = %decision, "hmr batch decided");
        }
        Ok(batch)
    }

    /// The client finished a full reload; commit the shapes it picked up.
    pub fn complete_reload(&mut self) {
        self.engine.complete_reload();
    }
}

/// Record the shape and self-acceptance of a freshly loaded module.
fn prime_module(engine: &mut HmrEngine, graph: &DependencyGraph, module: &LoadedModule) {
    let Some(text) = module.text() else {
        engine.ensure_node(graph, &module.id);
        return;
    };
    // modules that fail analysis get no shape; their first change decides
    let Ok(exports) = analyze_exports(text, &module.relative_path, module.kind) else {
        engine.ensure_node(graph, &module.id);
        return;
    };
    let accepting = module.kind.is_script() && is_self_accepting(text, &module.relative_path);
    engine.prime(graph, &module.id, exports.shape_hash(), accepting);
}
