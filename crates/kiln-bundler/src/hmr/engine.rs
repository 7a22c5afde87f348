use std::collections::{BTreeMap, BTreeSet};

use kiln_graph::{ContentHash, DependencyGraph, ModuleId, analyze_exports, is_self_accepting};
use rustc_hash::FxHashMap as HashMap;

use super::{HmrBatch, HmrDecision, ModuleChange, ModuleNode};
use crate::context::{BuildContext, Stage};

/// Classifies module changes.
///
/// Owns the export-shape cache: the last committed shape hash per module.
/// A shape is committed as the last step of a decision; a changed shape is
/// parked until [`complete_reload`](Self::complete_reload) confirms the
/// reload happened.
#[derive(Debug, Default)]
pub struct HmrEngine {
    nodes: HashMap<ModuleId, ModuleNode>,
    shapes: HashMap<ModuleId, ContentHash>,
    pending: HashMap<ModuleId, ContentHash>,
}

impl HmrEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: &ModuleId) -> Option<&ModuleNode> {
        self.nodes.get(id)
    }

    /// Last committed export-shape hash of a module.
    pub fn shape(&self, id: &ModuleId) -> Option<&ContentHash> {
        self.shapes.get(id)
    }

    pub fn has_pending_reload(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Record a module's shape and self-acceptance without deciding anything.
    pub fn prime(&mut self, graph: &DependencyGraph, id: &ModuleId, shape: ContentHash, self_accepting: bool) {
        self.ensure_node(graph, id).is_self_accepting = self_accepting;
        self.shapes.insert(id.clone(), shape);
    }

    /// Node for `id`, created from the graph's edges on first use.
    pub fn ensure_node(&mut self, graph: &DependencyGraph, id: &ModuleId) -> &mut ModuleNode {
        self.nodes.entry(id.clone()).or_insert_with(|| ModuleNode {
            id: id.clone(),
            importers: graph.reverse_edges(id).into_iter().collect(),
            imported: graph.dependencies(id).into_iter().collect(),
            is_self_accepting: false,
            last_hmr_timestamp: None,
        })
    }

    /// Replace what `id` imports and patch the importer sets of both the old
    /// and the new targets.
    pub fn sync_imports(&mut self, id: &ModuleId, imported: BTreeSet<ModuleId>) {
        let previous = match self.nodes.get_mut(id) {
            Some(node) => std::mem::replace(&mut node.imported, imported.clone()),
            None => return,
        };
        for gone in previous.difference(&imported) {
            if let Some(target) = self.nodes.get_mut(gone) {
                target.importers.remove(id);
            }
        }
        for added in imported.difference(&previous) {
            if let Some(target) = self.nodes.get_mut(added) {
                target.importers.insert(id.clone());
            }
        }
    }

    /// Commit every shape held back by a shape-change reload.
    pub fn complete_reload(&mut self) {
        for (id, shape) in self.pending.drain() {
            self.shapes.insert(id, shape);
        }
    }

    /// Decide one change.
    ///
    /// Never fails: anything that prevents a decision yields a reload.
    pub fn decide(
        &mut self,
        graph: &DependencyGraph,
        change: &ModuleChange,
        ctx: &BuildContext,
    ) -> HmrDecision {
        let decision = self.classify(graph, change);
        tracing::debug!(module = %change.path, decision = %decision, "hmr decision");
        ctx.report(Stage::Hmr, decision.name(), &format!("{}: {decision}", change.path));
        decision
    }

    fn classify(&mut self, graph: &DependencyGraph, change: &ModuleChange) -> HmrDecision {
        let Some(source) = change.source.as_deref() else {
            return HmrDecision::reload(format!("{} could not be read", change.path));
        };
        let shape = match analyze_exports(source, &change.path, change.kind) {
            Ok(exports) => exports.shape_hash(),
            Err(err) => return HmrDecision::reload(format!("analysis failed: {err}")),
        };

        // acceptance follows the newest source even when this change reloads
        let self_accepting = change.kind.is_script() && is_self_accepting(source, &change.path);
        let importers = {
            let node = self.ensure_node(graph, &change.id);
            node.is_self_accepting = self_accepting;
            node.importers.clone()
        };

        // a newer event supersedes anything parked for this module
        self.pending.remove(&change.id);
        if let Some(previous) = self.shapes.get(&change.id) {
            if *previous != shape {
                self.pending.insert(change.id.clone(), shape);
                return HmrDecision::reload(format!("export shape of {} changed", change.path));
            }
        }

        let decision = if self_accepting {
            HmrDecision::HotUpdate {
                boundaries: vec![change.id.clone()],
            }
        } else if change.kind.is_stylesheet() {
            HmrDecision::StyleUpdate {
                module: change.id.clone(),
            }
        } else {
            let boundaries: Vec<ModuleId> = importers
                .iter()
                .filter(|importer| {
                    self.nodes
                        .get(*importer)
                        .is_some_and(|node| node.is_self_accepting)
                })
                .cloned()
                .collect();
            if boundaries.is_empty() {
                let reason = if importers.is_empty() {
                    format!("{} has no importers", change.path)
                } else {
                    format!("no importer of {} accepts updates", change.path)
                };
                HmrDecision::reload(reason)
            } else {
                HmrDecision::HotUpdate { boundaries }
            }
        };

        self.shapes.insert(change.id.clone(), shape);
        if !decision.is_reload() {
            let now = chrono::Utc::now().timestamp_millis();
            if let Some(node) = self.nodes.get_mut(&change.id) {
                node.last_hmr_timestamp = Some(now);
            }
        }
        decision
    }

    /// Decide a batch. Later events for the same module replace earlier ones.
    pub fn decide_batch(
        &mut self,
        graph: &DependencyGraph,
        changes: &[ModuleChange],
        ctx: &BuildContext,
    ) -> HmrBatch {
        let mut latest: BTreeMap<&ModuleId, &ModuleChange> = BTreeMap::new();
        for change in changes {
            latest.insert(&change.id, change);
        }
        let decisions: Vec<(ModuleId, HmrDecision)> = latest
            .into_iter()
            .map(|(id, change)| (id.clone(), self.decide(graph, change, ctx)))
            .collect();
        let batch = HmrBatch { decisions };
        if batch.is_reload() {
            ctx.report(Stage::Hmr, "batch-reload", "at least one change needs a reload");
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MemoryReporter;
    use kiln_graph::{EdgeSpec, MemoryRuntime, ModuleKind, RuntimeResolver};
    use std::sync::Arc;

    struct Fixture {
        graph: DependencyGraph,
        engine: HmrEngine,
        ctx: BuildContext,
        reporter: Arc<MemoryReporter>,
    }

    // main.ts -> app.tsx (self-accepting) -> util.ts
    //         -> theme.css
    fn fixture() -> Fixture {
        let runtime = MemoryRuntime::new("/p")
            .with_file("/p/src/main.ts", "")
            .with_file("/p/src/app.tsx", "")
            .with_file("/p/src/util.ts", "")
            .with_file("/p/src/theme.css", "");
        let resolver = Arc::new(RuntimeResolver::new(Arc::new(runtime), "/p"));
        let graph = DependencyGraph::new("/p", resolver);

        graph.add_or_update_node("src/util.ts", ModuleKind::File, vec![]).unwrap();
        graph.add_or_update_node("src/theme.css", ModuleKind::Css, vec![]).unwrap();
        graph
            .add_or_update_node(
                "src/app.tsx",
                ModuleKind::File,
                vec![EdgeSpec::static_import("./util")],
            )
            .unwrap();
        let main = graph
            .add_or_update_node(
                "src/main.ts",
                ModuleKind::File,
                vec![
                    EdgeSpec::static_import("./app"),
                    EdgeSpec::static_import("./theme.css"),
                ],
            )
            .unwrap();
        graph.mark_entry(&main).unwrap();

        let reporter = Arc::new(MemoryReporter::new());
        let ctx = BuildContext::new(reporter.clone());
        let mut engine = HmrEngine::new();
        for (path, source) in [
            ("src/util.ts", "export const add = (a, b) => a + b;"),
            ("src/app.tsx", "export default function App() {}\nimport.meta.hot.accept();"),
            ("src/main.ts", "import './app';"),
        ] {
            let id = graph.id_for(path, ModuleKind::File);
            let shape = analyze_exports(source, path, ModuleKind::File).unwrap().shape_hash();
            engine.prime(&graph, &id, shape, is_self_accepting(source, path));
        }

        Fixture {
            graph,
            engine,
            ctx,
            reporter,
        }
    }

    fn change(graph: &DependencyGraph, path: &str, kind: ModuleKind, source: &str) -> ModuleChange {
        ModuleChange {
            id: graph.id_for(path, kind),
            path: path.to_string(),
            kind,
            source: Some(source.to_string()),
        }
    }

    #[test]
    fn self_accepting_leaf_updates_itself() {
        let mut f = fixture();
        let c = change(
            &f.graph,
            "src/app.tsx",
            ModuleKind::File,
            "export default function App() { return 1; }\nimport.meta.hot.accept();",
        );
        let decision = f.engine.decide(&f.graph, &c, &f.ctx);
        assert_eq!(
            decision,
            HmrDecision::HotUpdate {
                boundaries: vec![c.id.clone()]
            }
        );
        assert!(f.engine.node(&c.id).unwrap().last_hmr_timestamp.is_some());
        assert_eq!(f.reporter.decisions(Stage::Hmr), vec!["hot-update".to_string()]);
    }

    #[test]
    fn update_bubbles_to_accepting_importer() {
        let mut f = fixture();
        let c = change(
            &f.graph,
            "src/util.ts",
            ModuleKind::File,
            "export const add = (a, b) => b + a;",
        );
        let app = f.graph.id_for("src/app.tsx", ModuleKind::File);
        assert_eq!(
            f.engine.decide(&f.graph, &c, &f.ctx),
            HmrDecision::HotUpdate {
                boundaries: vec![app]
            }
        );
    }

    #[test]
    fn new_export_forces_reload_and_parks_shape() {
        let mut f = fixture();
        let before = f.engine.shape(&f.graph.id_for("src/app.tsx", ModuleKind::File)).cloned();
        let c = change(
            &f.graph,
            "src/app.tsx",
            ModuleKind::File,
            "export default function App() {}\nexport const extra = 1;\nimport.meta.hot.accept();",
        );
        assert!(f.engine.decide(&f.graph, &c, &f.ctx).is_reload());
        assert_eq!(f.engine.shape(&c.id).cloned(), before);
        assert!(f.engine.has_pending_reload());

        f.engine.complete_reload();
        assert_ne!(f.engine.shape(&c.id).cloned(), before);
        assert!(!f.engine.decide(&f.graph, &c, &f.ctx).is_reload());
    }

    #[test]
    fn accept_added_with_new_export_survives_the_reload() {
        let mut f = fixture();
        let util = f.graph.id_for("src/util.ts", ModuleKind::File);
        assert!(!f.engine.node(&util).unwrap().is_self_accepting);

        let c = change(
            &f.graph,
            "src/util.ts",
            ModuleKind::File,
            "export const add = (a, b) => a + b;\nexport const sub = (a, b) => a - b;\nimport.meta.hot.accept();",
        );
        assert!(f.engine.decide(&f.graph, &c, &f.ctx).is_reload());
        assert!(f.engine.node(&util).unwrap().is_self_accepting);

        f.engine.complete_reload();
        let edit = change(
            &f.graph,
            "src/util.ts",
            ModuleKind::File,
            "export const add = (a, b) => b + a;\nexport const sub = (a, b) => a - b;\nimport.meta.hot.accept();",
        );
        assert_eq!(
            f.engine.decide(&f.graph, &edit, &f.ctx),
            HmrDecision::HotUpdate {
                boundaries: vec![util]
            }
        );
    }

    #[test]
    fn entry_without_importers_reloads() {
        let mut f = fixture();
        let c = change(&f.graph, "src/main.ts", ModuleKind::File, "import './app';\n");
        match f.engine.decide(&f.graph, &c, &f.ctx) {
            HmrDecision::Reload { reason } => assert!(reason.contains("no importers")),
            other => panic!("expected reload, got {other:?}"),
        }
    }

    #[test]
    fn stylesheets_swap_in_place() {
        let mut f = fixture();
        let c = change(&f.graph, "src/theme.css", ModuleKind::Css, "body { color: blue; }");
        assert_eq!(
            f.engine.decide(&f.graph, &c, &f.ctx),
            HmrDecision::StyleUpdate { module: c.id.clone() }
        );
    }

    #[test]
    fn unreadable_file_reloads() {
        let mut f = fixture();
        let mut c = change(&f.graph, "src/util.ts", ModuleKind::File, "");
        c.source = None;
        assert!(f.engine.decide(&f.graph, &c, &f.ctx).is_reload());
    }

    #[test]
    fn batch_with_one_reload_reloads() {
        let mut f = fixture();
        let changes = vec![
            change(&f.graph, "src/theme.css", ModuleKind::Css, "a {}"),
            change(&f.graph, "src/main.ts", ModuleKind::File, "import './app';"),
        ];
        let batch = f.engine.decide_batch(&f.graph, &changes, &f.ctx);
        assert_eq!(batch.decisions.len(), 2);
        assert!(batch.is_reload());
        assert!(batch.decision().unwrap().is_reload());
    }

    #[test]
    fn later_event_for_same_file_wins() {
        let mut f = fixture();
        let changes = vec![
            change(&f.graph, "src/util.ts", ModuleKind::File, "export const add = 1; export const x = 2;"),
            change(&f.graph, "src/util.ts", ModuleKind::File, "export const add = (a, b) => a - b;"),
        ];
        let batch = f.engine.decide_batch(&f.graph, &changes, &f.ctx);
        assert_eq!(batch.decisions.len(), 1);
        assert!(!batch.is_reload());
    }

    #[test]
    fn sync_imports_moves_importers() {
        let mut f = fixture();
        let main = f.graph.id_for("src/main.ts", ModuleKind::File);
        let util = f.graph.id_for("src/util.ts", ModuleKind::File);
        let app = f.graph.id_for("src/app.tsx", ModuleKind::File);

        f.engine.sync_imports(&main, BTreeSet::from([util.clone()]));
        assert!(f.engine.node(&util).unwrap().importers.contains(&main));
        assert!(!f.engine.node(&app).unwrap().importers.contains(&main));
    }
}
