//! Graph stage: load every module reachable from the entries.
//!
//! Modules are loaded one at a time in a fixed order (entries in declaration
//! order, then unloaded targets sorted by path), so the graph and the
//! diagnostics come out identical on every run. A module that cannot be read
//! or parsed stays in the graph without edges and is marked failed; the chunk
//! that contains it fails later instead of the whole build.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use kiln_graph::{
    ContentHash, DependencyGraph, EdgeSpec, GraphError, ModuleId, ModuleKind, ModuleResolver,
    ResolvedModule, RuntimeResolver, hash_bytes, is_virtual, normalize_path,
    normalize_path_from, scan_dependencies,
};
use rustc_hash::FxHashSet as HashSet;

use super::BuildOptions;
use crate::context::{BuildContext, Stage};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::plugins::PluginRegistry;
use crate::{BuildError, Result};

/// Content of one loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub id: ModuleId,
    pub relative_path: String,
    pub kind: ModuleKind,
    pub bytes: Arc<[u8]>,
    pub content_hash: ContentHash,
}

impl LoadedModule {
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Result of the graph stage.
#[derive(Debug)]
pub(crate) struct GraphBuild {
    pub graph: DependencyGraph,
    /// Entry ids in declaration order, deduplicated.
    pub entries: Vec<ModuleId>,
    pub modules: BTreeMap<ModuleId, Arc<LoadedModule>>,
    pub failed: BTreeSet<ModuleId>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolver that asks `resolveId` plugins before probing the file system.
#[derive(Debug)]
pub(crate) struct PluginResolver {
    plugins: PluginRegistry,
    fallback: RuntimeResolver,
}

impl PluginResolver {
    pub(crate) fn new(options: &BuildOptions) -> Self {
        let fallback = RuntimeResolver::new(options.runtime.clone(), options.root_str())
            .with_virtual_modules(options.virtual_files.keys().cloned());
        Self {
            plugins: options.plugins.clone(),
            fallback,
        }
    }
}

impl ModuleResolver for PluginResolver {
    fn resolve(&self, specifier: &str, importer: &str) -> Option<ResolvedModule> {
        if !self.plugins.is_empty() {
            match self.plugins.resolve_id(specifier, importer) {
                Ok(Some(id)) => {
                    let path = if is_virtual(&id) { id } else { normalize_path(&id) };
                    return Some(ResolvedModule {
                        kind: ModuleKind::from_path(&path),
                        path,
                    });
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(specifier, importer, error = %err, "resolveId hook failed");
                    return None;
                }
            }
        }
        self.fallback.resolve(specifier, importer)
    }
}

struct Loader<'a> {
    options: &'a BuildOptions,
    graph: &'a DependencyGraph,
    ctx: &'a BuildContext,
    modules: BTreeMap<ModuleId, Arc<LoadedModule>>,
    failed: BTreeSet<ModuleId>,
    diagnostics: Vec<Diagnostic>,
}

impl Loader<'_> {
    async fn read(&self, path: &str) -> std::result::Result<Vec<u8>, String> {
        match self.options.plugins.load(path) {
            Ok(Some(content)) => return Ok(content.into_bytes()),
            Ok(None) => {}
            Err(err) => return Err(err.to_string()),
        }
        if let Some(content) = self.options.virtual_files.get(path) {
            return Ok(content.clone().into_bytes());
        }
        if is_virtual(path) {
            return Err(format!("no content provided for {path}"));
        }
        self.options
            .runtime
            .read_file(Path::new(path))
            .await
            .map_err(|err| err.to_string())
    }

    fn fail(&mut self, id: &ModuleId, diagnostic: Diagnostic) {
        self.ctx
            .report(Stage::Graph, "module-failed", &diagnostic.message);
        self.failed.insert(id.clone());
        self.diagnostics.push(diagnostic);
    }

    /// Load a resolved module once; later calls return the existing id.
    async fn load(&mut self, module: ResolvedModule) -> Result<ModuleId> {
        let (_, relative) = self.graph.locate(&module.path);
        let id = self.graph.id_for(&module.path, module.kind);
        if self.graph.contains(&id) {
            return Ok(id);
        }

        let bytes = match self.read(&module.path).await {
            Ok(bytes) => bytes,
            Err(message) => {
                self.fail(
                    &id,
                    Diagnostic::new(Stage::Graph, DiagnosticKind::Load, message)
                        .with_path(relative),
                );
                return Ok(self.graph.add_or_update_node(&module.path, module.kind, Vec::new())?);
            }
        };

        let edges = if module.kind == ModuleKind::StyleAsset {
            Vec::new()
        } else {
            match std::str::from_utf8(&bytes) {
                Ok(text) => match scan_dependencies(text, &relative, module.kind) {
                    Ok(edges) => edges,
                    Err(err) => {
                        self.fail(
                            &id,
                            Diagnostic::new(Stage::Graph, DiagnosticKind::Parse, err.to_string())
                                .with_path(relative.clone()),
                        );
                        Vec::new()
                    }
                },
                Err(_) => {
                    self.fail(
                        &id,
                        Diagnostic::new(
                            Stage::Graph,
                            DiagnosticKind::Parse,
                            format!("{relative} is not valid UTF-8"),
                        )
                        .with_path(relative.clone()),
                    );
                    Vec::new()
                }
            }
        };

        let id = self.insert(&module.path, module.kind, edges)?;
        tracing::debug!(module = %relative, kind = %module.kind, "loaded module");
        self.modules.insert(
            id.clone(),
            Arc::new(LoadedModule {
                id: id.clone(),
                relative_path: relative,
                kind: module.kind,
                content_hash: hash_bytes(&bytes),
                bytes: Arc::from(bytes),
            }),
        );
        Ok(id)
    }

    /// Add the node; edges that fail to resolve are recorded and dropped.
    fn insert(&mut self, path: &str, kind: ModuleKind, edges: Vec<EdgeSpec>) -> Result<ModuleId> {
        match self.graph.add_or_update_node(path, kind, edges.clone()) {
            Ok(id) => Ok(id),
            Err(GraphError::Unresolved(failures)) => {
                let id = self.graph.id_for(path, kind);
                let broken: HashSet<&str> =
                    failures.iter().map(|f| f.specifier.as_str()).collect();
                let kept: Vec<EdgeSpec> = edges
                    .into_iter()
                    .filter(|edge| !broken.contains(edge.specifier.as_str()))
                    .collect();
                for failure in &failures {
                    self.fail(
                        &id,
                        Diagnostic::unresolved_import(&failure.importer, &failure.specifier),
                    );
                }
                Ok(self.graph.add_or_update_node(path, kind, kept)?)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Resolve a declared entry the way an absolute import would be resolved.
fn resolve_entry(
    options: &BuildOptions,
    resolver: &PluginResolver,
    root: &str,
    entry: &str,
) -> Result<ResolvedModule> {
    let specifier = if is_virtual(entry) {
        entry.to_string()
    } else {
        normalize_path_from(root, entry)
    };
    let importer = format!("{root}/");
    resolver
        .resolve(&specifier, &importer)
        .or_else(|| {
            options.virtual_files.contains_key(entry).then(|| ResolvedModule {
                path: entry.to_string(),
                kind: ModuleKind::Virtual,
            })
        })
        .ok_or_else(|| BuildError::EntryNotFound {
            entry: entry.to_string(),
        })
}

pub(crate) async fn construct_graph(
    options: &BuildOptions,
    ctx: &BuildContext,
) -> Result<GraphBuild> {
    let root = options.root_str();
    let resolver = Arc::new(PluginResolver::new(options));
    let graph = DependencyGraph::new(&root, resolver.clone())
        .with_css_layers(options.css_layers.clone());

    let mut loader = Loader {
        options,
        graph: &graph,
        ctx,
        modules: BTreeMap::new(),
        failed: BTreeSet::new(),
        diagnostics: Vec::new(),
    };

    let mut entries: Vec<ModuleId> = Vec::with_capacity(options.entries.len());
    for entry in &options.entries {
        let resolved = resolve_entry(options, &resolver, &root, entry)?;
        let id = loader.load(resolved).await?;
        graph.mark_entry(&id)?;
        if !entries.contains(&id) {
            entries.push(id);
        }
    }

    loop {
        let pending = graph.unloaded_targets();
        if pending.is_empty() {
            break;
        }
        for target in pending {
            loader.load(target).await?;
        }
    }

    graph.validate()?;

    let Loader {
        modules,
        failed,
        diagnostics,
        ..
    } = loader;

    tracing::info!(
        modules = graph.len(),
        entries = entries.len(),
        failed = failed.len(),
        "graph constructed"
    );
    ctx.report(
        Stage::Graph,
        "graph-ready",
        &format!("{} modules, {} failed", graph.len(), failed.len()),
    );

    Ok(GraphBuild {
        graph,
        entries,
        modules,
        failed,
        diagnostics,
    })
}

/// Outcome of re-reading one module after it changed on disk.
#[derive(Debug)]
pub(crate) struct Refresh {
    /// New text; `None` when the module could not be read as UTF-8.
    pub source: Option<String>,
    /// The module was read but could not be scanned or resolved.
    pub failed: bool,
    /// Modules reached for the first time through the new imports.
    pub loaded: BTreeMap<ModuleId, Arc<LoadedModule>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Re-read and re-scan a module already in `graph`, then load any module its
/// new imports reach for the first time.
pub(crate) async fn refresh_module(
    options: &BuildOptions,
    graph: &DependencyGraph,
    ctx: &BuildContext,
    path: &str,
    kind: ModuleKind,
) -> Result<Refresh> {
    let mut loader = Loader {
        options,
        graph,
        ctx,
        modules: BTreeMap::new(),
        failed: BTreeSet::new(),
        diagnostics: Vec::new(),
    };
    let (_, relative) = graph.locate(path);

    let source = match loader.read(path).await {
        Ok(bytes) => String::from_utf8(bytes).ok(),
        Err(message) => {
            tracing::debug!(module = %relative, error = %message, "changed module unreadable");
            None
        }
    };
    let Some(text) = source else {
        return Ok(Refresh {
            source: None,
            failed: true,
            loaded: BTreeMap::new(),
            diagnostics: Vec::new(),
        });
    };

    match scan_dependencies(&text, &relative, kind) {
        Ok(edges) => {
            loader.insert(path, kind, edges)?;
        }
        Err(err) => {
            let id = graph.id_for(path, kind);
            loader.fail(
                &id,
                Diagnostic::new(Stage::Graph, DiagnosticKind::Parse, err.to_string())
                    .with_path(relative),
            );
        }
    }

    loop {
        let pending = graph.unloaded_targets();
        if pending.is_empty() {
            break;
        }
        for target in pending {
            loader.load(target).await?;
        }
    }

    Ok(Refresh {
        source: Some(text),
        failed: !loader.failed.is_empty(),
        loaded: loader.modules,
        diagnostics: loader.diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_graph::MemoryRuntime;

    fn options(runtime: MemoryRuntime) -> BuildOptions {
        BuildOptions::new("/p")
            .runtime(Arc::new(runtime))
            .write(false)
    }

    #[tokio::test]
    async fn loads_transitive_imports() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("/p/src/main.ts", "import { a } from './a';\nimport './style.css';")
            .with_file("/p/src/a.ts", "export const a = 1;")
            .with_file("/p/src/style.css", "body { color: red; }");
        let build = construct_graph(&options(runtime).entry("src/main.ts"), &BuildContext::default())
            .await
            .unwrap();

        assert_eq!(build.graph.len(), 3);
        assert_eq!(build.entries.len(), 1);
        assert!(build.diagnostics.is_empty());
        let paths: Vec<&str> = build
            .modules
            .values()
            .map(|m| m.relative_path.as_str())
            .collect();
        assert!(paths.contains(&"src/style.css"));
    }

    #[tokio::test]
    async fn unresolved_import_is_a_diagnostic() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("/p/src/main.ts", "import './missing';\nexport const x = 1;");
        let build = construct_graph(&options(runtime).entry("src/main.ts"), &BuildContext::default())
            .await
            .unwrap();

        assert_eq!(build.diagnostics.len(), 1);
        assert_eq!(build.diagnostics[0].kind, DiagnosticKind::UnresolvedImport);
        assert_eq!(build.diagnostics[0].specifier.as_deref(), Some("./missing"));
        assert!(build.failed.contains(&build.entries[0]));
        assert!(build.graph.validate().is_ok());
    }

    #[tokio::test]
    async fn missing_entry_is_fatal() {
        let runtime = MemoryRuntime::new("/p");
        let err = construct_graph(&options(runtime).entry("src/nope.ts"), &BuildContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::EntryNotFound { .. }));
    }

    #[tokio::test]
    async fn virtual_entries_load_from_options() {
        let runtime = MemoryRuntime::new("/p").with_file("/p/src/a.ts", "export const a = 1;");
        let options = options(runtime)
            .virtual_file("virtual:entry", "import './src/a';")
            .entry("virtual:entry");
        let build = construct_graph(&options, &BuildContext::default())
            .await
            .unwrap();
        assert_eq!(build.graph.len(), 2);
        assert_eq!(build.entries[0].as_str().len(), 16);
    }

    #[tokio::test]
    async fn parse_errors_fail_the_module_only() {
        let runtime = MemoryRuntime::new("/p")
            .with_file("/p/src/main.ts", "import './broken';")
            .with_file("/p/src/broken.ts", "export const = ;");
        let build = construct_graph(&options(runtime).entry("src/main.ts"), &BuildContext::default())
            .await
            .unwrap();
        assert_eq!(build.failed.len(), 1);
        assert_eq!(build.diagnostics[0].kind, DiagnosticKind::Parse);
        assert_eq!(build.diagnostics[0].path.as_deref(), Some("src/broken.ts"));
    }
}
