//! Execute stage: turn planned chunks into artifacts.
//!
//! Chunks run in waves derived from the plan; every chunk of a wave only
//! depends on earlier waves, so a wave's chunks run concurrently on a
//! `JoinSet` bounded by a semaphore. Results are collected by chunk id, never
//! by completion order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kiln_config::{Mode, Target};
use kiln_graph::ModuleId;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::graph::LoadedModule;
use crate::artifact::{ArtifactType, BuildArtifact};
use crate::cache::{CacheEntry, CacheKey, CacheLayer, CacheTier, CachedFile};
use crate::context::{BuildContext, Stage};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::plan::{BuildPlan, PlannedChunk};
use crate::plugins::PluginRegistry;
use crate::transform::{TransformRequest, Transformer};
use crate::{BuildError, Result};

/// State shared by every chunk task of one build.
#[derive(Debug)]
pub(crate) struct ExecuteShared {
    pub modules: BTreeMap<ModuleId, Arc<LoadedModule>>,
    pub failed: BTreeSet<ModuleId>,
    pub transformer: Arc<dyn Transformer>,
    pub plugins: PluginRegistry,
    pub cache: CacheLayer,
    pub target: Target,
    pub mode: Mode,
}

#[derive(Debug, Default)]
pub(crate) struct ExecuteOutcome {
    /// Chunk and stylesheet artifacts, ordered by chunk id.
    pub artifacts: Vec<BuildArtifact>,
    pub failed_chunks: BTreeSet<String>,
    pub diagnostics: Vec<Diagnostic>,
}

type ChunkResult = std::result::Result<Vec<BuildArtifact>, Vec<Diagnostic>>;

pub(crate) async fn execute(
    plan: &BuildPlan,
    shared: Arc<ExecuteShared>,
    max_parallel: usize,
    ctx: &BuildContext,
) -> Result<ExecuteOutcome> {
    let semaphore = Arc::new(Semaphore::new(max_parallel));
    let mut outcome = ExecuteOutcome::default();
    // chunk id -> (type, file name) of its artifacts
    let mut emitted: BTreeMap<String, Vec<(ArtifactType, String)>> = BTreeMap::new();

    for (index, wave) in plan.waves().into_iter().enumerate() {
        if ctx.abort.is_aborted() {
            ctx.report(Stage::Execute, "cancelled", &format!("before wave {index}"));
            return Err(BuildError::Cancelled);
        }

        let mut join_set = JoinSet::new();
        for chunk in wave {
            if let Some(dep) = chunk
                .dependencies
                .iter()
                .find(|dep| outcome.failed_chunks.contains(*dep))
            {
                outcome.diagnostics.push(Diagnostic::new(
                    Stage::Execute,
                    DiagnosticKind::DependencyFailed,
                    format!("chunk '{}' skipped: dependency '{}' failed", chunk.id, dep),
                ));
                outcome.failed_chunks.insert(chunk.id.clone());
                continue;
            }

            let dep_files: Vec<(ArtifactType, String)> = chunk
                .dependencies
                .iter()
                .filter_map(|dep| emitted.get(dep))
                .flatten()
                .cloned()
                .collect();
            let chunk = chunk.clone();
            let shared = Arc::clone(&shared);
            let permit = Arc::clone(&semaphore);
            let ctx = ctx.clone();

            join_set.spawn(async move {
                let id = chunk.id.clone();
                let Ok(_permit) = permit.acquire().await else {
                    let diag = Diagnostic::new(
                        Stage::Execute,
                        DiagnosticKind::Other("SchedulerClosed".into()),
                        format!("chunk '{id}' could not be scheduled"),
                    );
                    return (id, Some(Err(vec![diag])));
                };
                // queued chunks stop here; started ones run to completion
                if ctx.abort.is_aborted() {
                    return (id, None);
                }
                let result = run_chunk(&shared, &chunk, &dep_files, &ctx).await;
                (id, Some(result))
            });
        }

        let mut results: BTreeMap<String, ChunkResult> = BTreeMap::new();
        let mut skipped = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, Some(result))) => {
                    results.insert(id, result);
                }
                Ok((_, None)) => skipped += 1,
                Err(join_err) => {
                    outcome.diagnostics.push(Diagnostic::new(
                        Stage::Execute,
                        DiagnosticKind::Other("PanicDuringBuild".into()),
                        format!("chunk task panicked: {join_err}"),
                    ));
                }
            }
        }

        if ctx.abort.is_aborted() {
            ctx.report(
                Stage::Execute,
                "cancelled",
                &format!("during wave {index}, {skipped} chunks not started"),
            );
            return Err(BuildError::Cancelled);
        }

        for (id, result) in results {
            match result {
                Ok(artifacts) => {
                    emitted.insert(
                        id,
                        artifacts
                            .iter()
                            .map(|a| (a.artifact_type, a.file_name.clone()))
                            .collect(),
                    );
                    outcome.artifacts.extend(artifacts);
                }
                Err(diagnostics) => {
                    ctx.report(Stage::Execute, "chunk-failed", &id);
                    outcome.diagnostics.extend(diagnostics);
                    outcome.failed_chunks.insert(id);
                }
            }
        }
    }

    // a panicked task never reported back
    for chunk in &plan.chunks {
        if !emitted.contains_key(&chunk.id) {
            outcome.failed_chunks.insert(chunk.id.clone());
        }
    }

    Ok(outcome)
}

async fn run_chunk(
    shared: &ExecuteShared,
    chunk: &PlannedChunk,
    dep_files: &[(ArtifactType, String)],
    ctx: &BuildContext,
) -> ChunkResult {
    if let Some(bad) = chunk.modules.iter().find(|id| shared.failed.contains(*id)) {
        let path = shared
            .modules
            .get(bad)
            .map(|m| m.relative_path.clone())
            .unwrap_or_else(|| bad.to_string());
        return Err(vec![
            Diagnostic::new(
                Stage::Execute,
                DiagnosticKind::DependencyFailed,
                format!("chunk '{}' skipped: module {path} failed", chunk.id),
            )
            .with_path(path),
        ]);
    }

    let mut diagnostics = Vec::new();
    let mut scripts: Vec<(&LoadedModule, String)> = Vec::new();
    let mut styles: Vec<(&LoadedModule, String)> = Vec::new();

    for id in &chunk.modules {
        let Some(module) = shared.modules.get(id) else {
            continue;
        };
        if !module.kind.is_script() {
            continue;
        }
        match transform_module(shared, module).await {
            Ok(code) => scripts.push((module, code)),
            Err(diag) => diagnostics.push(diag),
        }
    }
    for id in &chunk.styles {
        let Some(module) = shared.modules.get(id) else {
            continue;
        };
        match transform_module(shared, module).await {
            Ok(code) => styles.push((module, code)),
            Err(diag) => diagnostics.push(diag),
        }
    }
    if !diagnostics.is_empty() {
        return Err(diagnostics);
    }

    let mut artifacts = Vec::with_capacity(2);

    if !scripts.is_empty() {
        let code = shared
            .plugins
            .render_chunk(&chunk.id, concat(&scripts))
            .map_err(|err| {
                vec![Diagnostic::new(Stage::Optimize, DiagnosticKind::Plugin, err.to_string())]
            })?;
        artifacts.push(
            BuildArtifact::new(ArtifactType::Chunk, &chunk.output_name, "js", code.into_bytes())
                .with_dependencies(files_of(dep_files, ArtifactType::Chunk))
                .with_modules(scripts.iter().map(|(m, _)| m.id.clone()).collect())
                .with_chunk(&chunk.id),
        );
    }

    if !styles.is_empty() {
        artifacts.push(
            BuildArtifact::new(
                ArtifactType::Stylesheet,
                &chunk.output_name,
                "css",
                concat(&styles).into_bytes(),
            )
            .with_dependencies(files_of(dep_files, ArtifactType::Stylesheet))
            .with_modules(styles.iter().map(|(m, _)| m.id.clone()).collect())
            .with_chunk(&chunk.id),
        );
    }

    ctx.report(
        Stage::Execute,
        "chunk-built",
        &format!("{} ({} modules)", chunk.id, chunk.modules.len()),
    );
    Ok(artifacts)
}

/// Transformer output for one module (artifact tier), then the
/// `transformModule` hooks.
async fn transform_module(
    shared: &ExecuteShared,
    module: &LoadedModule,
) -> std::result::Result<String, Diagnostic> {
    let key = CacheKey::from_parts(
        CacheTier::Artifact,
        [
            shared.transformer.id(),
            module.relative_path.as_str(),
            module.content_hash.as_str(),
            shared.target.as_str(),
            shared.mode.as_str(),
        ],
    );

    let cached = shared
        .cache
        .lookup(Stage::Execute, &key)
        .and_then(|entry| entry.file("code").map(|f| f.bytes.clone()))
        .and_then(|bytes| String::from_utf8(bytes).ok());

    let code = match cached {
        Some(code) => code,
        None => {
            let content = module.text().ok_or_else(|| {
                Diagnostic::new(
                    Stage::Execute,
                    DiagnosticKind::Transform,
                    "module is not valid UTF-8",
                )
                .with_path(module.relative_path.clone())
            })?;
            let output = shared
                .transformer
                .transform(TransformRequest {
                    path: module.relative_path.clone(),
                    content: content.to_string(),
                    target: shared.target,
                    mode: shared.mode,
                })
                .await
                .map_err(|failure| {
                    Diagnostic::new(Stage::Execute, DiagnosticKind::Transform, failure.message)
                        .with_path(module.relative_path.clone())
                })?;

            let mut files = vec![CachedFile::new("code", output.code.clone())];
            if let Some(map) = output.map {
                files.push(CachedFile::new("map", map));
            }
            shared
                .cache
                .store(Stage::Execute, CacheEntry::new(&key, "", files));
            output.code
        }
    };

    shared
        .plugins
        .transform(&module.relative_path, code)
        .map_err(|err| {
            Diagnostic::new(Stage::Execute, DiagnosticKind::Plugin, err.to_string())
                .with_path(module.relative_path.clone())
        })
}

/// Modules in order, each behind a `/* <id> <path> */` header.
fn concat(parts: &[(&LoadedModule, String)]) -> String {
    let mut out = String::new();
    for (module, code) in parts {
        out.push_str(&format!("/* {} {} */\n", module.id, module.relative_path));
        out.push_str(code);
        if !code.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn files_of(files: &[(ArtifactType, String)], wanted: ArtifactType) -> Vec<String> {
    files
        .iter()
        .filter(|(kind, _)| *kind == wanted)
        .map(|(_, name)| name.clone())
        .collect()
}
