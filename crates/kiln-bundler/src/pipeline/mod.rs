//! The build pipeline.
//!
//! `init → graph → input fingerprint → plan → execute → optimize → emit →
//! build fingerprint → buildEnd`. Each cacheable stage first consults its
//! tier; a hit on the input tier skips everything after it.

mod emit;
mod execute;
mod graph;
mod options;

pub use emit::{MANIFEST_FILE, Manifest, ManifestEntry, emit};
pub use graph::LoadedModule;
pub use options::BuildOptions;

pub(crate) use graph::{GraphBuild, construct_graph, refresh_module};

use std::collections::BTreeSet;
use std::sync::Arc;

use kiln_graph::{ContentHash, DependencyGraph, ModuleId};

use crate::artifact::{ArtifactType, BuildArtifact};
use crate::cache::{CacheEntry, CacheKey, CacheLayer, CacheTier, CachedFile, RedbCache};
use crate::context::{BuildContext, Stage};
use crate::diagnostics::Diagnostic;
use crate::fingerprint::{
    BuildFingerprint, ConfigFingerprint, InputFingerprint, SourceFile, compute_build_fingerprint,
    compute_graph_hash, compute_input_fingerprint, engine_fingerprint,
};
use crate::plan::{BuildPlan, plan};
use crate::{BuildError, Result};

use execute::{ExecuteShared, execute};

/// File holding the serialized plan inside plan and input cache entries.
const PLAN_FILE: &str = "plan.json";

/// Everything a finished build produced.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Sorted by file name.
    pub artifacts: Vec<BuildArtifact>,
    pub fingerprint: BuildFingerprint,
    pub input: InputFingerprint,
    pub plan: BuildPlan,
    /// Problems in chunks that did not stop the build.
    pub diagnostics: Vec<Diagnostic>,
    pub graph: DependencyGraph,
    /// Served from the input tier without planning or executing.
    pub from_cache: bool,
}

impl BuildResult {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn artifact(&self, file_name: &str) -> Option<&BuildArtifact> {
        self.artifacts.iter().find(|a| a.file_name == file_name)
    }

    /// Artifacts produced for a plan chunk.
    pub fn chunk_artifacts<'a>(&'a self, chunk: &'a str) -> impl Iterator<Item = &'a BuildArtifact> {
        self.artifacts
            .iter()
            .filter(move |a| a.chunk.as_deref() == Some(chunk))
    }

    pub fn manifest(&self) -> Manifest {
        Manifest::new(&self.artifacts, &self.fingerprint)
    }
}

/// Run a build.
///
/// # Errors
///
/// Fatal conditions only: invalid options, an entry that does not exist,
/// every entry failing, cancellation, or an emit failure. Problems limited to
/// some chunks are returned in [`BuildResult::diagnostics`].
pub async fn build(options: BuildOptions, ctx: &BuildContext) -> Result<BuildResult> {
    options.validate()?;
    let (cache, owned) = open_cache(&options, ctx);
    let result = run(&options, &cache, ctx).await;
    if owned {
        cache.close();
    }
    match &result {
        Ok(result) => tracing::info!(
            artifacts = result.artifacts.len(),
            diagnostics = result.diagnostics.len(),
            from_cache = result.from_cache,
            output_hash = %result.fingerprint.output_hash,
            "build finished"
        ),
        Err(err) => tracing::debug!(error = %err, stage = %err.stage(), "build failed"),
    }
    result
}

/// Open the configured backend. The flag is true when the layer owns it and
/// must close it after the build.
fn open_cache(options: &BuildOptions, ctx: &BuildContext) -> (CacheLayer, bool) {
    if !options.cache.enabled {
        ctx.report(Stage::Init, "cache-disabled", "cache.enabled = false");
        return (CacheLayer::disabled(ctx.clone()), false);
    }
    let force = options.cache.should_force_rebuild();
    if force {
        ctx.report(Stage::Init, "force-rebuild", "cache reads bypassed");
    }
    if let Some(backend) = &options.cache_backend {
        return (CacheLayer::new(Some(backend.clone()), force, ctx.clone()), false);
    }

    let dir = options.cache_dir_path();
    match RedbCache::open(&dir) {
        Ok(cache) => (CacheLayer::new(Some(Arc::new(cache)), force, ctx.clone()), true),
        Err(err) => {
            tracing::warn!(dir = %dir.display(), error = %err, "cache unavailable, building without it");
            ctx.report(Stage::Init, "cache-unavailable", &err.to_string());
            (CacheLayer::disabled(ctx.clone()), false)
        }
    }
}

fn config_fingerprint(options: &BuildOptions, graph: &DependencyGraph, entries: &[ModuleId]) -> ConfigFingerprint {
    ConfigFingerprint {
        target: options.target,
        mode: options.mode,
        entries: entries
            .iter()
            .filter_map(|id| graph.node(id))
            .map(|node| node.relative_path.clone())
            .collect(),
        css_layers: options.css_layers.clone(),
        plugins: options.plugins.identities(),
        transformer: options.transformer.id().to_string(),
        env: options
            .cache
            .env_vars
            .iter()
            .map(|name| (name.clone(), std::env::var(name).ok()))
            .collect(),
    }
}

async fn run(options: &BuildOptions, cache: &CacheLayer, ctx: &BuildContext) -> Result<BuildResult> {
    ctx.report(
        Stage::Init,
        "build-start",
        &format!("{} entries, target {}", options.entries.len(), options.target),
    );

    let GraphBuild {
        graph,
        entries,
        modules,
        failed,
        diagnostics: graph_diagnostics,
    } = construct_graph(options, ctx).await?;

    let config_hash = config_fingerprint(options, &graph, &entries).hash()?;
    let input = compute_input_fingerprint(
        modules.values().map(|module| SourceFile {
            path: module.relative_path.clone(),
            content_hash: module.content_hash.clone(),
        }),
        config_hash,
        engine_fingerprint(),
    )?;
    let graph_hash = compute_graph_hash(&graph)?;
    let input_key = CacheKey::new(CacheTier::Input, input.input_hash.clone());

    // only clean builds are ever stored, so a dirty graph never hits
    if graph_diagnostics.is_empty() {
        if let Some(entry) = cache.lookup(Stage::Init, &input_key) {
            if let Some((artifacts, manifest, plan)) = restore_cached(&entry) {
                let mut fingerprint = manifest.fingerprint;
                fingerprint.build_time = chrono::Utc::now().to_rfc3339();
                if options.write {
                    emit(&options.out_dir_path(), &artifacts, &fingerprint)?;
                }
                finish(options, &fingerprint);
                return Ok(BuildResult {
                    artifacts,
                    fingerprint,
                    input,
                    plan,
                    diagnostics: Vec::new(),
                    graph,
                    from_cache: true,
                });
            }
            tracing::warn!(key = %input_key, "cached build is incomplete, rebuilding");
        }
    }

    let plan = plan_stage(options, cache, ctx, &graph, &entries, &graph_hash)?;

    let shared = Arc::new(ExecuteShared {
        modules: modules.clone(),
        failed: failed.clone(),
        transformer: options.transformer.clone(),
        plugins: options.plugins.clone(),
        cache: cache.clone(),
        target: options.target,
        mode: options.mode,
    });
    let outcome = execute(&plan, shared, options.parallelism(), ctx).await?;

    let mut diagnostics = graph_diagnostics;
    diagnostics.extend(outcome.diagnostics);

    let entry_failed = |entry: &ModuleId| {
        plan.chunks
            .iter()
            .find(|chunk| chunk.modules.contains(entry))
            .is_none_or(|chunk| outcome.failed_chunks.contains(&chunk.id))
    };
    if entries.iter().all(entry_failed) {
        return Err(BuildError::Failed { diagnostics });
    }

    let mut artifacts = outcome.artifacts;
    for asset in &plan.assets {
        if failed.contains(&asset.module) {
            continue;
        }
        let Some(module) = modules.get(&asset.module) else {
            continue;
        };
        artifacts.push(
            BuildArtifact::new(
                ArtifactType::Asset,
                &asset.output_name,
                &asset.extension,
                module.bytes.to_vec(),
            )
            .with_modules(vec![asset.module.clone()]),
        );
    }
    artifacts.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    check_coverage(&plan, &outcome.failed_chunks, &artifacts)?;

    let fingerprint = compute_build_fingerprint(&input, graph_hash, &plan, &artifacts)?;

    if options.write {
        emit(&options.out_dir_path(), &artifacts, &fingerprint)?;
        ctx.report(
            Stage::Emit,
            "emitted",
            &format!("{} files to {}", artifacts.len(), options.out_dir.display()),
        );
    }

    if diagnostics.is_empty() {
        let mut files: Vec<CachedFile> = artifacts
            .iter()
            .map(|a| CachedFile::new(a.file_name.clone(), a.source.to_vec()))
            .collect();
        files.push(CachedFile::new(
            MANIFEST_FILE,
            Manifest::new(&artifacts, &fingerprint).to_json()?,
        ));
        files.push(CachedFile::new(PLAN_FILE, plan_json(&plan)?));
        let out_dir = options.out_dir.to_string_lossy().into_owned();
        cache.store(Stage::Emit, CacheEntry::new(&input_key, out_dir, files));
    }

    finish(options, &fingerprint);

    Ok(BuildResult {
        artifacts,
        fingerprint,
        input,
        plan,
        diagnostics,
        graph,
        from_cache: false,
    })
}

fn plan_stage(
    options: &BuildOptions,
    cache: &CacheLayer,
    ctx: &BuildContext,
    graph: &DependencyGraph,
    entries: &[ModuleId],
    graph_hash: &ContentHash,
) -> Result<BuildPlan> {
    let mut parts: Vec<String> = vec![graph_hash.to_string(), options.target.to_string()];
    parts.extend(entries.iter().map(|id| id.to_string()));
    if let Some(layers) = &options.css_layers {
        parts.push(format!("layers:{}", layers.join(",")));
    }
    let key = CacheKey::from_parts(CacheTier::Plan, parts.iter().map(String::as_str));

    if let Some(entry) = cache.lookup(Stage::Plan, &key) {
        match entry
            .file(PLAN_FILE)
            .map(|file| serde_json::from_slice::<BuildPlan>(&file.bytes))
        {
            Some(Ok(plan)) => return Ok(plan),
            _ => tracing::warn!(key = %key, "cached plan is unreadable, replanning"),
        }
    }

    let planned = plan(graph, entries, options.target)?;
    ctx.report(
        Stage::Plan,
        "planned",
        &format!(
            "{} chunks, {} assets, plan {}",
            planned.chunks.len(),
            planned.assets.len(),
            planned.plan_id.short()
        ),
    );
    cache.store(
        Stage::Plan,
        CacheEntry::new(&key, "", vec![CachedFile::new(PLAN_FILE, plan_json(&planned)?)]),
    );
    Ok(planned)
}

fn plan_json(plan: &BuildPlan) -> Result<String> {
    serde_json::to_string(plan).map_err(|e| BuildError::Plan(format!("cannot serialize plan: {e}")))
}

fn restore_cached(entry: &CacheEntry) -> Option<(Vec<BuildArtifact>, Manifest, BuildPlan)> {
    let manifest = Manifest::from_json(&entry.file(MANIFEST_FILE)?.bytes).ok()?;
    let plan: BuildPlan = serde_json::from_slice(&entry.file(PLAN_FILE)?.bytes).ok()?;
    let artifacts = manifest.restore(|name| entry.file(name).map(|file| file.bytes.as_slice()))?;
    Some((artifacts, manifest, plan))
}

/// Every module of a chunk that ran must be in one of its artifacts.
fn check_coverage(
    plan: &BuildPlan,
    failed_chunks: &BTreeSet<String>,
    artifacts: &[BuildArtifact],
) -> Result<()> {
    let emitted: BTreeSet<&ModuleId> = artifacts.iter().flat_map(|a| a.modules.iter()).collect();
    for chunk in plan.chunks.iter().filter(|c| !failed_chunks.contains(&c.id)) {
        if let Some(missing) = chunk.modules.iter().find(|id| !emitted.contains(id)) {
            return Err(BuildError::Plan(format!(
                "module {missing} of chunk '{}' was not emitted",
                chunk.id
            )));
        }
    }
    Ok(())
}

fn finish(options: &BuildOptions, fingerprint: &BuildFingerprint) {
    for err in options.plugins.build_end(fingerprint) {
        tracing::warn!(plugin = %err.plugin, error = %err.message, "buildEnd hook failed");
    }
}
