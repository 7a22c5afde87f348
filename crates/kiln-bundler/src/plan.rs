//! Chunk planning.
//!
//! Turns a quiesced dependency graph into a [`BuildPlan`]: one chunk per
//! entry and per dynamic-import target, shared chunks for modules several of
//! those reach, cycle-merged chunk dependencies and a topological execution
//! order. Planning reads the graph only; the same graph and target always
//! yield the same `plan_id`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kiln_config::Target;
use kiln_graph::{
    ContentHash, DependencyGraph, EdgeKind, GraphEdge, GraphNode, ModuleId, ModuleKind,
    canonical_hash, is_virtual,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use serde::{Deserialize, Serialize};

use crate::BuildError;

/// A unit of execution and emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChunk {
    /// Unique chunk name; also the stem of its output files.
    pub id: String,
    /// Root module the chunk was planned for. Shared chunks have none.
    pub entry: Option<ModuleId>,
    /// Planned for a dynamic-import target rather than a declared entry.
    pub dynamic: bool,
    /// Every module of the chunk in execution order (dependencies first).
    pub modules: Vec<ModuleId>,
    /// Stylesheet modules in cascade emission order.
    pub styles: Vec<ModuleId>,
    /// Chunks that must execute before this one, sorted.
    pub dependencies: Vec<String>,
    pub output_name: String,
}

/// A style asset copied to the output unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAsset {
    pub module: ModuleId,
    pub output_name: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildPlan {
    pub plan_id: ContentHash,
    pub target: Target,
    /// Sorted by id.
    pub chunks: Vec<PlannedChunk>,
    pub assets: Vec<PlannedAsset>,
    /// Chunk ids, dependencies first, ties broken by id.
    pub execution_order: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanContent<'a> {
    target: Target,
    chunks: &'a [PlannedChunk],
    assets: &'a [PlannedAsset],
    execution_order: &'a [String],
}

impl BuildPlan {
    pub fn chunk(&self, id: &str) -> Option<&PlannedChunk> {
        self.chunks
            .binary_search_by(|chunk| chunk.id.as_str().cmp(id))
            .ok()
            .map(|index| &self.chunks[index])
    }

    /// Chunks grouped into waves: every chunk's dependencies sit in earlier
    /// waves. Within a wave chunks are sorted by id.
    pub fn waves(&self) -> Vec<Vec<&PlannedChunk>> {
        let mut level: HashMap<&str, usize> = HashMap::default();
        let mut waves: Vec<Vec<&PlannedChunk>> = Vec::new();
        for id in &self.execution_order {
            let Some(chunk) = self.chunk(id) else {
                continue;
            };
            let depth = chunk
                .dependencies
                .iter()
                .filter_map(|dep| level.get(dep.as_str()))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            level.insert(chunk.id.as_str(), depth);
            if waves.len() <= depth {
                waves.resize_with(depth + 1, Vec::new);
            }
            waves[depth].push(chunk);
        }
        for wave in &mut waves {
            wave.sort_by(|a, b| a.id.cmp(&b.id));
        }
        waves
    }

    fn compute_id(&self) -> Result<ContentHash, BuildError> {
        Ok(canonical_hash(&PlanContent {
            target: self.target,
            chunks: &self.chunks,
            assets: &self.assets,
            execution_order: &self.execution_order,
        })?)
    }
}

#[derive(Debug, Default)]
struct ChunkDraft {
    entry: Option<ModuleId>,
    dynamic: bool,
    modules: Vec<ModuleId>,
}

/// Plan the chunks for `entries` (in declaration order).
///
/// # Errors
///
/// `BuildError::Plan` when an entry is not in the graph or a reachable module
/// would not be emitted.
pub fn plan(
    graph: &DependencyGraph,
    entries: &[ModuleId],
    target: Target,
) -> Result<BuildPlan, BuildError> {
    for entry in entries {
        if !graph.contains(entry) {
            return Err(BuildError::Plan(format!("entry {entry} is not in the graph")));
        }
    }

    let reachable = graph.reachable_from(entries);
    let nodes: HashMap<ModuleId, Arc<GraphNode>> = reachable
        .iter()
        .filter_map(|id| graph.node(id).map(|node| (id.clone(), node)))
        .collect();

    let roots = collect_roots(&nodes, entries);
    let names = root_names(&nodes, &roots);
    let root_index: HashMap<&ModuleId, usize> =
        roots.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let rank = execution_rank(&nodes, &roots);

    // owners[m] = roots whose static closure contains m
    let mut owners: BTreeMap<ModuleId, BTreeSet<usize>> = BTreeMap::new();
    for (index, root) in roots.iter().enumerate() {
        let mut stack = vec![root.clone()];
        let mut visited: HashSet<ModuleId> = HashSet::default();
        visited.insert(root.clone());
        while let Some(id) = stack.pop() {
            owners.entry(id.clone()).or_default().insert(index);
            let Some(node) = nodes.get(&id) else {
                continue;
            };
            for edge in node.edges.iter().filter(|e| e.kind.is_eager()) {
                if root_index.contains_key(&edge.to) || !nodes.contains_key(&edge.to) {
                    continue;
                }
                if visited.insert(edge.to.clone()) {
                    stack.push(edge.to.clone());
                }
            }
        }
    }

    // assets are copied, never executed, whoever reaches them
    let mut assets: Vec<PlannedAsset> = nodes
        .values()
        .filter(|node| node.kind == ModuleKind::StyleAsset)
        .map(|node| planned_asset(node))
        .collect();

    let mut drafts: BTreeMap<String, ChunkDraft> = BTreeMap::new();
    let mut chunk_of: HashMap<ModuleId, String> = HashMap::default();
    for (id, owner_set) in &owners {
        if nodes[id].kind == ModuleKind::StyleAsset {
            continue;
        }
        let name = if owner_set.len() == 1 {
            let index = *owner_set.iter().next().unwrap_or(&0);
            names[index].clone()
        } else {
            let mut owner_names: Vec<&str> = owner_set.iter().map(|i| names[*i].as_str()).collect();
            owner_names.sort_unstable();
            owner_names.join("~")
        };
        let draft = drafts.entry(name.clone()).or_default();
        if owner_set.len() == 1 && root_index.contains_key(id) {
            draft.entry = Some(id.clone());
            draft.dynamic = !entries.contains(id);
        }
        draft.modules.push(id.clone());
        chunk_of.insert(id.clone(), name);
    }
    assets.sort_by(|a, b| {
        let path = |m: &ModuleId| nodes.get(m).map(|n| n.relative_path.clone());
        path(&a.module).cmp(&path(&b.module))
    });

    let mut dependencies: BTreeMap<String, BTreeSet<String>> =
        drafts.keys().map(|name| (name.clone(), BTreeSet::new())).collect();
    for (name, draft) in &drafts {
        for id in &draft.modules {
            for edge in nodes[id].edges.iter().filter(|e| e.kind.is_eager()) {
                if let Some(target_chunk) = chunk_of.get(&edge.to) {
                    if target_chunk != name {
                        if let Some(deps) = dependencies.get_mut(name) {
                            deps.insert(target_chunk.clone());
                        }
                    }
                }
            }
        }
    }

    let (drafts, dependencies) = merge_cycles(drafts, dependencies, &rank);
    let execution_order = topological_order(&dependencies)?;

    let css_edges = stylesheet_edges(&nodes);
    let mut chunks: Vec<PlannedChunk> = drafts
        .into_iter()
        .map(|(name, mut draft)| {
            draft
                .modules
                .sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
            let styles = order_styles(graph, &nodes, &draft.modules, &css_edges);
            PlannedChunk {
                dependencies: dependencies
                    .get(&name)
                    .map(|deps| deps.iter().cloned().collect())
                    .unwrap_or_default(),
                output_name: name.clone(),
                id: name,
                entry: draft.entry,
                dynamic: draft.dynamic,
                modules: draft.modules,
                styles,
            }
        })
        .collect();
    chunks.sort_by(|a, b| a.id.cmp(&b.id));

    let planned: BTreeSet<&ModuleId> = chunks
        .iter()
        .flat_map(|chunk| chunk.modules.iter())
        .chain(assets.iter().map(|asset| &asset.module))
        .collect();
    if let Some(missing) = reachable.iter().find(|id| !planned.contains(id)) {
        return Err(BuildError::Plan(format!(
            "reachable module {missing} was not assigned to any chunk"
        )));
    }

    let mut plan = BuildPlan {
        plan_id: ContentHash::from_hex(""),
        target,
        chunks,
        assets,
        execution_order,
    };
    plan.plan_id = plan.compute_id()?;
    Ok(plan)
}

/// Declared entries first, then dynamic-import targets by path.
fn collect_roots(nodes: &HashMap<ModuleId, Arc<GraphNode>>, entries: &[ModuleId]) -> Vec<ModuleId> {
    let mut roots: Vec<ModuleId> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !roots.contains(entry) {
            roots.push(entry.clone());
        }
    }

    let mut dynamic: BTreeSet<(String, ModuleId)> = BTreeSet::new();
    for node in nodes.values() {
        for edge in node.edges.iter().filter(|e| e.kind == EdgeKind::DynamicImport) {
            if let Some(target) = nodes.get(&edge.to) {
                if target.kind != ModuleKind::StyleAsset && !roots.contains(&target.id) {
                    dynamic.insert((target.relative_path.clone(), target.id.clone()));
                }
            }
        }
    }
    roots.extend(dynamic.into_iter().map(|(_, id)| id));
    roots
}

/// File stem of a module, safe for use in a file name.
fn stem_of(node: &GraphNode) -> String {
    let path = node
        .relative_path
        .strip_prefix(kiln_graph::path::VIRTUAL_PREFIX)
        .unwrap_or(&node.relative_path);
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    };
    sanitize(stem)
}

fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "chunk".to_string()
    } else {
        cleaned
    }
}

/// Unique chunk names for roots.
///
/// The file stem is used when unique; otherwise the root-relative path
/// without extension, and finally a short id suffix.
fn root_names(nodes: &HashMap<ModuleId, Arc<GraphNode>>, roots: &[ModuleId]) -> Vec<String> {
    let stems: Vec<String> = roots.iter().map(|id| stem_of(&nodes[id])).collect();
    let mut counts: HashMap<&str, usize> = HashMap::default();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }

    let mut names: Vec<String> = roots
        .iter()
        .zip(&stems)
        .map(|(id, stem)| {
            if counts[stem.as_str()] == 1 {
                return stem.clone();
            }
            let node = &nodes[id];
            let path = if is_virtual(&node.relative_path) {
                node.relative_path.clone()
            } else {
                match node.relative_path.rsplit_once('.') {
                    Some((without_ext, _)) => without_ext.to_string(),
                    None => node.relative_path.clone(),
                }
            };
            sanitize(path.trim_start_matches("../").trim_start_matches('/'))
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::default();
    for (name, id) in names.iter_mut().zip(roots) {
        if !seen.insert(name.clone()) {
            *name = format!("{name}-{}", &id.as_str()[..6.min(id.as_str().len())]);
            seen.insert(name.clone());
        }
    }
    names
}

/// Post-order rank of every module over eager edges, starting from roots in
/// order. Dependencies always rank before their importers, except inside
/// cycles where source order decides.
fn execution_rank(
    nodes: &HashMap<ModuleId, Arc<GraphNode>>,
    roots: &[ModuleId],
) -> HashMap<ModuleId, usize> {
    let mut rank: HashMap<ModuleId, usize> = HashMap::default();
    let mut visited: HashSet<ModuleId> = HashSet::default();

    for root in roots {
        if !visited.insert(root.clone()) {
            continue;
        }
        let mut stack: Vec<(ModuleId, usize)> = vec![(root.clone(), 0)];
        while let Some((id, next_edge)) = stack.pop() {
            let edges = nodes.get(&id).map(|n| n.edges.as_slice()).unwrap_or(&[]);
            let pending = edges
                .iter()
                .enumerate()
                .skip(next_edge)
                .find(|(_, e)| e.kind.is_eager() && nodes.contains_key(&e.to) && !visited.contains(&e.to));

            match pending {
                Some((index, edge)) => {
                    let child = edge.to.clone();
                    stack.push((id, index + 1));
                    visited.insert(child.clone());
                    stack.push((child, 0));
                }
                None => {
                    let next = rank.len();
                    rank.insert(id, next);
                }
            }
        }
    }
    rank
}

fn planned_asset(node: &GraphNode) -> PlannedAsset {
    let file = node.relative_path.rsplit('/').next().unwrap_or(&node.relative_path);
    let extension = file
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    PlannedAsset {
        module: node.id.clone(),
        output_name: stem_of(node),
        extension,
    }
}

/// Merge every strongly connected group of chunks into one chunk named by
/// its sorted member names joined with `+`.
fn merge_cycles(
    drafts: BTreeMap<String, ChunkDraft>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
    rank: &HashMap<ModuleId, usize>,
) -> (BTreeMap<String, ChunkDraft>, BTreeMap<String, BTreeSet<String>>) {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index = BTreeMap::new();
    for name in drafts.keys() {
        index.insert(name.as_str(), graph.add_node(name.as_str()));
    }
    for (name, deps) in &dependencies {
        for dep in deps {
            if let (Some(&from), Some(&to)) = (index.get(name.as_str()), index.get(dep.as_str())) {
                graph.add_edge(from, to, ());
            }
        }
    }

    let mut rename: BTreeMap<String, String> = BTreeMap::new();
    for component in tarjan_scc(&graph) {
        if component.len() < 2 {
            continue;
        }
        let mut members: Vec<String> = component.iter().map(|n| graph[*n].to_string()).collect();
        members.sort();
        let merged = members.join("+");
        for member in members {
            rename.insert(member, merged.clone());
        }
    }

    if rename.is_empty() {
        return (drafts, dependencies);
    }

    let renamed = |name: &String| rename.get(name).cloned().unwrap_or_else(|| name.clone());

    let mut merged_drafts: BTreeMap<String, ChunkDraft> = BTreeMap::new();
    for (name, draft) in drafts {
        let target = merged_drafts.entry(renamed(&name)).or_insert_with(|| ChunkDraft {
            dynamic: true,
            ..ChunkDraft::default()
        });
        // members arrive in name order, so the first entry wins
        if target.entry.is_none() {
            target.entry = draft.entry;
        }
        target.dynamic &= draft.dynamic;
        target.modules.extend(draft.modules);
    }
    for draft in merged_drafts.values_mut() {
        draft
            .modules
            .sort_by_key(|id| rank.get(id).copied().unwrap_or(usize::MAX));
    }

    let mut merged_deps: BTreeMap<String, BTreeSet<String>> = merged_drafts
        .keys()
        .map(|name| (name.clone(), BTreeSet::new()))
        .collect();
    for (name, deps) in dependencies {
        let from = renamed(&name);
        for dep in deps {
            let to = renamed(&dep);
            if to != from {
                merged_deps.entry(from.clone()).or_default().insert(to);
            }
        }
    }

    (merged_drafts, merged_deps)
}

/// Kahn's algorithm with a name-ordered ready set.
fn topological_order(
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> Result<Vec<String>, BuildError> {
    let mut remaining: BTreeMap<&str, usize> = dependencies
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.len()))
        .collect();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, deps) in dependencies {
        for dep in deps {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut order = Vec::with_capacity(dependencies.len());

    while let Some(name) = ready.pop_first() {
        order.push(name.to_string());
        for dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
            if let Some(count) = remaining.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != dependencies.len() {
        return Err(BuildError::Plan(
            "chunk dependencies still contain a cycle after merging".to_string(),
        ));
    }
    Ok(order)
}

/// Every stylesheet edge between reachable modules, in id then source order.
fn stylesheet_edges(nodes: &HashMap<ModuleId, Arc<GraphNode>>) -> Vec<GraphEdge> {
    let mut sorted: Vec<&Arc<GraphNode>> = nodes.values().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    sorted
        .into_iter()
        .flat_map(|node| node.edges.iter())
        .filter(|edge| edge.kind.is_css())
        .cloned()
        .collect()
}

/// Stylesheets of a chunk in cascade order.
///
/// Sheets pulled in through `@import` follow the precedence resolver; sheets
/// imported from scripts are unlayered and follow in execution order.
fn order_styles(
    graph: &DependencyGraph,
    nodes: &HashMap<ModuleId, Arc<GraphNode>>,
    modules: &[ModuleId],
    css_edges: &[GraphEdge],
) -> Vec<ModuleId> {
    let sheets: BTreeSet<&ModuleId> = modules
        .iter()
        .filter(|id| nodes.get(*id).is_some_and(|n| n.kind.is_stylesheet()))
        .collect();
    if sheets.is_empty() {
        return Vec::new();
    }

    let relevant: Vec<GraphEdge> = css_edges
        .iter()
        .filter(|edge| sheets.contains(&edge.to))
        .cloned()
        .collect();

    let mut ordered: Vec<ModuleId> = Vec::with_capacity(sheets.len());
    for edge in graph.resolve_css_precedence(&relevant) {
        if !ordered.contains(&edge.to) {
            ordered.push(edge.to);
        }
    }
    for id in modules {
        if sheets.contains(id) && !ordered.contains(id) {
            ordered.push(id.clone());
        }
    }
    ordered
}
