//! Build fingerprints.
//!
//! An [`InputFingerprint`] summarizes everything a build reads; a
//! [`BuildFingerprint`] summarizes what it produced. Both are built from
//! root-relative paths and canonical hashes only, so the same project hashes
//! identically on every machine and in every checkout location.

use std::collections::BTreeMap;

use kiln_config::{Mode, Target};
use kiln_graph::{
    CanonicalHasher, ContentHash, DependencyGraph, EdgeKind, HashError, ModuleKind, Precedence,
    canonical_hash,
};
use serde::{Deserialize, Serialize};

use crate::artifact::BuildArtifact;
use crate::cache::CACHE_FORMAT_VERSION;
use crate::context::Stage;
use crate::plan::BuildPlan;

/// Engine name mixed into every engine fingerprint.
pub const ENGINE_NAME: &str = "kiln";

/// Engine version recorded in build fingerprints.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of the engine itself: name, version and cache format.
pub fn engine_fingerprint() -> ContentHash {
    let mut hasher = CanonicalHasher::new();
    hasher
        .update_str(ENGINE_NAME)
        .update_str(ENGINE_VERSION)
        .update_u64(u64::from(CACHE_FORMAT_VERSION));
    hasher.finish()
}

/// Content hash of one source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    /// Root-relative normalized path or virtual id.
    pub path: String,
    pub content_hash: ContentHash,
}

/// Everything a build depends on, hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFingerprint {
    /// Sorted by path.
    pub source_files: Vec<SourceFile>,
    pub config_hash: ContentHash,
    pub engine_fingerprint: ContentHash,
    pub input_hash: ContentHash,
}

impl InputFingerprint {
    /// Content hash recorded for `path`, if the file is part of the input.
    pub fn content_hash(&self, path: &str) -> Option<&ContentHash> {
        self.source_files
            .binary_search_by(|file| file.path.as_str().cmp(path))
            .ok()
            .map(|index| &self.source_files[index].content_hash)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InputHashPayload<'a> {
    source_files: &'a [SourceFile],
    config_hash: &'a ContentHash,
    engine_fingerprint: &'a ContentHash,
}

/// Fingerprint the inputs of a build.
///
/// Files are sorted by path and deduplicated, so the order they were read in
/// never matters.
pub fn compute_input_fingerprint(
    files: impl IntoIterator<Item = SourceFile>,
    config_hash: ContentHash,
    engine_fingerprint: ContentHash,
) -> Result<InputFingerprint, HashError> {
    let mut source_files: Vec<SourceFile> = files.into_iter().collect();
    source_files.sort();
    source_files.dedup_by(|a, b| a.path == b.path);

    let input_hash = canonical_hash(&InputHashPayload {
        source_files: &source_files,
        config_hash: &config_hash,
        engine_fingerprint: &engine_fingerprint,
    })?;

    Ok(InputFingerprint {
        source_files,
        config_hash,
        engine_fingerprint,
        input_hash,
    })
}

/// Build settings that change output, in hashable form.
///
/// Paths that only locate the project on disk (root, output directory, cache
/// directory) are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFingerprint {
    pub target: Target,
    pub mode: Mode,
    /// Root-relative entry paths in declaration order.
    pub entries: Vec<String>,
    pub css_layers: Option<Vec<String>>,
    /// `(name, version)` of every plugin in execution order.
    pub plugins: Vec<(String, String)>,
    pub transformer: String,
    /// Values of the environment variables listed in the cache config.
    pub env: BTreeMap<String, Option<String>>,
}

impl ConfigFingerprint {
    pub fn hash(&self) -> Result<ContentHash, HashError> {
        canonical_hash(self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphNodeFingerprint<'a> {
    id: &'a str,
    kind: ModuleKind,
    path: &'a str,
    entry: bool,
    edges: Vec<GraphEdgeFingerprint<'a>>,
}

#[derive(Serialize)]
struct GraphEdgeFingerprint<'a> {
    to: &'a str,
    kind: EdgeKind,
    precedence: Option<&'a Precedence>,
}

/// Canonical hash of the graph structure.
///
/// Nodes are taken in id order; each carries its kind, root-relative path
/// and its edges in source order. Absolute paths never enter the hash.
pub fn compute_graph_hash(graph: &DependencyGraph) -> Result<ContentHash, HashError> {
    let nodes = graph.nodes();
    let payload: Vec<GraphNodeFingerprint<'_>> = nodes
        .iter()
        .map(|node| GraphNodeFingerprint {
            id: node.id.as_str(),
            kind: node.kind,
            path: &node.relative_path,
            entry: node.is_entry,
            edges: node
                .edges
                .iter()
                .map(|edge| GraphEdgeFingerprint {
                    to: edge.to.as_str(),
                    kind: edge.kind,
                    precedence: edge.precedence(),
                })
                .collect(),
        })
        .collect();
    canonical_hash(&payload)
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildFingerprint {
    pub engine_version: String,
    pub graph_hash: ContentHash,
    pub plan_hash: ContentHash,
    pub input_hash: ContentHash,
    pub output_hash: ContentHash,
    pub target: Target,
    /// RFC 3339 wall-clock time; informational, never compared.
    pub build_time: String,
}

/// Hash of the sorted artifact ids.
pub fn compute_output_hash(artifacts: &[BuildArtifact]) -> Result<ContentHash, HashError> {
    let mut ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
    ids.sort_unstable();
    canonical_hash(&ids)
}

pub fn compute_build_fingerprint(
    input: &InputFingerprint,
    graph_hash: ContentHash,
    plan: &BuildPlan,
    artifacts: &[BuildArtifact],
) -> Result<BuildFingerprint, HashError> {
    Ok(BuildFingerprint {
        engine_version: ENGINE_VERSION.to_string(),
        graph_hash,
        plan_hash: plan.plan_id.clone(),
        input_hash: input.input_hash.clone(),
        output_hash: compute_output_hash(artifacts)?,
        target: plan.target,
        build_time: chrono::Utc::now().to_rfc3339(),
    })
}

/// Comparison of two fingerprints along the pipeline.
pub struct FingerprintChain;

impl FingerprintChain {
    /// First stage whose hash differs, following input → graph → plan → output.
    pub fn diverged_stage(a: &BuildFingerprint, b: &BuildFingerprint) -> Option<Stage> {
        if a.input_hash != b.input_hash {
            Some(Stage::Init)
        } else if a.graph_hash != b.graph_hash {
            Some(Stage::Graph)
        } else if a.plan_hash != b.plan_hash {
            Some(Stage::Plan)
        } else if a.output_hash != b.output_hash {
            Some(Stage::Emit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_graph::hash_bytes;

    fn file(path: &str, content: &str) -> SourceFile {
        SourceFile {
            path: path.to_string(),
            content_hash: hash_bytes(content.as_bytes()),
        }
    }

    fn config() -> ContentHash {
        hash_bytes(b"config")
    }

    #[test]
    fn input_hash_ignores_read_order() {
        let a = compute_input_fingerprint(
            vec![file("src/a.ts", "a"), file("src/b.ts", "b")],
            config(),
            engine_fingerprint(),
        )
        .unwrap();
        let b = compute_input_fingerprint(
            vec![file("src/b.ts", "b"), file("src/a.ts", "a")],
            config(),
            engine_fingerprint(),
        )
        .unwrap();
        assert_eq!(a.input_hash, b.input_hash);
        assert_eq!(a.source_files[0].path, "src/a.ts");
    }

    #[test]
    fn one_file_change_only_moves_its_hash() {
        let before = compute_input_fingerprint(
            vec![file("src/a.ts", "a"), file("src/b.ts", "b")],
            config(),
            engine_fingerprint(),
        )
        .unwrap();
        let after = compute_input_fingerprint(
            vec![file("src/a.ts", "a2"), file("src/b.ts", "b")],
            config(),
            engine_fingerprint(),
        )
        .unwrap();

        assert_ne!(before.input_hash, after.input_hash);
        assert_ne!(before.content_hash("src/a.ts"), after.content_hash("src/a.ts"));
        assert_eq!(before.content_hash("src/b.ts"), after.content_hash("src/b.ts"));
    }

    #[test]
    fn config_hash_changes_input_hash() {
        let files = || vec![file("src/a.ts", "a")];
        let a = compute_input_fingerprint(files(), config(), engine_fingerprint()).unwrap();
        let b = compute_input_fingerprint(files(), hash_bytes(b"other"), engine_fingerprint())
            .unwrap();
        assert_ne!(a.input_hash, b.input_hash);
    }

    #[test]
    fn config_fingerprint_depends_on_target() {
        let base = ConfigFingerprint {
            target: Target::Browser,
            mode: Mode::Production,
            entries: vec!["src/main.ts".into()],
            css_layers: None,
            plugins: vec![],
            transformer: "passthrough@1".into(),
            env: BTreeMap::new(),
        };
        let node = ConfigFingerprint {
            target: Target::Node,
            ..base.clone()
        };
        assert_ne!(base.hash().unwrap(), node.hash().unwrap());
        assert_eq!(base.hash().unwrap(), base.clone().hash().unwrap());
    }

    #[test]
    fn diverged_stage_reports_first_difference() {
        let fp = BuildFingerprint {
            engine_version: ENGINE_VERSION.into(),
            graph_hash: hash_bytes(b"g"),
            plan_hash: hash_bytes(b"p"),
            input_hash: hash_bytes(b"i"),
            output_hash: hash_bytes(b"o"),
            target: Target::Browser,
            build_time: "now".into(),
        };
        let mut other = fp.clone();
        other.build_time = "later".into();
        assert_eq!(FingerprintChain::diverged_stage(&fp, &other), None);

        other.output_hash = hash_bytes(b"o2");
        assert_eq!(FingerprintChain::diverged_stage(&fp, &other), Some(Stage::Emit));

        other.plan_hash = hash_bytes(b"p2");
        assert_eq!(FingerprintChain::diverged_stage(&fp, &other), Some(Stage::Plan));

        other.input_hash = hash_bytes(b"i2");
        assert_eq!(FingerprintChain::diverged_stage(&fp, &other), Some(Stage::Init));
    }
}
