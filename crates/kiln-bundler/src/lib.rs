#![cfg_attr(docsrs, feature(doc_cfg))]

//! # kiln-bundler
//!
//! Deterministic build engine on top of the `kiln-graph` foundation.
//!
//! A build turns entry files into content-addressed artifacts: the graph is
//! constructed, the inputs are fingerprinted, chunks are planned, executed in
//! dependency waves and emitted with a manifest. Every stage is keyed by a
//! canonical hash, so unchanged work is served from the cache and two
//! machines building the same sources produce the same bytes.
//!
//! During development the [`HmrEngine`] decides for each changed file whether
//! it can be hot-updated, style-swapped or needs a full reload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kiln_bundler::{BuildContext, BuildOptions, build};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = BuildOptions::new("/project")
//!     .entry("src/main.ts")
//!     .out_dir("dist");
//!
//! let result = build(options, &BuildContext::default()).await?;
//! println!("output hash: {}", result.fingerprint.output_hash);
//! # Ok(()) }
//! ```

// Re-export everything from foundation crate
pub use kiln_graph::*;

pub mod artifact;
pub mod audit;
pub mod cache;
pub mod context;
pub mod diagnostics;
pub mod fingerprint;
pub mod hmr;
pub mod pipeline;
pub mod plan;
pub mod plugins;
pub mod transform;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use artifact::{ArtifactType, BuildArtifact};
pub use audit::{DeterminismError, compare, verify_reproducible};
pub use cache::{
    BuildCache, CacheEntry, CacheError, CacheKey, CacheLayer, CacheOptions, CacheTier,
    CachedFile, MemoryCache, RedbCache,
};
pub use context::{
    AbortSignal, BuildContext, MemoryReporter, ReportEvent, Reporter, Stage, TracingReporter,
};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use fingerprint::{
    BuildFingerprint, ConfigFingerprint, FingerprintChain, InputFingerprint, SourceFile,
    compute_build_fingerprint, compute_graph_hash, compute_input_fingerprint, engine_fingerprint,
};
pub use hmr::{DevSession, HmrBatch, HmrDecision, HmrEngine, ModuleChange, ModuleNode};
pub use pipeline::{BuildOptions, BuildResult, MANIFEST_FILE, Manifest, ManifestEntry, build, emit};
pub use plan::{BuildPlan, PlannedAsset, PlannedChunk, plan};
pub use plugins::{Hook, HookKind, HookOutput, Plugin, PluginError, PluginPhase, PluginRegistry};
pub use transform::{
    PassthroughTransformer, TransformFailure, TransformOutput, TransformRequest, Transformer,
};

// Configuration types used throughout the public API
pub use kiln_config::{Mode, Target};

/// Error types for kiln-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An import could not be mapped to a module.
    #[error("cannot resolve '{specifier}' from {importer}")]
    Resolution { importer: String, specifier: String },

    /// The transformation collaborator failed for a module.
    #[error("transform failed for {path}: {message}")]
    Transform { path: String, message: String },

    /// Planning invariants were violated.
    #[error("plan error: {0}")]
    Plan(String),

    /// The cache backend failed where a result was required.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Two fingerprints that should match did not.
    #[error(transparent)]
    Determinism(#[from] DeterminismError),

    /// A declared entry does not exist.
    #[error("entry not found: {entry}")]
    EntryNotFound { entry: String },

    /// Every entry failed; all collected diagnostics.
    #[error("{}", format_diagnostics(.diagnostics))]
    Failed { diagnostics: Vec<Diagnostic> },

    /// The build was aborted between chunk waves.
    #[error("build cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// File write operation failed.
    #[error("Write failure: {0}")]
    WriteFailure(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from the dependency graph.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// A value could not be hashed canonically.
    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    /// Error from the runtime.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Error while loading configuration.
    #[error("config error: {0}")]
    Config(#[from] kiln_config::ConfigError),
}

/// Result type alias for kiln-bundler operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Format build diagnostics for display.
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "build failed".to_string();
    }

    if diagnostics.len() == 1 {
        let diag = &diagnostics[0];
        format!("{}: {}", diag.kind, diag.message)
    } else {
        format!(
            "{} errors: {}",
            diagnostics.len(),
            diagnostics
                .iter()
                .map(|d| format!("{}: {}", d.kind, d.message))
                .collect::<Vec<_>>()
                .join("; ")
        )
    }
}

impl BuildError {
    /// Stage the error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            BuildError::Resolution { .. } | BuildError::EntryNotFound { .. } => Stage::Graph,
            BuildError::Graph(_) => Stage::Graph,
            BuildError::Transform { .. } | BuildError::Cancelled => Stage::Execute,
            BuildError::Plan(_) => Stage::Plan,
            BuildError::Determinism(_) => Stage::Audit,
            BuildError::InvalidOutputPath(_) | BuildError::WriteFailure(_) => Stage::Emit,
            BuildError::Failed { diagnostics } => diagnostics
                .first()
                .map(|d| d.stage)
                .unwrap_or(Stage::Execute),
            BuildError::Cache(_)
            | BuildError::InvalidConfig(_)
            | BuildError::Io(_)
            | BuildError::Hash(_)
            | BuildError::Runtime(_)
            | BuildError::Config(_) => Stage::Init,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            BuildError::Failed { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

impl miette::Diagnostic for BuildError {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            BuildError::Resolution { .. } => "kiln::resolution",
            BuildError::Transform { .. } => "kiln::transform",
            BuildError::Plan(_) => "kiln::plan",
            BuildError::Cache(_) => "kiln::cache",
            BuildError::Determinism(_) => "kiln::determinism",
            BuildError::EntryNotFound { .. } => "kiln::entry_not_found",
            BuildError::Failed { .. } => "kiln::build_failed",
            BuildError::Cancelled => "kiln::cancelled",
            BuildError::InvalidConfig(_) => "kiln::invalid_config",
            BuildError::InvalidOutputPath(_) => "kiln::invalid_output_path",
            BuildError::WriteFailure(_) => "kiln::write_failure",
            BuildError::Io(_) => "kiln::io",
            BuildError::Graph(_) => "kiln::graph",
            BuildError::Hash(_) => "kiln::hash",
            BuildError::Runtime(_) => "kiln::runtime",
            BuildError::Config(_) => "kiln::config",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            BuildError::Resolution { .. } => Some(Box::new(
                "Check the import path and extension. Bare package imports are not bundled.",
            )),
            BuildError::EntryNotFound { entry } => Some(Box::new(format!(
                "The entry '{}' does not exist.\nCheck build.entries in kiln.toml or the paths passed on the command line.",
                entry
            ))),
            BuildError::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {}",
                msg
            ))),
            BuildError::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the output directory and doesn't contain '..' components.",
                path
            ))),
            BuildError::WriteFailure(msg) => Some(Box::new(format!(
                "Failed to write file. Check disk space and permissions.\nError: {}",
                msg
            ))),
            BuildError::Determinism(err) => Some(Box::new(format!(
                "Two builds of the same inputs diverged at the {} stage. A plugin or transformer is likely not deterministic.",
                err.stage
            ))),
            BuildError::Failed { diagnostics } => {
                if diagnostics.len() == 1 {
                    diagnostics[0]
                        .help
                        .as_ref()
                        .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
                } else {
                    Some(Box::new(
                        "Multiple build errors occurred. See details below.".to_string(),
                    ))
                }
            }
            _ => None,
        }
    }
}
