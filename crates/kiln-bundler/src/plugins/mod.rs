//! Plugin system for kiln-bundler.
//!
//! Plugins hook into a closed set of points in the pipeline. Each hook has a
//! typed payload, and handlers are sorted once when the registry is built,
//! so the invocation order is the same on every run and plugin identities
//! can be fingerprinted.

pub mod registry;

pub use registry::PluginRegistry;

use crate::fingerprint::BuildFingerprint;

/// Plugin execution phases.
///
/// Plugins are executed in phase order, then by name within a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PluginPhase {
    /// Virtual module providers; run before anything else resolves or loads.
    Virtual = 0,

    /// Module resolution overrides.
    Resolve = 10,

    /// Content transformation (the default).
    Transform = 20,

    /// Chunk post-processing.
    Optimize = 30,

    /// Observers that run after everything else.
    PostProcess = 100,
}

/// Tag of a hook, used to declare which hooks a plugin handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HookKind {
    ResolveId,
    Load,
    TransformModule,
    RenderChunk,
    BuildEnd,
}

/// A hook invocation with its payload.
#[derive(Debug, Clone, Copy)]
pub enum Hook<'a> {
    /// Map a specifier to a module path or virtual id. First non-skip wins.
    ResolveId { specifier: &'a str, importer: &'a str },
    /// Provide the content of a module. First non-skip wins.
    Load { path: &'a str },
    /// Rewrite a module's transformed code. Chained.
    TransformModule { path: &'a str, code: &'a str },
    /// Rewrite a chunk's concatenated code. Chained.
    RenderChunk { chunk: &'a str, code: &'a str },
    /// Observe the finished build. Broadcast.
    BuildEnd { fingerprint: &'a BuildFingerprint },
}

impl Hook<'_> {
    pub fn kind(&self) -> HookKind {
        match self {
            Hook::ResolveId { .. } => HookKind::ResolveId,
            Hook::Load { .. } => HookKind::Load,
            Hook::TransformModule { .. } => HookKind::TransformModule,
            Hook::RenderChunk { .. } => HookKind::RenderChunk,
            Hook::BuildEnd { .. } => HookKind::BuildEnd,
        }
    }
}

/// What a handler returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutput {
    /// Not handled; the next plugin is asked.
    Skip,
    /// `ResolveId` result: absolute path or `virtual:` id.
    Resolved(String),
    /// `Load` result.
    Loaded(String),
    /// `TransformModule` / `RenderChunk` result.
    Code(String),
}

/// A plugin failure, attributed to the plugin and hook.
#[derive(Debug, Clone, thiserror::Error)]
#[error("plugin '{plugin}' failed in {hook:?}: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: HookKind,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, hook: HookKind, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }
}

/// A build plugin.
///
/// Plugins must be deterministic: the same hook payload yields the same
/// output, because their results are cached under the plugin's identity.
pub trait Plugin: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Part of the config hash; bump it when the plugin's output changes.
    fn version(&self) -> &str {
        "0"
    }

    /// Return the execution phase for this plugin.
    ///
    /// Defaults to `Transform`.
    fn phase(&self) -> PluginPhase {
        PluginPhase::Transform
    }

    /// Hooks this plugin handles; others are never called.
    fn hooks(&self) -> &[HookKind];

    fn call(&self, hook: &Hook<'_>) -> Result<HookOutput, PluginError>;
}
