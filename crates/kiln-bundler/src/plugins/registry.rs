//! Plugin registry with execution phases.
//!
//! Plugins are kept sorted by `(phase, name)` from the moment they are added,
//! so every hook visits them in the same order regardless of registration
//! order.

use std::sync::Arc;

use super::{Hook, HookKind, HookOutput, Plugin, PluginError, PluginPhase};
use crate::fingerprint::BuildFingerprint;

/// Plugin registry that maintains plugins in phase order
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<(PluginPhase, Arc<dyn Plugin>)>,
}

impl PluginRegistry {
    /// Create a new empty plugin registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin to the registry.
    ///
    /// Plugins with the same phase and name keep their registration order.
    pub fn add(&mut self, plugin: Arc<dyn Plugin>) {
        let phase = plugin.phase();
        let index = self.plugins.partition_point(|(p, existing)| {
            (*p, existing.name()) <= (phase, plugin.name())
        });
        self.plugins.insert(index, (phase, plugin));
    }

    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.add(plugin);
        self
    }

    /// `(name, version)` of every plugin, in execution order.
    pub fn identities(&self) -> Vec<(String, String)> {
        self.plugins
            .iter()
            .map(|(_, p)| (p.name().to_string(), p.version().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    fn handlers(&self, kind: HookKind) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .map(|(_, plugin)| plugin)
            .filter(move |plugin| plugin.hooks().contains(&kind))
    }

    /// First plugin that resolves `specifier` wins.
    pub fn resolve_id(
        &self,
        specifier: &str,
        importer: &str,
    ) -> Result<Option<String>, PluginError> {
        let hook = Hook::ResolveId {
            specifier,
            importer,
        };
        for plugin in self.handlers(HookKind::ResolveId) {
            match plugin.call(&hook)? {
                HookOutput::Skip => continue,
                HookOutput::Resolved(id) => return Ok(Some(id)),
                other => return Err(unexpected(plugin.as_ref(), HookKind::ResolveId, &other)),
            }
        }
        Ok(None)
    }

    /// First plugin that provides content for `path` wins.
    pub fn load(&self, path: &str) -> Result<Option<String>, PluginError> {
        let hook = Hook::Load { path };
        for plugin in self.handlers(HookKind::Load) {
            match plugin.call(&hook)? {
                HookOutput::Skip => continue,
                HookOutput::Loaded(content) => return Ok(Some(content)),
                other => return Err(unexpected(plugin.as_ref(), HookKind::Load, &other)),
            }
        }
        Ok(None)
    }

    /// Pass a module's code through every transform handler in order.
    pub fn transform(&self, path: &str, code: String) -> Result<String, PluginError> {
        let mut code = code;
        for plugin in self.handlers(HookKind::TransformModule) {
            match plugin.call(&Hook::TransformModule { path, code: &code })? {
                HookOutput::Skip => {}
                HookOutput::Code(next) => code = next,
                other => {
                    return Err(unexpected(
                        plugin.as_ref(),
                        HookKind::TransformModule,
                        &other,
                    ));
                }
            }
        }
        Ok(code)
    }

    /// Pass a chunk's code through every render handler in order.
    pub fn render_chunk(&self, chunk: &str, code: String) -> Result<String, PluginError> {
        let mut code = code;
        for plugin in self.handlers(HookKind::RenderChunk) {
            match plugin.call(&Hook::RenderChunk { chunk, code: &code })? {
                HookOutput::Skip => {}
                HookOutput::Code(next) => code = next,
                other => return Err(unexpected(plugin.as_ref(), HookKind::RenderChunk, &other)),
            }
        }
        Ok(code)
    }

    /// Notify every observer. A failing observer doesn't stop the others.
    pub fn build_end(&self, fingerprint: &BuildFingerprint) -> Vec<PluginError> {
        let hook = Hook::BuildEnd { fingerprint };
        self.handlers(HookKind::BuildEnd)
            .filter_map(|plugin| plugin.call(&hook).err())
            .collect()
    }
}

fn unexpected(plugin: &dyn Plugin, hook: HookKind, output: &HookOutput) -> PluginError {
    PluginError::new(
        plugin.name(),
        hook,
        format!("unexpected output {output:?}"),
    )
}
