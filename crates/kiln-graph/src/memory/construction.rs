//! Construction methods for DependencyGraph.

use std::sync::Arc;

use parking_lot::RwLock;

use super::graph::{DependencyGraph, GraphInner};
use crate::css::CssPrecedenceResolver;
use crate::module::ModuleKind;
use crate::module_id::ModuleId;
use crate::path::{normalize_path_from, relative_to_root};
use crate::resolver::ModuleResolver;

impl DependencyGraph {
    /// Create an empty graph rooted at `root`.
    ///
    /// `root` is normalized; all ids are derived from paths relative to it.
    pub fn new(root: impl AsRef<str>, resolver: Arc<dyn ModuleResolver>) -> Self {
        let root = normalize_path_from("/", root.as_ref());
        Self {
            inner: Arc::new(RwLock::new(GraphInner::default())),
            resolver,
            root: Arc::from(root),
            css: CssPrecedenceResolver::default(),
        }
    }

    /// Use project-declared cascade layers instead of the canonical order.
    pub fn with_css_layers(mut self, layers: Option<Vec<String>>) -> Self {
        self.css = CssPrecedenceResolver::new(layers);
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute and root-relative forms of a path.
    pub fn locate(&self, path: &str) -> (String, String) {
        let absolute = normalize_path_from(&*self.root, path);
        let relative = relative_to_root(&self.root, &absolute);
        (absolute, relative)
    }

    /// Id a module at `path` would get.
    pub fn id_for(&self, path: &str, kind: ModuleKind) -> ModuleId {
        let (_, relative) = self.locate(path);
        ModuleId::new(kind, &relative)
    }
}
