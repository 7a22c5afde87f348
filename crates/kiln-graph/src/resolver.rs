//! Import specifier resolution.

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::module::ModuleKind;
use crate::path::{is_virtual, normalize_path_from, parent_dir};
use crate::runtime::Runtime;

/// Extensions probed, in order, when a specifier has none that exists.
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "", ".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".css", ".json",
];

/// Where a specifier points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Absolute normalized path or virtual id.
    pub path: String,
    pub kind: ModuleKind,
}

/// Maps an import specifier to the module it names.
pub trait ModuleResolver: Send + Sync + std::fmt::Debug {
    /// `importer` is the absolute normalized path (or virtual id) of the
    /// importing module. `None` means the specifier names nothing the graph
    /// can hold.
    fn resolve(&self, specifier: &str, importer: &str) -> Option<ResolvedModule>;
}

/// Resolver that probes the file system through a [`Runtime`].
///
/// Relative and absolute specifiers are resolved with extension and
/// `index.*` probing. `virtual:*` specifiers resolve only when registered.
/// Bare package specifiers never resolve.
#[derive(Debug, Clone)]
pub struct RuntimeResolver {
    runtime: Arc<dyn Runtime>,
    root: String,
    virtual_modules: FxHashSet<String>,
    extensions: Vec<String>,
}

impl RuntimeResolver {
    pub fn new(runtime: Arc<dyn Runtime>, root: impl Into<String>) -> Self {
        Self {
            runtime,
            root: root.into(),
            virtual_modules: FxHashSet::default(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }

    pub fn with_virtual_modules<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.virtual_modules.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    fn probe(&self, candidate: &str) -> Option<String> {
        for ext in &self.extensions {
            let path = format!("{candidate}{ext}");
            if self.runtime.is_file(Path::new(&path)) {
                return Some(path);
            }
        }
        for ext in self.extensions.iter().filter(|e| !e.is_empty()) {
            let path = format!("{}/index{ext}", candidate.trim_end_matches('/'));
            if self.runtime.is_file(Path::new(&path)) {
                return Some(path);
            }
        }
        None
    }
}

impl ModuleResolver for RuntimeResolver {
    fn resolve(&self, specifier: &str, importer: &str) -> Option<ResolvedModule> {
        if is_virtual(specifier) {
            return self
                .virtual_modules
                .contains(specifier)
                .then(|| ResolvedModule {
                    path: specifier.to_string(),
                    kind: ModuleKind::Virtual,
                });
        }

        let base = if specifier.starts_with("./") || specifier.starts_with("../") {
            // virtual importers resolve relative specifiers from the root
            if is_virtual(importer) {
                self.root.as_str()
            } else {
                parent_dir(importer)
            }
        } else if specifier.starts_with('/') {
            "/"
        } else {
            return None;
        };

        let candidate = normalize_path_from(base, specifier);
        let path = self.probe(&candidate)?;
        Some(ResolvedModule {
            kind: ModuleKind::from_path(&path),
            path,
        })
    }
}
