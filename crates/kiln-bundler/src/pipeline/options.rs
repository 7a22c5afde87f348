use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kiln_config::{KilnConfig, Mode, Target};
use kiln_graph::{NativeRuntime, Runtime, is_virtual, normalize_path};

use crate::cache::{BuildCache, CacheOptions};
use crate::plugins::{Plugin, PluginRegistry};
use crate::transform::{PassthroughTransformer, Transformer};
use crate::{BuildError, Result};

/// Configuration options for a build operation.
///
/// Use the builder methods, or [`BuildOptions::from_config`] to start from a
/// loaded `kiln.toml`.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Project root. Every path that enters a hash is made relative to it.
    pub root: PathBuf,

    /// Entry modules in declaration order, relative to the root, absolute,
    /// or `virtual:*` ids.
    pub entries: Vec<String>,

    /// Output directory, relative to the root unless absolute.
    pub out_dir: PathBuf,

    pub target: Target,

    pub mode: Mode,

    /// Cascade layer order; `None` keeps the default layers.
    pub css_layers: Option<Vec<String>>,

    /// Modules that only exist in memory, keyed by `virtual:*` id.
    pub virtual_files: BTreeMap<String, String>,

    pub cache: CacheOptions,

    pub plugins: PluginRegistry,

    pub transformer: Arc<dyn Transformer>,

    /// Chunks executed concurrently within a wave (default: CPUs, at most 8).
    pub max_parallel_chunks: Option<usize>,

    /// Write artifacts and the manifest to `out_dir` (default: true).
    pub write: bool,

    /// File system access. Defaults to the native file system.
    pub runtime: Arc<dyn Runtime>,

    /// Cache backend to use instead of opening `cache.dir`.
    pub cache_backend: Option<Arc<dyn BuildCache>>,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: Vec::new(),
            out_dir: PathBuf::from("dist"),
            target: Target::default(),
            mode: Mode::default(),
            css_layers: None,
            virtual_files: BTreeMap::new(),
            cache: CacheOptions::default(),
            plugins: PluginRegistry::new(),
            transformer: Arc::new(PassthroughTransformer),
            max_parallel_chunks: None,
            write: true,
            runtime: Arc::new(NativeRuntime::new()),
            cache_backend: None,
        }
    }

    /// Options for a project described by a loaded configuration.
    pub fn from_config(root: impl Into<PathBuf>, config: &KilnConfig) -> Self {
        let build = &config.build;
        let mut options = Self::new(root)
            .entries(build.entries.iter().map(|e| e.to_string_lossy().into_owned()))
            .out_dir(build.out_dir.clone())
            .target(build.target)
            .mode(build.mode)
            .css_layers(build.css_layers.clone())
            .cache(CacheOptions::from(&config.cache));
        options.virtual_files = build.virtual_files.clone();
        options.max_parallel_chunks = build.max_parallel_chunks.or(config.settings.parallel_jobs);
        options
    }

    /// Add an entry point.
    pub fn entry(mut self, entry: impl Into<String>) -> Self {
        self.entries.push(entry.into());
        self
    }

    pub fn entries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
        self
    }

    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn css_layers(mut self, layers: Option<Vec<String>>) -> Self {
        self.css_layers = layers;
        self
    }

    /// Add a virtual file.
    pub fn virtual_file(mut self, id: impl Into<String>, content: impl Into<String>) -> Self {
        self.virtual_files.insert(id.into(), content.into());
        self
    }

    pub fn cache(mut self, cache: CacheOptions) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache_backend(mut self, backend: Arc<dyn BuildCache>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn max_parallel_chunks(mut self, max: usize) -> Self {
        self.max_parallel_chunks = Some(max);
        self
    }

    pub fn write(mut self, write: bool) -> Self {
        self.write = write;
        self
    }

    /// Set the runtime for filesystem operations.
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    /// Normalized absolute project root.
    pub fn root_str(&self) -> String {
        normalize_path(&self.root)
    }

    /// Output directory resolved against the root.
    pub fn out_dir_path(&self) -> PathBuf {
        resolve_against(&self.root, &self.out_dir)
    }

    /// Cache directory resolved against the root.
    pub fn cache_dir_path(&self) -> PathBuf {
        resolve_against(&self.root, &self.cache.dir)
    }

    pub(crate) fn parallelism(&self) -> usize {
        self.max_parallel_chunks
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }

    /// Validate the build options for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No entry is declared
    /// - The root is not absolute
    /// - A virtual file id lacks the `virtual:` prefix
    /// - Cascade layer names repeat
    /// - Too many entry points (DoS protection)
    pub fn validate(&self) -> Result<()> {
        const MAX_ENTRY_POINTS: usize = 1000;

        if self.entries.is_empty() {
            return Err(BuildError::InvalidConfig(
                "At least one entry point is required".into(),
            ));
        }
        if self.entries.len() > MAX_ENTRY_POINTS {
            return Err(BuildError::InvalidConfig(format!(
                "Too many entry points: {} (max {})",
                self.entries.len(),
                MAX_ENTRY_POINTS
            )));
        }
        if !self.root.is_absolute() {
            return Err(BuildError::InvalidConfig(format!(
                "project root must be absolute, got '{}'",
                self.root.display()
            )));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(BuildError::InvalidConfig("out_dir must not be empty".into()));
        }
        if let Some(id) = self.virtual_files.keys().find(|id| !is_virtual(id)) {
            return Err(BuildError::InvalidConfig(format!(
                "virtual file '{id}' must use the 'virtual:' prefix"
            )));
        }
        if let Some(layers) = &self.css_layers {
            let mut seen = std::collections::BTreeSet::new();
            if let Some(dup) = layers.iter().find(|layer| !seen.insert(layer.as_str())) {
                return Err(BuildError::InvalidConfig(format!(
                    "cascade layer '{dup}' is declared twice"
                )));
            }
        }
        Ok(())
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
