//! Content-addressed build cache.
//!
//! Caches build results at several granularities so unchanged work is
//! skipped. The cache is never required for correctness: every backend error
//! is turned into a miss by [`CacheLayer`], and a build without any cache
//! produces the same bytes, only slower.
//!
//! # Architecture
//!
//! - **Content-addressed**: keys are canonical hashes of each tier's inputs
//! - **Tiered**: a coarse input-tier hit skips the whole pipeline; on a coarse
//!   miss the plan and per-module artifact tiers are still consulted
//! - **Pluggable**: [`BuildCache`] is implemented by [`RedbCache`] (single
//!   redb file with ACID transactions) and [`MemoryCache`]

mod key;
mod layer;
mod memory;
mod storage;

pub use key::{CACHE_FORMAT_VERSION, CacheKey, CacheTier};
pub use layer::CacheLayer;
pub use memory::MemoryCache;
pub use storage::{CacheError, RedbCache};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Environment variable that bypasses cache reads for one invocation.
pub const FORCE_REBUILD_ENV: &str = "KILN_FORCE_REBUILD";

/// One named blob inside a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl CachedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Stored value for a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Rendered [`CacheKey`].
    pub key: String,
    /// Output directory the entry was produced for, relative to the root.
    pub out_dir: String,
    pub files: Vec<CachedFile>,
    /// Milliseconds since the Unix epoch.
    pub created: i64,
    pub format_version: u32,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, out_dir: impl Into<String>, files: Vec<CachedFile>) -> Self {
        Self {
            key: key.to_string(),
            out_dir: out_dir.into(),
            files,
            created: chrono::Utc::now().timestamp_millis(),
            format_version: CACHE_FORMAT_VERSION,
        }
    }

    pub fn file(&self, name: &str) -> Option<&CachedFile> {
        self.files.iter().find(|file| file.name == name)
    }

    /// Whether two entries carry the same payload, ignoring creation time.
    pub fn same_payload(&self, other: &CacheEntry) -> bool {
        self.key == other.key
            && self.out_dir == other.out_dir
            && self.files == other.files
            && self.format_version == other.format_version
    }

    pub(crate) fn is_compatible(&self) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
    }
}

/// Storage contract every cache backend fulfils.
///
/// `set` is idempotent: storing the same payload twice leaves one entry and
/// is not an error. A `set` is visible to every later `get` on the same
/// instance. `close` may be called more than once.
pub trait BuildCache: Send + Sync + std::fmt::Debug {
    /// Look up an entry; `CacheError::CacheMiss` when absent.
    fn get(&self, key: &CacheKey) -> CacheResult<CacheEntry>;

    fn set(&self, entry: CacheEntry) -> CacheResult<()>;

    fn clear(&self) -> CacheResult<()>;

    fn close(&self) -> CacheResult<()>;
}

/// Configuration for the build cache.
///
/// The embedder controls where cache files are stored. Cache keys are
/// content-addressed, so invalidation is automatic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub enabled: bool,

    /// Directory holding `cache.redb`, relative to the project root unless
    /// absolute.
    pub dir: PathBuf,

    /// Bypass cache reads but still write results.
    pub force_rebuild: bool,

    /// Environment variables whose values enter the config hash.
    pub env_vars: Vec<String>,
}

impl CacheOptions {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            dir: dir.into(),
            force_rebuild: false,
            env_vars: Vec::new(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    pub fn with_env_vars(mut self, vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.env_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    /// Check if force rebuild is requested directly or via environment variable.
    pub fn should_force_rebuild(&self) -> bool {
        self.force_rebuild || std::env::var_os(FORCE_REBUILD_ENV).is_some()
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self::new(".kiln/cache")
    }
}

impl From<&kiln_config::CacheConfig> for CacheOptions {
    fn from(config: &kiln_config::CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            dir: config.dir.clone(),
            force_rebuild: config.force_rebuild,
            env_vars: config.env_vars.clone(),
        }
    }
}
