//! Pipeline-facing cache façade.

use std::sync::Arc;

use super::{BuildCache, CacheEntry, CacheKey};
use crate::context::{BuildContext, Stage};

/// Wraps an optional backend so the pipeline never sees a cache error.
///
/// Lookups return `None` on a miss, on any backend failure (logged with
/// `warn!` and reported), and always when a forced rebuild bypasses reads.
/// Stores still happen during a forced rebuild so the next run is warm.
#[derive(Debug, Clone)]
pub struct CacheLayer {
    backend: Option<Arc<dyn BuildCache>>,
    force_rebuild: bool,
    ctx: BuildContext,
}

impl CacheLayer {
    pub fn new(backend: Option<Arc<dyn BuildCache>>, force_rebuild: bool, ctx: BuildContext) -> Self {
        Self {
            backend,
            force_rebuild,
            ctx,
        }
    }

    /// A layer with no backend; every lookup misses.
    pub fn disabled(ctx: BuildContext) -> Self {
        Self::new(None, false, ctx)
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn lookup(&self, stage: Stage, key: &CacheKey) -> Option<CacheEntry> {
        let backend = self.backend.as_ref()?;
        if self.force_rebuild {
            return None;
        }

        match backend.get(key) {
            Ok(entry) => {
                self.ctx.report(stage, "cache-hit", &key.to_string());
                Some(entry)
            }
            Err(err) if err.is_miss() => {
                self.ctx.report(stage, "cache-miss", &key.to_string());
                None
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed, treating as miss");
                self.ctx.report(stage, "cache-unavailable", &err.to_string());
                None
            }
        }
    }

    pub fn store(&self, stage: Stage, entry: CacheEntry) {
        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        let key = entry.key.clone();
        if let Err(err) = backend.set(entry) {
            tracing::warn!(key = %key, error = %err, "cache write failed");
            self.ctx.report(stage, "cache-unavailable", &err.to_string());
        }
    }

    /// Close the backend; errors are logged and otherwise ignored.
    pub fn close(&self) {
        if let Some(backend) = &self.backend {
            if let Err(err) = backend.close() {
                tracing::warn!(error = %err, "failed to close cache");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, CacheResult, CacheTier, CachedFile, MemoryCache};
    use crate::context::MemoryReporter;

    #[derive(Debug)]
    struct BrokenCache;

    impl BuildCache for BrokenCache {
        fn get(&self, _key: &CacheKey) -> CacheResult<CacheEntry> {
            Err(CacheError::DatabaseError("disk on fire".into()))
        }
        fn set(&self, _entry: CacheEntry) -> CacheResult<()> {
            Err(CacheError::DatabaseError("disk on fire".into()))
        }
        fn clear(&self) -> CacheResult<()> {
            Ok(())
        }
        fn close(&self) -> CacheResult<()> {
            Ok(())
        }
    }

    fn sample() -> (CacheKey, CacheEntry) {
        let key = CacheKey::from_parts(CacheTier::Input, ["sample"]);
        let entry = CacheEntry::new(&key, "dist", vec![CachedFile::new("a.js", "1")]);
        (key, entry)
    }

    #[test]
    fn backend_errors_become_misses() {
        let reporter = Arc::new(MemoryReporter::new());
        let layer = CacheLayer::new(
            Some(Arc::new(BrokenCache)),
            false,
            BuildContext::new(reporter.clone()),
        );
        let (key, entry) = sample();

        layer.store(Stage::Emit, entry);
        assert!(layer.lookup(Stage::Init, &key).is_none());
        assert_eq!(
            reporter.decisions(Stage::Init),
            vec!["cache-unavailable".to_string()]
        );
    }

    #[test]
    fn forced_rebuild_skips_reads_but_writes() {
        let backend = Arc::new(MemoryCache::new());
        let layer = CacheLayer::new(Some(backend.clone()), true, BuildContext::default());
        let (key, entry) = sample();

        layer.store(Stage::Emit, entry.clone());
        assert!(layer.lookup(Stage::Init, &key).is_none());
        assert_eq!(backend.get(&key).unwrap(), entry);
    }

    #[test]
    fn hit_is_reported() {
        let reporter = Arc::new(MemoryReporter::new());
        let layer = CacheLayer::new(
            Some(Arc::new(MemoryCache::new())),
            false,
            BuildContext::new(reporter.clone()),
        );
        let (key, entry) = sample();

        assert!(layer.lookup(Stage::Init, &key).is_none());
        layer.store(Stage::Emit, entry.clone());
        assert_eq!(layer.lookup(Stage::Init, &key), Some(entry));
        assert_eq!(reporter.decisions(Stage::Init), vec!["cache-miss", "cache-hit"]);
    }

    #[test]
    fn disabled_layer_always_misses() {
        let layer = CacheLayer::disabled(BuildContext::default());
        let (key, entry) = sample();
        layer.store(Stage::Emit, entry);
        assert!(!layer.is_enabled());
        assert!(layer.lookup(Stage::Init, &key).is_none());
    }
}
