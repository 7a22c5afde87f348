//! Shared fixtures for kiln-bundler integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use kiln_bundler::{BuildOptions, CacheOptions, MemoryCache, MemoryRuntime};

/// The same small project, rooted anywhere.
///
/// `main.ts` imports `util.ts` and `theme.css` and lazily loads `page.ts`.
/// `page.ts` shares `util.ts` with the entry.
pub fn project(root: &str) -> Arc<MemoryRuntime> {
    Arc::new(
        MemoryRuntime::new(root)
            .with_file(
                format!("{root}/src/main.ts"),
                "import { add } from './util';\nimport './theme.css';\nexport const total = add(1, 2);\nexport const page = () => import('./page');\n",
            )
            .with_file(
                format!("{root}/src/util.ts"),
                "export function add(a, b) {\n  return a + b;\n}\n",
            )
            .with_file(
                format!("{root}/src/page.ts"),
                "import { add } from './util';\nexport default function Page() {\n  return add(2, 3);\n}\n",
            )
            .with_file(format!("{root}/src/theme.css"), "body { color: red; }\n"),
    )
}

/// Options that build `project(root)` in memory without touching the disk.
pub fn memory_options(root: &str, runtime: Arc<MemoryRuntime>) -> BuildOptions {
    BuildOptions::new(root)
        .runtime(runtime)
        .entry("src/main.ts")
        .cache(CacheOptions::disabled())
        .write(false)
}

/// Like [`memory_options`] with a shared in-memory cache.
pub fn cached_options(
    root: &str,
    runtime: Arc<MemoryRuntime>,
    cache: Arc<MemoryCache>,
) -> BuildOptions {
    BuildOptions::new(root)
        .runtime(runtime)
        .entry("src/main.ts")
        .cache(CacheOptions::new(".kiln/cache"))
        .cache_backend(cache)
        .write(false)
}
