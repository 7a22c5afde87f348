//! File system watcher with debouncing for development mode.
//!
//! Watches the whole project directory and delivers changed paths in
//! batches, ignoring node_modules, build output and other configured
//! patterns.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::{CliError, Result};

/// File watcher with debouncing and filtering.
///
/// Changes arriving within `debounce_ms` of each other are delivered as one
/// sorted, deduplicated batch.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching `root` recursively.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory doesn't exist or the platform
    /// watcher cannot be created.
    pub fn new(
        root: PathBuf,
        ignore_patterns: Vec<String>,
        debounce_ms: u64,
    ) -> Result<(Self, mpsc::Receiver<Vec<PathBuf>>)> {
        if !root.is_dir() {
            return Err(CliError::DirectoryNotFound(root));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (batch_tx, batch_rx) = mpsc::channel(16);
        let root_clone = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "watch error");
                    return;
                }
            };
            if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                return;
            }
            for path in event.paths {
                if Self::should_ignore(&path, &root_clone, &ignore_patterns) {
                    continue;
                }
                // receiver gone means the session is shutting down
                let _ = raw_tx.send(path);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        tokio::spawn(debounce(raw_rx, batch_tx, Duration::from_millis(debounce_ms)));

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            batch_rx,
        ))
    }

    /// Check if a path should be ignored.
    ///
    /// Hidden files and anything outside the root are always ignored. `*.ext`
    /// patterns match suffixes; other patterns match whole path segments.
    fn should_ignore(path: &Path, root: &Path, ignore_patterns: &[String]) -> bool {
        let Ok(rel_path) = path.strip_prefix(root) else {
            return true;
        };
        let path_str = rel_path.to_string_lossy().replace('\\', "/");

        for pattern in ignore_patterns {
            if let Some(ext) = pattern.strip_prefix('*') {
                if path_str.ends_with(ext) {
                    return true;
                }
            } else if path_str == *pattern
                || path_str.starts_with(&format!("{pattern}/"))
                || path_str.contains(&format!("/{pattern}/"))
            {
                return true;
            }
        }

        rel_path.components().any(|component| {
            component
                .as_os_str()
                .to_str()
                .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
        })
    }

    /// Get the root directory being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Collect paths until `window` passes without a new one, then send the batch.
///
/// Ends when either channel closes; a partial batch is flushed first.
async fn debounce(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    batches: mpsc::Sender<Vec<PathBuf>>,
    window: Duration,
) {
    while let Some(first) = raw.recv().await {
        let mut pending = BTreeSet::from([first]);
        let mut closed = false;
        loop {
            match tokio::time::timeout(window, raw.recv()).await {
                Ok(Some(path)) => {
                    pending.insert(path);
                }
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }

        if batches.send(pending.into_iter().collect()).await.is_err() || closed {
            return;
        }
    }
}
