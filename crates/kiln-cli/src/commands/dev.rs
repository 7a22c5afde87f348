//! Dev command implementation.
//!
//! Loads the module graph once, then turns every debounced batch of file
//! changes into a hot-update decision until Ctrl+C.

use std::path::{Path, PathBuf};

use kiln_bundler::{BuildContext, DevSession, normalize_path};
use tokio::signal;

use super::utils::load_project;
use crate::cli::DevArgs;
use crate::dev::FileWatcher;
use crate::error::Result;
use crate::ui;

/// Execute the dev command.
///
/// # Errors
///
/// Configuration errors, a failed initial load, and watcher errors. Errors
/// while handling a batch are printed and the session keeps running.
pub async fn execute(args: DevArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let debounce_ms = args.debounce.unwrap_or(project.config.dev.debounce_ms);
    let ignore = ignore_patterns(
        &project.root,
        project.config.dev.watch_ignore.clone(),
        &[project.options.out_dir_path(), project.options.cache_dir_path()],
    );

    let ctx = BuildContext::default();
    ui::info("Loading module graph...");
    let mut session = DevSession::start(project.options, &ctx).await?;
    ui::success(&format!("Loaded {} modules", session.graph().len()));
    ui::print_diagnostics(session.diagnostics());

    let (watcher, mut batches) = FileWatcher::new(project.root.clone(), ignore, debounce_ms)?;
    ui::info(&format!("Watching for changes in: {}", watcher.root().display()));
    ui::info("Press Ctrl+C to stop");

    loop {
        tokio::select! {
            Some(batch) = batches.recv() => {
                handle_batch(&mut session, &batch, &ctx).await;
            }

            _ = signal::ctrl_c() => {
                ui::info("Shutting down...");
                break;
            }
        }
    }

    ui::success("Dev session stopped");
    Ok(())
}

async fn handle_batch(session: &mut DevSession, paths: &[PathBuf], ctx: &BuildContext) {
    let paths: Vec<String> = paths.iter().map(normalize_path).collect();
    for path in &paths {
        tracing::debug!(path = %path, "file changed");
    }

    let batch = match session.handle_changes(&paths, ctx).await {
        Ok(batch) => batch,
        Err(err) => {
            ui::error(&format!("Failed to process changes: {err}"));
            return;
        }
    };
    ui::print_diagnostics(session.diagnostics());

    let Some(decision) = batch.decision() else {
        return;
    };
    ui::print_decision(&decision);
    if decision.is_reload() {
        // no client to wait for; the reload is immediate
        session.complete_reload();
    }
}

/// Configured patterns plus the output and cache directories when they sit
/// inside the root.
fn ignore_patterns(root: &Path, mut patterns: Vec<String>, dirs: &[PathBuf]) -> Vec<String> {
    for dir in dirs {
        if let Ok(relative) = dir.strip_prefix(root) {
            let relative = relative.to_string_lossy().replace('\\', "/");
            if !relative.is_empty() && !patterns.contains(&relative) {
                patterns.push(relative);
            }
        }
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_dirs_are_ignored() {
        let root = PathBuf::from("/project");
        let patterns = ignore_patterns(
            &root,
            vec!["node_modules".to_string()],
            &[PathBuf::from("/project/dist"), PathBuf::from("/elsewhere/cache")],
        );
        assert_eq!(patterns, vec!["node_modules".to_string(), "dist".to_string()]);
    }
}
