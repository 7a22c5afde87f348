//! Shared utilities for command implementations.

use std::path::{Path, PathBuf};

use kiln_bundler::BuildOptions;
use kiln_config::{ConfigDiscovery, KilnConfig};

use crate::cli::ProjectArgs;
use crate::error::{CliError, Result};

/// A project ready to build: canonical root, merged config and options.
#[derive(Debug)]
pub(crate) struct Project {
    pub root: PathBuf,
    pub config: KilnConfig,
    pub options: BuildOptions,
}

/// Resolve the project root to an absolute, canonical directory.
pub(crate) fn resolve_root(root: Option<&Path>) -> Result<PathBuf> {
    let root = match root {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };
    if !root.is_dir() {
        return Err(CliError::DirectoryNotFound(root));
    }
    Ok(root.canonicalize()?)
}

/// Load kiln.toml, apply the profile and command line overrides, validate.
///
/// Entries given on the command line replace the configured ones.
pub(crate) fn load_project(args: &ProjectArgs) -> Result<Project> {
    let root = resolve_root(args.root.as_deref())?;

    let mut config = ConfigDiscovery::new(&root)
        .load_or_default()?
        .materialize_profile(args.profile.as_deref())?;

    if !args.entries.is_empty() {
        config.build.entries = args.entries.iter().map(PathBuf::from).collect();
    }
    if let Some(target) = args.target {
        config.build.target = target.into();
    }
    if let Some(mode) = args.mode {
        config.build.mode = mode.into();
    }
    kiln_config::validate(&config)?;

    tracing::debug!(root = %root.display(), entries = config.build.entries.len(), "project loaded");
    let options = BuildOptions::from_config(&root, &config);
    Ok(Project {
        root,
        config,
        options,
    })
}
