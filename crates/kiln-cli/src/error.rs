//! Error handling for the kiln CLI.
//!
//! Commands return [`CliError`]. Library errors convert automatically and
//! keep their miette codes and help text when reported.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Loading or validating kiln.toml failed
    #[error("Configuration error: {0}")]
    Config(#[from] kiln_config::ConfigError),

    /// The build engine failed
    #[error(transparent)]
    Build(#[from] kiln_bundler::BuildError),

    /// The build finished, but some chunks failed
    #[error("Build finished with {count} error(s)")]
    PartialBuild { count: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

impl CliError {
    fn hint(&self) -> Option<String> {
        match self {
            CliError::Config(err) => err.hint().map(str::to_string),
            CliError::PartialBuild { .. } => {
                Some("Artifacts for the healthy chunks were written. Fix the errors above and rebuild.".to_string())
            }
            CliError::DirectoryNotFound(_) => Some("Pass an existing directory with --root".to_string()),
            _ => None,
        }
    }
}

/// Convert a CLI error into a miette report.
pub fn cli_error_to_miette(err: CliError) -> miette::Report {
    match err {
        CliError::Build(e) => miette::Report::new(e),
        other => match other.hint() {
            Some(hint) => miette::miette!(help = hint, "{}", other),
            None => miette::miette!("{}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miette::Diagnostic as _;

    #[test]
    fn test_config_error_keeps_hint() {
        let err: CliError = kiln_config::ConfigError::NoEntries.into();
        assert!(matches!(err, CliError::Config(_)));
        assert_eq!(err.hint().as_deref(), Some("Add at least one path to build.entries"));
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: CliError = kiln_bundler::BuildError::EntryNotFound {
            entry: "src/nope.ts".into(),
        }
        .into();
        assert_eq!(err.to_string(), "entry not found: src/nope.ts");
    }

    #[test]
    fn test_partial_build_message() {
        let err = CliError::PartialBuild { count: 2 };
        assert_eq!(err.to_string(), "Build finished with 2 error(s)");
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_miette_report_carries_build_code() {
        let report = cli_error_to_miette(CliError::Build(kiln_bundler::BuildError::Cancelled));
        let code = report.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("kiln::cancelled"));
    }
}
