//! Schema validation (no filesystem checks).

use std::collections::BTreeSet;

use crate::config::KilnConfig;
use crate::error::{ConfigError, Result};

/// Validate a loaded configuration.
///
/// Entries and output paths are checked for shape only; whether entry files
/// exist is decided by the build, which reports missing entries with their
/// resolution context.
pub fn validate(config: &KilnConfig) -> Result<()> {
    let build = &config.build;

    if build.entries.is_empty() {
        return Err(ConfigError::NoEntries);
    }

    if build.out_dir.as_os_str().is_empty() {
        return Err(ConfigError::SchemaValidation {
            message: "out_dir cannot be empty".to_string(),
            hint: Some("Set build.out_dir, for example \"dist\"".to_string()),
        });
    }

    if let Some(layers) = &build.css_layers {
        let mut seen = BTreeSet::new();
        for layer in layers {
            if layer.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "css layer names cannot be empty".to_string(),
                    hint: Some("Remove empty strings from build.css_layers".to_string()),
                });
            }
            if !seen.insert(layer.as_str()) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("css layer '{layer}' is declared twice"),
                    hint: Some("Each layer may appear once in build.css_layers".to_string()),
                });
            }
        }
    }

    for id in build.virtual_files.keys() {
        if !id.starts_with("virtual:") {
            return Err(ConfigError::SchemaValidation {
                message: format!("virtual file '{id}' must start with 'virtual:'"),
                hint: Some("Rename the key to virtual:<name>".to_string()),
            });
        }
    }

    if build.max_parallel_chunks == Some(0) || config.settings.parallel_jobs == Some(0) {
        return Err(ConfigError::SchemaValidation {
            message: "parallelism must be at least 1".to_string(),
            hint: None,
        });
    }

    Ok(())
}
